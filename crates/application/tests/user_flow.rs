mod support;

use application::services::{AVATAR_FIELD, IMAGES_FIELD};
use application::ApplicationError;
use domain::{DomainError, Gender, PhoneNumber, ProfilePatch, UserEmail, UserId, UserRole};
use support::{png, Harness};

#[tokio::test]
async fn create_profile_requires_full_name() {
    let h = Harness::new();
    let alice = h.user("Alice").await;

    let err = h
        .users
        .create_profile(
            alice.id,
            ProfilePatch {
                age: Some(25),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));

    let profile = h
        .users
        .create_profile(
            alice.id,
            ProfilePatch {
                full_name: Some("Alice Doe".into()),
                age: Some(25),
                gender: Some(Gender::Female),
                location: Some("Lagos".into()),
                role: Some(UserRole::Friends),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(profile.full_name.as_deref(), Some("Alice Doe"));
    assert_eq!(profile.age, Some(25));
    assert_eq!(profile.location.as_deref(), Some("Lagos"));
}

#[tokio::test]
async fn update_applies_only_present_fields() {
    let h = Harness::new();
    let alice = h.user("Alice").await;

    h.users
        .update_profile(
            alice.id,
            ProfilePatch {
                bio: Some("Loves jazz".into()),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap();
    let profile = h
        .users
        .update_profile(
            alice.id,
            ProfilePatch {
                age: Some(30),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(profile.full_name.as_deref(), Some("Alice"));
    assert_eq!(profile.bio.as_deref(), Some("Loves jazz"));
    assert_eq!(profile.age, Some(30));

    let err = h
        .users
        .update_profile(
            alice.id,
            ProfilePatch {
                age: Some(16),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));
}

#[tokio::test]
async fn update_rechecks_contact_uniqueness() {
    let h = Harness::new();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;

    let err = h
        .users
        .update_profile(
            alice.id,
            ProfilePatch {
                email: bob.email.clone(),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::EmailTaken)));

    let err = h
        .users
        .update_profile(
            alice.id,
            ProfilePatch {
                phone: bob.phone.clone(),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::PhoneTaken)));

    // 保留自己的联系方式不算冲突
    let profile = h
        .users
        .update_profile(
            alice.id,
            ProfilePatch {
                email: alice.email.clone(),
                phone: Some(PhoneNumber::parse("+234 800 555 0000").unwrap()),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(profile.email, alice.email.as_ref().map(|e| e.as_str().to_string()));
    assert_ne!(profile.phone, alice.phone.as_ref().map(|p| p.as_str().to_string()));

    let fresh = UserEmail::parse("alice.new@example.com").unwrap();
    let profile = h
        .users
        .update_profile(
            alice.id,
            ProfilePatch {
                email: Some(fresh),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(profile.email.as_deref(), Some("alice.new@example.com"));
}

#[tokio::test]
async fn nearby_matches_location_and_excludes_self() {
    let h = Harness::new();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let carol = h.user("Carol").await;

    assert!(h.users.nearby(alice.id).await.unwrap().is_empty());

    for (user, city) in [(&alice, "Abuja"), (&bob, "Abuja"), (&carol, "Kano")] {
        h.users
            .update_profile(
                user.id,
                ProfilePatch {
                    location: Some(city.into()),
                    ..ProfilePatch::default()
                },
            )
            .await
            .unwrap();
    }

    let nearby = h.users.nearby(alice.id).await.unwrap();
    assert_eq!(nearby.iter().map(|u| u.id).collect::<Vec<_>>(), vec![bob.id]);
    assert_eq!(nearby[0].name.as_deref(), Some("Bob"));
}

#[tokio::test]
async fn rating_keeps_one_entry_per_rater() {
    let h = Harness::new();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let carol = h.user("Carol").await;

    assert_eq!(h.users.rate(bob.id, alice.id, 5).await.unwrap(), 5.0);
    assert_eq!(h.users.rate(carol.id, alice.id, 2).await.unwrap(), 3.5);
    assert_eq!(h.users.rate(bob.id, alice.id, 4).await.unwrap(), 3.0);

    let profile = h.users.get_profile(alice.id).await.unwrap();
    assert_eq!(profile.rating_count, 2);
    assert_eq!(profile.rating, 3.0);

    let err = h.users.rate(alice.id, alice.id, 5).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));
    let err = h.users.rate(bob.id, alice.id, 6).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));
    let err = h.users.rate(bob.id, UserId::generate(), 3).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::UserNotFound)));
}

#[tokio::test]
async fn upload_stores_avatar_and_gallery() {
    let h = Harness::new();
    let alice = h.user("Alice").await;

    let media = h
        .users
        .upload_media(alice.id, vec![png(AVATAR_FIELD), png(IMAGES_FIELD), png(IMAGES_FIELD)])
        .await
        .unwrap();

    assert_eq!(media.avatar_url.as_deref(), Some("memory://uploads/0.png"));
    assert_eq!(media.image_urls.len(), 2);
    assert_eq!(h.blobs.stored(), 3);
}

#[tokio::test]
async fn upload_rejects_whole_batch_on_bad_file() {
    let h = Harness::new();
    let alice = h.user("Alice").await;

    let mut disguised = png(IMAGES_FIELD);
    disguised.content_type = "application/pdf".into();
    let err = h
        .users
        .upload_media(alice.id, vec![png(AVATAR_FIELD), disguised])
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));

    let mut huge = png(AVATAR_FIELD);
    huge.bytes = vec![0; application::blob::MAX_IMAGE_BYTES + 1];
    let err = h.users.upload_media(alice.id, vec![huge]).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));

    let err = h
        .users
        .upload_media(alice.id, vec![png("document")])
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));

    let err = h.users.upload_media(alice.id, Vec::new()).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));

    assert_eq!(h.blobs.stored(), 0);
}

#[tokio::test]
async fn user_card_formats_join_date() {
    let h = Harness::new();
    let alice = h.user("Alice").await;
    let card = h.users.get_user(alice.id).await.unwrap();
    assert_eq!(card.joined, alice.created_at.format("%Y-%m-%d").to_string());
    assert_eq!(card.name.as_deref(), Some("Alice"));
}
