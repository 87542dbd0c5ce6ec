mod support;

use application::services::SubmitProofRequest;
use application::ApplicationError;
use domain::{DomainError, PaymentId, PaymentPurpose, PaymentStatus, PostId};
use support::{png, Harness};

#[tokio::test]
async fn submitted_proof_is_stored_and_pending() {
    let h = Harness::new();
    let alice = h.user("Alice").await;
    let post = h.post(&alice, "Sponsored brunch").await;

    let payment = h
        .payments
        .submit_proof(SubmitProofRequest {
            owner: alice.id,
            purpose: PaymentPurpose::PostCreation,
            post_id: Some(post.id),
            amount: 2500.0,
            proof: png("proof"),
        })
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.post, Some(post.id));
    assert_eq!(payment.proof_path, "memory://uploads/0.png");
    assert!(payment.reference.starts_with("PAY-"));
    assert_eq!(h.blobs.stored(), 1);
}

#[tokio::test]
async fn proof_submission_validates_input() {
    let h = Harness::new();
    let alice = h.user("Alice").await;
    let bob = h.user("Bob").await;
    let bobs_post = h.post(&bob, "Bob's post").await;

    let request = |purpose, post_id: Option<PostId>, amount: f64| SubmitProofRequest {
        owner: alice.id,
        purpose,
        post_id,
        amount,
        proof: png("proof"),
    };

    let err = h
        .payments
        .submit_proof(request(PaymentPurpose::PostExtension, None, 100.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));

    let err = h
        .payments
        .submit_proof(request(PaymentPurpose::PostExtension, Some(bobs_post.id), 100.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::OperationNotAllowed)));

    let err = h
        .payments
        .submit_proof(request(PaymentPurpose::PostCreation, Some(PostId::generate()), 100.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::PostNotFound)));

    let mut gif = request(PaymentPurpose::UnlockAcceptances, None, 100.0);
    gif.proof.file_name = "proof.gif".into();
    gif.proof.content_type = "image/gif".into();
    let err = h.payments.submit_proof(gif).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));

    // 金额无效时文件已经上传，但不会生成记录
    let err = h
        .payments
        .submit_proof(request(PaymentPurpose::UnlockAcceptances, None, 0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));
}

#[tokio::test]
async fn review_requires_admin() {
    let h = Harness::new();
    let alice = h.user("Alice").await;
    let payment = h.unlock_payment(&alice).await;

    let err = h.payments.list_pending(alice.id).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Authorization));

    let err = h.payments.verify(alice.id, payment.id).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Authorization));

    let err = h
        .payments
        .verify(domain::UserId::generate(), payment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Authentication));
}

#[tokio::test]
async fn payments_are_decided_exactly_once() {
    let h = Harness::new();
    let admin = h.admin("Admin").await;
    let alice = h.user("Alice").await;
    let first = h.unlock_payment(&alice).await;
    let second = h.unlock_payment(&alice).await;

    let pending = h.payments.list_pending(admin.id).await.unwrap();
    assert_eq!(pending.len(), 2);

    let verified = h.payments.verify(admin.id, first.id).await.unwrap();
    assert_eq!(verified.status, PaymentStatus::Verified);

    let err = h.payments.reject(admin.id, first.id).await.unwrap_err();
    match err {
        ApplicationError::Domain(DomainError::PaymentAlreadyDecided { status }) => {
            assert_eq!(status, "verified");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let rejected = h.payments.reject(admin.id, second.id).await.unwrap();
    assert_eq!(rejected.status, PaymentStatus::Rejected);
    assert!(h.payments.list_pending(admin.id).await.unwrap().is_empty());

    let err = h
        .payments
        .verify(admin.id, PaymentId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::PaymentNotFound)));
}

#[tokio::test]
async fn account_details_come_from_configuration() {
    let h = Harness::new();
    let details = h.payments.account_details();
    assert_eq!(details.bank, "Test Bank");
    assert_eq!(details.account_number, "0001112223");
    assert_eq!(details.account_name, "Meetup Ltd");
}
