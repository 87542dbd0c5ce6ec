use std::sync::Arc;

use application::services::{LoginRequest, SignupRequest};
use application::{
    ApplicationError, AuthService, AuthServiceDependencies, CredentialError, FederatedIdentity,
    FederatedIdentityVerifier, MemoryStore, PasswordHasher, SystemClock, UserRepository,
};
use async_trait::async_trait;
use domain::{DomainError, PasswordHash, UserEmail};
use mockall::mock;

/// 明文前缀“哈希”，只用于测试。
struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, CredentialError> {
        PasswordHash::new(format!("plain:{plaintext}"))
            .map_err(|err| CredentialError::Hashing(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, CredentialError> {
        Ok(hashed.as_str() == format!("plain:{plaintext}"))
    }
}

mock! {
    pub Verifier {}

    #[async_trait]
    impl FederatedIdentityVerifier for Verifier {
        async fn verify(&self, credential: &str) -> Result<FederatedIdentity, CredentialError>;
    }
}

fn service(store: Arc<MemoryStore>, verifier: MockVerifier) -> AuthService {
    AuthService::new(AuthServiceDependencies {
        user_repository: store,
        password_hasher: Arc::new(PlainHasher),
        federated_verifier: Arc::new(verifier),
        clock: Arc::new(SystemClock),
    })
}

fn signup(email: &str, phone: &str) -> SignupRequest {
    SignupRequest {
        email: email.to_string(),
        phone: phone.to_string(),
        password: "hunter22".to_string(),
    }
}

fn google_identity(email: Option<&str>) -> FederatedIdentity {
    FederatedIdentity {
        subject: "google-sub-42".to_string(),
        email: email.map(str::to_string),
        name: Some("Grace Hopper".to_string()),
        picture: Some("https://example.com/grace.png".to_string()),
    }
}

#[tokio::test]
async fn signup_then_login_by_email_or_phone() {
    let store = Arc::new(MemoryStore::new());
    let auth = service(store, MockVerifier::new());

    let created = auth
        .signup(signup("Ada@Example.com", "+2348011112222"))
        .await
        .unwrap();
    assert!(created.is_new_user);
    assert_eq!(
        created.user.email.as_ref().map(UserEmail::as_str),
        Some("ada@example.com")
    );

    let by_email = auth
        .login(LoginRequest {
            identifier: "ada@example.com".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap();
    assert_eq!(by_email.user.id, created.user.id);
    assert!(!by_email.is_new_user);

    let by_phone = auth
        .login(LoginRequest {
            identifier: "+2348011112222".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap();
    assert_eq!(by_phone.user.id, created.user.id);

    let wrong = auth
        .login(LoginRequest {
            identifier: "ada@example.com".into(),
            password: "nope-nope".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(wrong, ApplicationError::Authentication));

    let unknown = auth
        .login(LoginRequest {
            identifier: "nobody@example.com".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(unknown, ApplicationError::Authentication));
}

#[tokio::test]
async fn signup_rejects_duplicates_and_weak_input() {
    let store = Arc::new(MemoryStore::new());
    let auth = service(store, MockVerifier::new());
    auth.signup(signup("ada@example.com", "+2348011112222"))
        .await
        .unwrap();

    let err = auth
        .signup(signup("ADA@example.com", "+2348099999999"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::EmailTaken)));

    let err = auth
        .signup(signup("grace@example.com", "+2348011112222"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::PhoneTaken)));

    let mut short = signup("grace@example.com", "+2348033334444");
    short.password = "abc".into();
    let err = auth.signup(short).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));

    let err = auth.signup(signup("", "+2348033334444")).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));
}

#[tokio::test]
async fn federated_login_creates_new_user() {
    let store = Arc::new(MemoryStore::new());
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify()
        .times(1)
        .returning(|_| Ok(google_identity(Some("grace@example.com"))));
    let auth = service(store.clone(), verifier);

    let outcome = auth.federated("google-credential").await.unwrap();

    assert!(outcome.is_new_user);
    assert!(outcome.user.verified);
    assert_eq!(outcome.user.federated_id.as_deref(), Some("google-sub-42"));
    assert_eq!(outcome.user.profile.full_name.as_deref(), Some("Grace Hopper"));
    let stored = UserRepository::find_by_federated_id(store.as_ref(), "google-sub-42")
        .await
        .unwrap();
    assert_eq!(stored.map(|u| u.id), Some(outcome.user.id));
}

#[tokio::test]
async fn federated_login_links_existing_email_account() {
    let store = Arc::new(MemoryStore::new());
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify()
        .times(2)
        .returning(|_| Ok(google_identity(Some("ada@example.com"))));
    let auth = service(store.clone(), verifier);
    let existing = auth
        .signup(signup("ada@example.com", "+2348011112222"))
        .await
        .unwrap();

    let linked = auth.federated("google-credential").await.unwrap();
    assert_eq!(linked.user.id, existing.user.id);
    assert!(!linked.is_new_user);
    assert_eq!(linked.user.federated_id.as_deref(), Some("google-sub-42"));
    assert!(linked.user.password.is_some(), "password login keeps working");

    // 第二次按第三方 id 命中同一账号
    let again = auth.federated("google-credential").await.unwrap();
    assert_eq!(again.user.id, existing.user.id);
}

#[tokio::test]
async fn rejected_credential_is_unauthorized() {
    let store = Arc::new(MemoryStore::new());
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify()
        .returning(|_| Err(CredentialError::Rejected("audience mismatch".into())));
    let auth = service(store, verifier);

    let err = auth.federated("forged").await.unwrap_err();
    assert!(matches!(err, ApplicationError::Authentication));

    let err = auth.federated("   ").await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::InvalidArgument { .. })));
}

#[tokio::test]
async fn provider_outage_is_not_reported_as_bad_credential() {
    let store = Arc::new(MemoryStore::new());
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify()
        .returning(|_| Err(CredentialError::Unavailable("connection refused".into())));
    let auth = service(store, verifier);

    let err = auth.federated("token").await.unwrap_err();
    assert!(matches!(err, ApplicationError::Credential(CredentialError::Unavailable(_))));
}

#[tokio::test]
async fn verify_reports_incomplete_profiles_as_new() {
    let store = Arc::new(MemoryStore::new());
    let auth = service(store.clone(), MockVerifier::new());
    let created = auth
        .signup(signup("ada@example.com", "+2348011112222"))
        .await
        .unwrap();

    assert!(auth.verify(created.user.id).await.unwrap().is_new_user);

    let mut user = created.user.clone();
    user.profile.full_name = Some("Ada Lovelace".into());
    UserRepository::update(store.as_ref(), user).await.unwrap();
    assert!(!auth.verify(created.user.id).await.unwrap().is_new_user);

    let err = auth.verify(domain::UserId::generate()).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Authentication));
}
