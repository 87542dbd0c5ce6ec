use application::{CredentialError, FederatedIdentityVerifier};
use infrastructure::GoogleTokenVerifier;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLIENT_ID: &str = "meetup-web.apps.googleusercontent.com";

async fn verifier(server: &MockServer) -> GoogleTokenVerifier {
    GoogleTokenVerifier::new(
        format!("{}/tokeninfo", server.uri()),
        Some(CLIENT_ID.to_string()),
    )
    .expect("http client")
}

#[tokio::test]
async fn valid_token_yields_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .and(query_param("id_token", "good-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "aud": CLIENT_ID,
            "sub": "1234567890",
            "email": "grace@example.com",
            "email_verified": "true",
            "name": "Grace Hopper",
            "picture": "https://example.com/grace.png",
            "exp": "1999999999"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let identity = verifier(&server).await.verify("good-token").await.unwrap();

    assert_eq!(identity.subject, "1234567890");
    assert_eq!(identity.email.as_deref(), Some("grace@example.com"));
    assert_eq!(identity.name.as_deref(), Some("Grace Hopper"));
}

#[tokio::test]
async fn unverified_email_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "aud": CLIENT_ID,
            "sub": "1234567890",
            "email": "someone@example.com",
            "email_verified": "false"
        })))
        .mount(&server)
        .await;

    let identity = verifier(&server).await.verify("token").await.unwrap();
    assert_eq!(identity.email, None);
}

#[tokio::test]
async fn foreign_audience_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "aud": "someone-else.apps.googleusercontent.com",
            "sub": "1234567890"
        })))
        .mount(&server)
        .await;

    let err = verifier(&server).await.verify("token").await.unwrap_err();
    assert!(matches!(err, CredentialError::Rejected(_)));
}

#[tokio::test]
async fn invalid_token_is_rejected_and_outage_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .and(query_param("id_token", "expired"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_token"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .and(query_param("id_token", "boom"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let verifier = verifier(&server).await;
    let err = verifier.verify("expired").await.unwrap_err();
    assert!(matches!(err, CredentialError::Rejected(_)));
    let err = verifier.verify("boom").await.unwrap_err();
    assert!(matches!(err, CredentialError::Unavailable(_)));
}

#[tokio::test]
async fn missing_client_id_disables_federated_login() {
    let server = MockServer::start().await;
    let verifier = GoogleTokenVerifier::new(format!("{}/tokeninfo", server.uri()), None).unwrap();

    let err = verifier.verify("anything").await.unwrap_err();
    assert!(matches!(err, CredentialError::Unavailable(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
