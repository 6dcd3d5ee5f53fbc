//! Token requests against a stub token endpoint, through `reqwest`.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use http::StatusCode;
use paic_token::{
    Error as _, ErrorKind, TokenError,
    config::ClientConfig,
    crypto::signer::RsaPrivateKey,
    jwt::AssertionClaims,
    secrecy::ExposeSecret as _,
    service_account::{ServiceAccountClient, get_access_token},
};
use rsa::signature::Verifier as _;
use rsa::traits::{PrivateKeyParts as _, PublicKeyParts as _};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path},
};

const TOKEN_PATH: &str = "/am/oauth2/access_token";

fn private_key() -> &'static rsa::RsaPrivateKey {
    static KEY: OnceLock<rsa::RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap())
}

fn b64(value: &rsa::BigUint) -> String {
    URL_SAFE_NO_PAD.encode(value.to_bytes_be())
}

fn private_jwk() -> Value {
    jwk_for(private_key())
}

fn jwk_for(key: &rsa::RsaPrivateKey) -> Value {
    let primes = key.primes();
    json!({
        "kty": "RSA",
        "use": "sig",
        "alg": "RS256",
        "n": b64(key.n()),
        "e": b64(key.e()),
        "d": b64(key.d()),
        "p": b64(&primes[0]),
        "q": b64(&primes[1]),
    })
}

fn config(platform_url: &str) -> ClientConfig {
    ClientConfig::builder()
        .service_account_id("sa-1234")
        .jwk(private_jwk())
        .platform_url(platform_url)
        .scope("fr:am:* fr:idm:*")
        .build()
}

fn token_request() -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
}

fn verify_assertion(assertion: &str) -> AssertionClaims {
    let (signing_input, signature) = assertion.rsplit_once('.').unwrap();
    let verifying_key =
        rsa::pkcs1v15::VerifyingKey::<rsa::sha2::Sha256>::new(private_key().to_public_key());
    let signature =
        rsa::pkcs1v15::Signature::try_from(URL_SAFE_NO_PAD.decode(signature).unwrap().as_slice())
            .unwrap();
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .unwrap();

    let (header, payload) = signing_input.split_once('.').unwrap();
    let header: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap();
    assert_eq!(header["alg"], "RS256");
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
}

#[tokio::test]
async fn issues_token_for_signed_assertion() {
    let server = MockServer::start().await;
    token_request()
        .and(body_string_contains("client_id=service-account"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "abc123",
            "scope": "fr:am:*",
            "expires_in": 899,
        })))
        .expect(1)
        .mount(&server)
        .await;

    // A trailing slash on the platform URL must not produce a double slash.
    let response = get_access_token(&config(&format!("{}/", server.uri())))
        .await
        .unwrap();

    assert_eq!(response.access_token.expose_secret(), "abc123");
    assert_eq!(response.scope.as_deref(), Some("fr:am:*"));
    assert_eq!(response.expires_in, Some(899));

    let requests = server.received_requests().await.unwrap();
    let form: HashMap<String, String> = serde_html_form::from_bytes(&requests[0].body).unwrap();
    assert_eq!(form["scope"], "fr:am:* fr:idm:*");

    let claims = verify_assertion(&form["assertion"]);
    assert_eq!(claims.iss, "sa-1234");
    assert_eq!(claims.sub, "sa-1234");
    assert_eq!(claims.aud, format!("{}{TOKEN_PATH}", server.uri()));
    assert_eq!(claims.jti.len(), 22);
}

#[tokio::test]
async fn repeated_requests_use_distinct_assertions() {
    let server = MockServer::start().await;
    token_request()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "abc123"})))
        .expect(2)
        .mount(&server)
        .await;

    let client = ServiceAccountClient::from_config(&config(&server.uri())).unwrap();
    client.access_token().await.unwrap();
    client.access_token().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let assertions: Vec<String> = requests
        .iter()
        .map(|request| {
            let mut form: HashMap<String, String> =
                serde_html_form::from_bytes(&request.body).unwrap();
            form.remove("assertion").unwrap()
        })
        .collect();
    assert_ne!(assertions[0], assertions[1]);
    assert_ne!(
        verify_assertion(&assertions[0]).jti,
        verify_assertion(&assertions[1]).jti
    );
}

#[tokio::test]
async fn rejected_request_keeps_status_and_body() {
    let server = MockServer::start().await;
    token_request()
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let error = get_access_token(&config(&server.uri())).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::TokenEndpoint);
    assert!(!error.is_retryable());
    assert!(matches!(
        &error,
        TokenError::TokenEndpoint { status, body }
            if *status == StatusCode::BAD_REQUEST && body == r#"{"error":"invalid_grant"}"#
    ));
    assert_eq!(error.oauth2_error().unwrap().error, "invalid_grant");
}

#[tokio::test]
async fn server_error_is_retryable() {
    let server = MockServer::start().await;
    token_request()
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let error = get_access_token(&config(&server.uri())).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::TokenEndpoint);
    assert!(error.is_retryable());
}

#[tokio::test]
async fn success_without_token_is_protocol_error() {
    let server = MockServer::start().await;
    token_request()
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"scope": "fr:am:*", "expires_in": 899})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let error = get_access_token(&config(&server.uri())).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Protocol);
    assert!(matches!(error, TokenError::Protocol { .. }));
}

#[tokio::test]
async fn unexpected_expires_in_still_returns_token() {
    let server = MockServer::start().await;
    token_request()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "abc123", "expires_in": -1, "scope": null})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = get_access_token(&config(&server.uri())).await.unwrap();

    assert_eq!(response.access_token.expose_secret(), "abc123");
    assert_eq!(response.expires_in, None);
}

#[tokio::test]
async fn non_positive_lifetime_fails_before_request() {
    let server = MockServer::start().await;
    token_request()
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    for exp_seconds in [0, -1] {
        let client = ServiceAccountClient::builder()
            .http_client(reqwest::Client::new())
            .service_account_id("sa-1234")
            .signing_key(RsaPrivateKey::from_jwk_value(&private_jwk()).unwrap())
            .platform_url(&server.uri())
            .unwrap()
            .scopes(["fr:am:*"])
            .exp_seconds(exp_seconds)
            .build();

        let error = client.access_token().await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Claim);
        assert!(matches!(error, TokenError::Claim { .. }));
    }
}

#[tokio::test]
async fn malformed_key_fails_before_request() {
    let server = MockServer::start().await;
    token_request()
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    for component in ["n", "d", "q"] {
        let mut jwk = private_jwk();
        jwk.as_object_mut().unwrap().remove(component);
        let config = ClientConfig::builder()
            .service_account_id("sa-1234")
            .jwk(jwk)
            .platform_url(server.uri())
            .scope("fr:am:*")
            .build();

        let error = get_access_token(&config).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Key);
        assert!(matches!(error, TokenError::Key { .. }));
    }
}

#[tokio::test]
async fn undersized_key_fails_before_request() {
    let server = MockServer::start().await;
    token_request()
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let small = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 256).unwrap();
    let config = ClientConfig::builder()
        .service_account_id("sa-1234")
        .jwk(jwk_for(&small))
        .platform_url(server.uri())
        .scope("fr:am:*")
        .build();

    let error = get_access_token(&config).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Key);
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let server = MockServer::start().await;
    token_request()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "abc123"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = config(&server.uri());
    config.timeout = Duration::from_millis(500);

    let error = get_access_token(&config).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Network);
    assert!(error.is_retryable());
}

#[tokio::test]
async fn unreachable_endpoint_is_network_error() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let platform_url = format!("http://127.0.0.1:{port}");

    let error = get_access_token(&config(&platform_url)).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Network);
    assert!(matches!(error, TokenError::Network { .. }));
    assert!(error.is_retryable());
}
