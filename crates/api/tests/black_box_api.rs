//! Black-box tests: the real router on an ephemeral port, driven over HTTP.
//!
//! Storage and mail run on the in-memory ports so the suite needs no
//! external services.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use kardex_accounts::memory::{InMemoryIdentityStore, InMemoryKeyValueStore, RecordingMailer};
use kardex_accounts::verification::VERIFICATION_KEY_PREFIX;
use kardex_accounts::{
    AccountFlows, IdentityStore, KeyValueStore, KvError, SessionRegistry, VerificationRegistry,
};
use kardex_auth::{Argon2Hasher, Role, TokenConfig, TokenSigner};
use kardex_core::SystemClock;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    kv: Arc<InMemoryKeyValueStore>,
    store: Arc<InMemoryIdentityStore>,
}

impl TestServer {
    async fn spawn() -> Self {
        let clock = Arc::new(SystemClock);
        let kv = Arc::new(InMemoryKeyValueStore::new(clock.clone()));
        let store = Arc::new(InMemoryIdentityStore::new());
        let mailer = Arc::new(RecordingMailer::new());

        let kv_dyn: Arc<dyn KeyValueStore> = kv.clone();
        let store_dyn: Arc<dyn IdentityStore> = store.clone();

        let flows = Arc::new(AccountFlows::new(
            store_dyn,
            SessionRegistry::new(kv_dyn.clone()),
            VerificationRegistry::new(kv_dyn),
            Arc::new(TokenSigner::new(TokenConfig::new("test-secret"))),
            Arc::new(Argon2Hasher),
            mailer,
            clock,
        ));

        // Same router as prod, bound to an ephemeral port.
        let app = kardex_api::app::build_app(flows);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            kv,
            store,
        }
    }

    /// The pending verification code for the single just-signed-up account.
    async fn pending_code(&self) -> Result<String, KvError> {
        let keys = self.kv.scan_prefix(VERIFICATION_KEY_PREFIX).await?;
        assert_eq!(keys.len(), 1, "expected exactly one pending code");
        Ok(keys[0]
            .strip_prefix(VERIFICATION_KEY_PREFIX)
            .unwrap()
            .to_string())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn sign_up(client: &reqwest::Client, srv: &TestServer, email: &str) -> String {
    let res = client
        .post(format!("{}/api/v1/users/sign-up", srv.base_url))
        .json(&json!({
            "full_name": "Alice Quispe",
            "username": "alice",
            "email": email,
            "password": "s3cret-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    body["user_id"].as_str().unwrap().to_string()
}

async fn verify(client: &reqwest::Client, srv: &TestServer) {
    let code = srv.pending_code().await.unwrap();
    let res = client
        .post(format!("{}/api/v1/users/verify-email", srv.base_url))
        .json(&json!({ "verification_code": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

/// Sign in and return `(access_token, refresh_cookie_value, set_cookie_header)`.
async fn sign_in(
    client: &reqwest::Client,
    srv: &TestServer,
    email: &str,
) -> (String, String, String) {
    let res = client
        .post(format!("{}/api/v1/users/sign-in", srv.base_url))
        .json(&json!({ "email": email, "password": "s3cret-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let set_cookie = res
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("sign-in must set the refresh cookie")
        .to_str()
        .unwrap()
        .to_string();
    let cookie_value = set_cookie
        .split(';')
        .next()
        .and_then(|kv| kv.strip_prefix("refresh_token="))
        .expect("refresh_token cookie")
        .to_string();

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    let access = body["access_token"].as_str().unwrap().to_string();

    (access, cookie_value, set_cookie)
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/v1/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn full_account_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let user_id = sign_up(&client, &srv, "alice@example.com").await;
    verify(&client, &srv).await;

    let (_access, refresh, set_cookie) = sign_in(&client, &srv, "alice@example.com").await;

    // Cookie is locked down and scoped to the rotation endpoint.
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(set_cookie.contains("Path=/api/v1/users/refresh-token"));
    assert!(set_cookie.contains("Max-Age=604800"));

    // Rotate.
    let res = client
        .post(format!("{}/api/v1/users/refresh-token", srv.base_url))
        .header(reqwest::header::COOKIE, format!("refresh_token={refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rotated_cookie = res
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(rotated_cookie, set_cookie);

    // The pre-rotation token is stale now.
    let res = client
        .post(format!("{}/api/v1/users/refresh-token", srv.base_url))
        .header(reqwest::header::COOKIE, format!("refresh_token={refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Sign out, then the session is gone.
    let res = client
        .post(format!("{}/api/v1/users/sign-out", srv.base_url))
        .json(&json!({ "user_id": user_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/api/v1/users/sign-out", srv.base_url))
        .json(&json!({ "user_id": user_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_sign_up_conflicts() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    sign_up(&client, &srv, "alice@example.com").await;

    let res = client
        .post(format!("{}/api/v1/users/sign-up", srv.base_url))
        .json(&json!({
            "full_name": "Alice Again",
            "username": "alice2",
            "email": "alice@example.com",
            "password": "s3cret-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unverified_accounts_cannot_sign_in() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    sign_up(&client, &srv, "alice@example.com").await;

    let res = client
        .post(format!("{}/api/v1/users/sign-in", srv.base_url))
        .json(&json!({ "email": "alice@example.com", "password": "s3cret-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verify_email_requires_the_code_field() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/users/verify-email", srv.base_url))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn used_verification_codes_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    sign_up(&client, &srv, "alice@example.com").await;
    let code = srv.pending_code().await.unwrap();

    for expected in [StatusCode::OK, StatusCode::BAD_REQUEST] {
        let res = client
            .post(format!("{}/api/v1/users/verify-email", srv.base_url))
            .json(&json!({ "verification_code": code }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), expected);
    }
}

#[tokio::test]
async fn refresh_without_a_cookie_is_unauthorized() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/users/refresh-token", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_endpoints_are_role_gated() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let user_id = sign_up(&client, &srv, "alice@example.com").await;
    verify(&client, &srv).await;
    let (access, _, _) = sign_in(&client, &srv, "alice@example.com").await;

    // A plain user is rejected.
    let res = client
        .get(format!("{}/api/v1/users/", srv.base_url))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // No token at all is unauthorized.
    let res = client
        .get(format!("{}/api/v1/users/", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Promote to admin and retry.
    let parsed = user_id.parse().unwrap();
    let mut identity = srv.store.find_by_id(parsed).await.unwrap().unwrap();
    identity.role = Role::Admin;
    srv.store.update(&identity).await.unwrap();

    let res = client
        .get(format!("{}/api/v1/users/", srv.base_url))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listed: serde_json::Value = res.json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["email"], "alice@example.com");
    assert_eq!(listed[0]["full_name"], "Alice Quispe");
}

#[tokio::test]
async fn admins_can_delete_accounts() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let user_id = sign_up(&client, &srv, "alice@example.com").await;
    verify(&client, &srv).await;
    let (access, _, _) = sign_in(&client, &srv, "alice@example.com").await;

    let parsed = user_id.parse().unwrap();
    let mut identity = srv.store.find_by_id(parsed).await.unwrap().unwrap();
    identity.role = Role::Admin;
    srv.store.update(&identity).await.unwrap();

    let res = client
        .delete(format!("{}/api/v1/users/delete", srv.base_url))
        .bearer_auth(&access)
        .json(&json!({ "user_id": user_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Deleting again reports the account gone.
    let res = client
        .delete(format!("{}/api/v1/users/delete", srv.base_url))
        .bearer_auth(&access)
        .json(&json!({ "user_id": user_id }))
        .send()
        .await
        .unwrap();
    // The admin identity itself was deleted, so the gate now rejects the
    // token outright.
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
