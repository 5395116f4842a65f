//! Integration tests for the OAuth code-exchange and profile-fetch flows
//! against stub identity servers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;

use {
    axum::{
        Form, Json, Router,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    },
    secrecy::Secret,
    tokio::net::TcpListener,
};

use modelprobe_oauth::{GithubOAuth, LinuxDoOAuth, OAuthError, OAuthProvider};

/// Serve a router on an ephemeral local port, returning its base URL.
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn github(base: &str) -> GithubOAuth {
    GithubOAuth::new("cid".into(), Secret::new("shh".into()))
        .with_endpoints(format!("{base}/login/oauth/access_token"), format!("{base}/user"))
}

fn linuxdo(base: &str) -> LinuxDoOAuth {
    LinuxDoOAuth::new("cid".into(), Secret::new("shh".into()))
        .with_endpoints(format!("{base}/oauth2/token"), format!("{base}/api/user"))
}

// ── GitHub ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn github_exchanges_code_as_json() {
    let app = Router::new().route(
        "/login/oauth/access_token",
        post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
            assert_eq!(headers.get("accept").unwrap(), "application/json");
            assert_eq!(body["client_id"], "cid");
            assert_eq!(body["client_secret"], "shh");
            assert_eq!(body["code"], "the-code");
            assert_eq!(body["redirect_uri"], "http://localhost/cb");
            Json(serde_json::json!({ "access_token": "gho_token" }))
        }),
    );
    let base = serve(app).await;

    let token = github(&base)
        .exchange_code("the-code", "http://localhost/cb")
        .await
        .unwrap();
    assert_eq!(token, "gho_token");
}

#[tokio::test]
async fn github_exchange_surfaces_provider_rejection() {
    let app = Router::new().route(
        "/login/oauth/access_token",
        post(|| async {
            // GitHub reports bad codes inside a 200 body.
            Json(serde_json::json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            }))
        }),
    );
    let base = serve(app).await;

    let err = github(&base)
        .exchange_code("stale", "http://localhost/cb")
        .await
        .unwrap_err();
    assert!(
        matches!(err, OAuthError::Rejected { ref error, .. } if error == "bad_verification_code"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn github_exchange_without_token_is_an_error() {
    let app = Router::new().route(
        "/login/oauth/access_token",
        post(|| async { Json(serde_json::json!({})) }),
    );
    let base = serve(app).await;

    let err = github(&base)
        .exchange_code("c", "http://localhost/cb")
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::MissingAccessToken));
}

#[tokio::test]
async fn github_fetches_user_with_bearer_token() {
    let app = Router::new().route(
        "/user",
        get(|headers: HeaderMap| async move {
            assert_eq!(
                headers.get("authorization").unwrap().to_str().unwrap(),
                "Bearer gho_token"
            );
            Json(serde_json::json!({
                "id": 12345,
                "login": "octocat",
                "email": "octo@example.com",
                "avatar_url": "https://avatars.example.com/u/12345"
            }))
        }),
    );
    let base = serve(app).await;

    let user = github(&base).fetch_user("gho_token").await.unwrap();
    assert_eq!(user.provider, "github");
    assert_eq!(user.oauth_id, "12345");
    assert_eq!(user.username, "octocat");
    assert_eq!(user.email.as_deref(), Some("octo@example.com"));
}

#[tokio::test]
async fn github_fetch_user_propagates_upstream_status() {
    let app = Router::new().route(
        "/user",
        get(|| async { (StatusCode::UNAUTHORIZED, "bad credentials") }),
    );
    let base = serve(app).await;

    let err = github(&base).fetch_user("revoked").await.unwrap_err();
    assert!(matches!(err, OAuthError::FetchUser { status: 401, .. }));
}

// ── LinuxDo ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn linuxdo_exchanges_code_as_form() {
    let app = Router::new().route(
        "/oauth2/token",
        post(|Form(form): Form<std::collections::HashMap<String, String>>| async move {
            assert_eq!(form["grant_type"], "authorization_code");
            assert_eq!(form["client_id"], "cid");
            assert_eq!(form["client_secret"], "shh");
            assert_eq!(form["code"], "the-code");
            Json(serde_json::json!({ "access_token": "ld_token" }))
        }),
    );
    let base = serve(app).await;

    let token = linuxdo(&base)
        .exchange_code("the-code", "http://localhost/cb")
        .await
        .unwrap();
    assert_eq!(token, "ld_token");
}

#[tokio::test]
async fn linuxdo_exchange_propagates_http_failure() {
    let app = Router::new().route(
        "/oauth2/token",
        post(|| async { (StatusCode::BAD_REQUEST, "invalid_grant") }),
    );
    let base = serve(app).await;

    let err = linuxdo(&base)
        .exchange_code("stale", "http://localhost/cb")
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::TokenExchange { status: 400, .. }));
}

#[tokio::test]
async fn linuxdo_fetches_nested_discourse_profile() {
    let app = Router::new().route(
        "/api/user",
        get(|| async {
            Json(serde_json::json!({
                "user": {
                    "id": 7,
                    "username": "alice",
                    "email": "a@example.com",
                    "external_id": "ext-99"
                }
            }))
        }),
    );
    let base = serve(app).await;

    let user = linuxdo(&base).fetch_user("ld_token").await.unwrap();
    assert_eq!(user.provider, "linuxdo");
    assert_eq!(user.oauth_id, "ext-99");
    assert_eq!(user.username, "alice");
    // No avatar in the payload, so the forum avatar URL is synthesized.
    assert_eq!(
        user.avatar_url.as_deref(),
        Some("https://connect.linux.do/user_avatar/linux.do/alice/size/240")
    );
}

#[tokio::test]
async fn linuxdo_fetches_flat_profile() {
    let app = Router::new().route(
        "/api/user",
        get(|| async {
            Json(serde_json::json!({
                "id": 9,
                "username": "bob",
                "avatar_url": "https://cdn.example.com/bob.png"
            }))
        }),
    );
    let base = serve(app).await;

    let user = linuxdo(&base).fetch_user("ld_token").await.unwrap();
    assert_eq!(user.oauth_id, "9");
    assert_eq!(user.username, "bob");
    assert_eq!(user.avatar_url.as_deref(), Some("https://cdn.example.com/bob.png"));
}
