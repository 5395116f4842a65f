//! Password registration and login under `/api/auth`.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::{
    auth_middleware::{CurrentUser, SESSION_COOKIE, parse_cookie},
    state::AppState,
    store::User,
};

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 6;

#[derive(serde::Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
}

#[derive(serde::Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

fn user_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "email": user.email,
        "username": user.username,
        "oauthProvider": user.oauth_provider,
        "avatarUrl": user.avatar_url,
        "createdAt": user.created_at,
    })
}

/// Cheap shape check; the mail server is the real validator.
fn email_looks_valid(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !local.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.contains(char::is_whitespace)
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// 200/201 response that also sets the session cookie.
pub(crate) fn session_response(
    status: StatusCode,
    token: &str,
    max_age_secs: i64,
    body: serde_json::Value,
) -> axum::response::Response {
    let cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}"
    );
    (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

fn clear_session_response() -> axum::response::Response {
    let cookie = format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "success": true })),
    )
        .into_response()
}

// ── Handlers ─────────────────────────────────────────────────────────────────

pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> impl IntoResponse {
    if body.email.is_empty() || body.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "email and password are required" })),
        )
            .into_response();
    }
    if !email_looks_valid(&body.email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid email address" })),
        )
            .into_response();
    }
    if body.password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("password must be at least {MIN_PASSWORD_LEN} characters")
            })),
        )
            .into_response();
    }

    match state.store.user_by_email(&body.email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(serde_json::json!({ "error": "email already registered" })),
            )
                .into_response();
        },
        Ok(None) => {},
        Err(e) => return internal_error("user lookup", &e),
    }

    let user = match state.store.create_user(&body.email, &body.password).await {
        Ok(user) => user,
        Err(e) => return internal_error("user create", &e),
    };

    issue_session(&state, &user, StatusCode::CREATED).await
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> impl IntoResponse {
    match state.store.verify_login(&body.email, &body.password).await {
        Ok(Some(user)) => issue_session(&state, &user, StatusCode::OK).await,
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid email or password" })),
        )
            .into_response(),
        Err(e) => internal_error("login", &e),
    }
}

pub async fn logout_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> impl IntoResponse {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if let Some(token) = parse_cookie(cookie_header, SESSION_COOKIE) {
        let _ = state.store.delete_session(token).await;
    }
    clear_session_response()
}

pub async fn me_handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(serde_json::json!({ "user": user_json(&user) }))
}

// ── Shared helpers ───────────────────────────────────────────────────────────

pub(crate) async fn issue_session(
    state: &AppState,
    user: &User,
    status: StatusCode,
) -> axum::response::Response {
    match state.store.create_session(user.id, state.session_ttl_days).await {
        Ok(token) => session_response(
            status,
            &token,
            state.session_ttl_days * 86_400,
            serde_json::json!({ "user": user_json(user) }),
        ),
        Err(e) => internal_error("session create", &e),
    }
}

pub(crate) fn internal_error(context: &str, e: &anyhow::Error) -> axum::response::Response {
    tracing::error!(error = %e, "{context} failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal error" })),
    )
        .into_response()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::email_looks_valid;

    #[test]
    fn email_shape_check() {
        assert!(email_looks_valid("a@example.com"));
        assert!(email_looks_valid("first.last@sub.example.org"));
        assert!(!email_looks_valid("not-an-email"));
        assert!(!email_looks_valid("spaces in@example.com"));
        assert!(!email_looks_valid("a@nodot"));
        assert!(!email_looks_valid("@example.com"));
    }
}
