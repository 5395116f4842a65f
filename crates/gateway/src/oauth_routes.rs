//! OAuth login redirect and callback endpoints.
//!
//! `/api/auth/oauth/{provider}` sends the browser to the provider with a
//! fresh `state` pinned in a short-lived cookie; the callback verifies that
//! state, exchanges the code, and signs the user in. The callback URL is
//! derived from each incoming request, so the same build works behind any
//! hostname.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};

use crate::{
    auth_middleware::parse_cookie,
    auth_routes::{internal_error, issue_session},
    state::AppState,
};

const STATE_COOKIE: &str = "modelprobe_oauth_state";

/// How long the state cookie stays valid.
const STATE_MAX_AGE_SECS: i64 = 600;

#[derive(serde::Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Scheme + host of the incoming request, honoring a reverse proxy's
/// `x-forwarded-proto`.
fn request_origin(headers: &HeaderMap) -> Option<String> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    Some(format!("{scheme}://{host}"))
}

fn callback_url(headers: &HeaderMap, slug: &str) -> Option<String> {
    Some(format!(
        "{}/api/auth/callback/{slug}",
        request_origin(headers)?
    ))
}

fn error_redirect(reason: &str) -> axum::response::Response {
    let location = format!("/?error={}", urlencoding::encode(reason));
    (
        StatusCode::FOUND,
        [(header::LOCATION, location)],
        (),
    )
        .into_response()
}

// ── Handlers ─────────────────────────────────────────────────────────────────

pub async fn oauth_start_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(oauth) = state.oauth.by_slug(&provider) else {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({ "error": "login method not available" })),
        )
            .into_response();
    };
    let Some(redirect_uri) = callback_url(&headers, oauth.slug()) else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!({ "error": "missing Host header" })),
        )
            .into_response();
    };

    let csrf_state = modelprobe_oauth::generate_state();
    let authorize = match oauth.authorize_url(&csrf_state, &redirect_uri) {
        Ok(url) => url,
        Err(e) => return internal_error("authorize url", &anyhow::anyhow!(e)),
    };

    tracing::debug!(provider = %provider, "starting oauth login");
    let state_cookie = format!(
        "{STATE_COOKIE}={csrf_state}; HttpOnly; SameSite=Lax; Path=/; Max-Age={STATE_MAX_AGE_SECS}"
    );
    (
        StatusCode::FOUND,
        [
            (header::SET_COOKIE, state_cookie),
            (header::LOCATION, authorize),
        ],
        (),
    )
        .into_response()
}

pub async fn oauth_callback_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(oauth) = state.oauth.by_slug(&provider) else {
        return error_redirect("unknown_provider");
    };

    // The user declined at the provider.
    if let Some(error) = params.error {
        return error_redirect(&error);
    }
    let (Some(code), Some(csrf_state)) = (params.code, params.state) else {
        return error_redirect("missing_params");
    };

    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let stored_state = parse_cookie(cookie_header, STATE_COOKIE);
    if stored_state != Some(csrf_state.as_str()) {
        tracing::warn!(provider = %provider, "oauth state mismatch");
        return error_redirect("invalid_state");
    }

    let Some(redirect_uri) = callback_url(&headers, oauth.slug()) else {
        return error_redirect("missing_host");
    };

    let token = match oauth.exchange_code(&code, &redirect_uri).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "oauth code exchange failed");
            return error_redirect("token_exchange_failed");
        },
    };
    let info = match oauth.fetch_user(&token).await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "oauth user fetch failed");
            return error_redirect("fetch_user_failed");
        },
    };

    let user = match state.store.upsert_oauth_user(&info).await {
        Ok(user) => user,
        Err(e) => return internal_error("oauth user upsert", &e),
    };
    tracing::info!(provider = %provider, user_id = user.id, "oauth login");

    // Issue the session, then rewrite the response into a redirect that
    // also clears the state cookie.
    let session = issue_session(&state, &user, StatusCode::OK).await;
    if session.status() != StatusCode::OK {
        return session;
    }
    let Some(session_cookie) = session
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
    else {
        return error_redirect("session_failed");
    };

    let clear_state =
        format!("{STATE_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    (
        StatusCode::FOUND,
        [
            (header::SET_COOKIE, session_cookie),
            (header::SET_COOKIE, clear_state),
            (header::LOCATION, "/".to_string()),
        ],
        (),
    )
        .into_response()
}
