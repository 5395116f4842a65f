use axum::{
    http::{StatusCode, header, request::Parts},
    extract::FromRequestParts,
};

use crate::{state::AppState, store::User};

/// Session cookie name.
pub const SESSION_COOKIE: &str = "modelprobe_session";

/// Extractor that resolves the session cookie to the signed-in user.
/// Rejects with 401 when the cookie is missing, invalid, or expired.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie_header = parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let Some(token) = parse_cookie(cookie_header, SESSION_COOKIE) else {
            return Err((StatusCode::UNAUTHORIZED, "not authenticated"));
        };

        match state.store.session_user(token).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => Err((StatusCode::UNAUTHORIZED, "not authenticated")),
            Err(_) => Err((StatusCode::INTERNAL_SERVER_ERROR, "session lookup failed")),
        }
    }
}

/// Pull a cookie value out of a `Cookie:` header.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix(name)
            && let Some(value) = value.strip_prefix('=')
        {
            return Some(value);
        }
    }
    None
}
