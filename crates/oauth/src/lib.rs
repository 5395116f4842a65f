//! OAuth 2.0 login providers.
//!
//! Implements the authorization code flow against GitHub and LinuxDo
//! (a Discourse instance). The gateway handles the redirect endpoints;
//! this crate builds authorization URLs, exchanges codes for tokens, and
//! fetches a normalized user profile. The `state` parameter is generated
//! here and verified by the caller against its own cookie.

use {async_trait::async_trait, rand::RngCore, serde::Serialize};

pub mod github;
pub mod linuxdo;

pub use {github::GithubOAuth, linuxdo::LinuxDoOAuth};

pub(crate) const USER_AGENT: &str = "modelprobe";
pub(crate) const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Identity fields shared by every OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthUserInfo {
    /// Provider slug, `"github"` or `"linuxdo"`.
    pub provider: &'static str,
    /// Stable id at the provider, stringified.
    pub oauth_id: String,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("token exchange failed with HTTP {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("provider rejected the code: {error}: {description}")]
    Rejected { error: String, description: String },

    #[error("token response carried no access token")]
    MissingAccessToken,

    #[error("failed to fetch user profile: HTTP {status}: {body}")]
    FetchUser { status: u16, body: String },

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// One configured OAuth login method.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Provider slug used in routes and user records.
    fn slug(&self) -> &'static str;

    /// Build the URL the browser is redirected to. `redirect_uri` is
    /// computed per request by the caller from the incoming host, never
    /// from global state.
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<String, OAuthError>;

    /// Exchange the callback `code` for an access token.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, OAuthError>;

    /// Fetch the profile behind an access token.
    async fn fetch_user(&self, access_token: &str) -> Result<OAuthUserInfo, OAuthError>;
}

/// Random 128-bit hex state for CSRF protection.
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn http_client() -> &'static reqwest::Client {
    static CLIENT: std::sync::LazyLock<reqwest::Client> = std::sync::LazyLock::new(|| {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default()
    });
    &CLIENT
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::generate_state;

    #[test]
    fn state_is_32_hex_chars_and_unique() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
