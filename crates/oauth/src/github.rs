//! GitHub OAuth (authorization code flow, no PKCE).

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
    url::Url,
};

use {
    crate::{OAuthError, OAuthProvider, OAuthUserInfo, http_client},
    async_trait::async_trait,
};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_API_URL: &str = "https://api.github.com/user";
const SCOPE: &str = "user:email read:user";

pub struct GithubOAuth {
    client_id: String,
    client_secret: Secret<String>,
    token_url: String,
    user_api_url: String,
}

impl GithubOAuth {
    #[must_use]
    pub fn new(client_id: String, client_secret: Secret<String>) -> Self {
        Self {
            client_id,
            client_secret,
            token_url: TOKEN_URL.to_string(),
            user_api_url: USER_API_URL.to_string(),
        }
    }

    /// Point the token and user endpoints at a different host. Test hook.
    #[must_use]
    pub fn with_endpoints(mut self, token_url: String, user_api_url: String) -> Self {
        self.token_url = token_url;
        self.user_api_url = user_api_url;
        self
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GithubUser {
    id: u64,
    login: String,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[async_trait]
impl OAuthProvider for GithubOAuth {
    fn slug(&self) -> &'static str {
        "github"
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<String, OAuthError> {
        let mut url = Url::parse(AUTHORIZE_URL)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("state", state)
            .append_pair("scope", SCOPE)
            .append_pair("redirect_uri", redirect_uri);
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, OAuthError> {
        // GitHub takes JSON here and answers JSON when asked to.
        let res = http_client()
            .post(&self.token_url)
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret.expose_secret(),
                "code": code,
                "redirect_uri": redirect_uri,
            }))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = res.json().await?;
        if let Some(error) = token.error {
            return Err(OAuthError::Rejected {
                error,
                description: token.error_description.unwrap_or_default(),
            });
        }
        debug!("github token exchange succeeded");
        token.access_token.ok_or(OAuthError::MissingAccessToken)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<OAuthUserInfo, OAuthError> {
        let res = http_client()
            .get(&self.user_api_url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(OAuthError::FetchUser {
                status: status.as_u16(),
                body,
            });
        }

        let user: GithubUser = res.json().await?;
        debug!(login = %user.login, "fetched github user");
        Ok(OAuthUserInfo {
            provider: "github",
            oauth_id: user.id.to_string(),
            username: user.login,
            email: user.email,
            avatar_url: user.avatar_url,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_state_and_redirect() {
        let oauth = GithubOAuth::new("cid".into(), Secret::new("shh".into()));
        let url = oauth
            .authorize_url("abc123", "http://localhost:8650/api/auth/callback/github")
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("github.com"));

        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().collect();
        assert_eq!(pairs["client_id"], "cid");
        assert_eq!(pairs["state"], "abc123");
        assert_eq!(pairs["scope"], "user:email read:user");
        assert_eq!(
            pairs["redirect_uri"],
            "http://localhost:8650/api/auth/callback/github"
        );
    }
}
