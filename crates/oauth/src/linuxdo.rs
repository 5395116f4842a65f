//! LinuxDo OAuth.
//!
//! LinuxDo is a Discourse forum; connect.linux.do speaks plain OAuth2 with
//! form-urlencoded token exchange. The user endpoint sometimes nests the
//! profile under a `user` key, Discourse style, and sometimes returns it
//! flat, so both shapes are accepted.

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

const AUTHORIZE_URL: &str = "https://connect.linux.do/oauth2/authorize";
const TOKEN_URL: &str = "https://connect.linux.do/oauth2/token";
const USER_API_URL: &str = "https://connect.linux.do/api/user";
const SCOPE: &str = "read";

pub struct LinuxDoOAuth {
    client_id: String,
    client_secret: Secret<String>,
    token_url: String,
    user_api_url: String,
}

impl LinuxDoOAuth {
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
struct LinuxDoUser {
    id: u64,
    username: String,
    email: Option<String>,
    avatar_url: Option<String>,
    /// Upstream identity id when the forum account is itself federated.
    external_id: Option<serde_json::Value>,
}

#[async_trait]
impl OAuthProvider for LinuxDoOAuth {
    fn slug(&self) -> &'static str {
        "linuxdo"
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
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let res = http_client().post(&self.token_url).form(&form).send().await?;

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
        debug!("linuxdo token exchange succeeded");
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

        let payload: serde_json::Value = res.json().await?;
        // Discourse nests the profile under `user`; accept both shapes.
        let user_value = match payload.get("user") {
            Some(nested) if nested.is_object() => nested.clone(),
            _ => payload,
        };
        let user: LinuxDoUser = serde_json::from_value(user_value).map_err(|e| {
            OAuthError::FetchUser {
                status: status.as_u16(),
                body: format!("unexpected user payload: {e}"),
            }
        })?;
        debug!(username = %user.username, "fetched linuxdo user");

        let avatar_url = user.avatar_url.clone().or_else(|| {
            Some(format!(
                "https://connect.linux.do/user_avatar/linux.do/{}/size/240",
                user.username
            ))
        });
        // Prefer the federated id when present so re-login maps to the
        // same account.
        let oauth_id = match &user.external_id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => user.id.to_string(),
        };

        Ok(OAuthUserInfo {
            provider: "linuxdo",
            oauth_id,
            username: user.username,
            email: user.email,
            avatar_url,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_uses_read_scope() {
        let oauth = LinuxDoOAuth::new("cid".into(), Secret::new("shh".into()));
        let url = oauth
            .authorize_url("st", "http://localhost:8650/api/auth/callback/linuxdo")
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("connect.linux.do"));

        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().collect();
        assert_eq!(pairs["scope"], "read");
        assert_eq!(pairs["response_type"], "code");
    }

    #[test]
    fn nested_and_flat_user_payloads_parse() {
        let nested: LinuxDoUser = serde_json::from_str(
            r#"{ "id": 7, "username": "alice", "avatar_url": null, "email": null, "external_id": 42 }"#,
        )
        .unwrap();
        assert_eq!(nested.id, 7);
        assert_eq!(nested.external_id, Some(serde_json::json!(42)));

        let flat: LinuxDoUser =
            serde_json::from_str(r#"{ "id": 9, "username": "bob", "email": "b@example.com" }"#)
                .unwrap();
        assert_eq!(flat.username, "bob");
        assert!(flat.external_id.is_none());
    }
}
