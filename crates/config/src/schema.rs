use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelprobeConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub vault: VaultConfig,
    pub probe: ProbeConfig,
    pub auth: AuthConfig,
    pub oauth: OAuthConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8650,
        }
    }
}

/// SQLite database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite://modelprobe.db?mode=rwc`.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://modelprobe.db?mode=rwc".into(),
        }
    }
}

/// Encryption-at-rest settings for stored API keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// 64-char hex encoding of the 32-byte ChaCha20-Poly1305 key.
    /// Required at startup; typically set via `${MODELPROBE_ENCRYPTION_KEY}`.
    #[serde(skip_serializing)]
    pub encryption_key: Option<Secret<String>>,
}

/// Batch probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Number of models tested concurrently in a batch run.
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { concurrency: 3 }
    }
}

/// Session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime in days.
    pub session_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { session_ttl_days: 7 }
    }
}

/// OAuth login providers. Each is optional; absent means the login
/// method is disabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub github: Option<OAuthClientConfig>,
    pub linuxdo: Option<OAuthClientConfig>,
}

/// Client credentials for one OAuth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: Secret<String>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn defaults_are_sensible() {
        let cfg = ModelprobeConfig::default();
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.probe.concurrency, 3);
        assert_eq!(cfg.auth.session_ttl_days, 7);
        assert!(cfg.vault.encryption_key.is_none());
        assert!(cfg.oauth.github.is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: ModelprobeConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [oauth.github]
            client_id     = "abc"
            client_secret = "shh"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.probe.concurrency, 3);
        let github = cfg.oauth.github.unwrap();
        assert_eq!(github.client_id, "abc");
        assert_eq!(github.client_secret.expose_secret(), "shh");
    }
}
