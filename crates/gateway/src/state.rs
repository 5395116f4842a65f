use std::sync::Arc;

use secrecy::ExposeSecret;

use {
    modelprobe_config::ModelprobeConfig,
    modelprobe_oauth::{GithubOAuth, LinuxDoOAuth, OAuthProvider},
    modelprobe_probe::ProbeRunner,
    modelprobe_vault::SecretCodec,
};

use crate::store::Store;

/// The OAuth login methods this deployment has client credentials for.
#[derive(Default)]
pub struct OAuthRegistry {
    providers: Vec<Arc<dyn OAuthProvider>>,
}

impl OAuthRegistry {
    pub fn from_config(cfg: &modelprobe_config::OAuthConfig) -> Self {
        let mut providers: Vec<Arc<dyn OAuthProvider>> = Vec::new();
        if let Some(github) = &cfg.github {
            providers.push(Arc::new(GithubOAuth::new(
                github.client_id.clone(),
                github.client_secret.clone(),
            )));
        }
        if let Some(linuxdo) = &cfg.linuxdo {
            providers.push(Arc::new(LinuxDoOAuth::new(
                linuxdo.client_id.clone(),
                linuxdo.client_secret.clone(),
            )));
        }
        Self { providers }
    }

    /// Registry with explicit providers. Test hook.
    #[must_use]
    pub fn with_providers(providers: Vec<Arc<dyn OAuthProvider>>) -> Self {
        Self { providers }
    }

    pub fn by_slug(&self, slug: &str) -> Option<Arc<dyn OAuthProvider>> {
        self.providers.iter().find(|p| p.slug() == slug).cloned()
    }
}

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub codec: SecretCodec,
    pub runner: ProbeRunner,
    pub oauth: Arc<OAuthRegistry>,
    pub session_ttl_days: i64,
}

impl AppState {
    /// Wire up state from loaded config. Fails when the encryption key is
    /// missing or not valid hex, since nothing useful works without it.
    pub async fn from_config(
        pool: sqlx::SqlitePool,
        config: &ModelprobeConfig,
    ) -> anyhow::Result<Self> {
        let key_hex = config
            .vault
            .encryption_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("vault.encryption_key is not configured"))?;
        let codec = SecretCodec::from_hex(key_hex.expose_secret())
            .map_err(|e| anyhow::anyhow!("invalid vault.encryption_key: {e}"))?;

        let store = Arc::new(Store::new(pool).await?);

        Ok(Self {
            store,
            codec,
            runner: ProbeRunner::new(config.probe.concurrency),
            oauth: Arc::new(OAuthRegistry::from_config(&config.oauth)),
            session_ttl_days: config.auth.session_ttl_days,
        })
    }
}
