//! Upstream AI provider adapters.
//!
//! Each adapter knows how to list the models an API key can reach and how to
//! fire a minimal chat request at one model to check it responds. Listing
//! propagates upstream failures; a model test never errors and instead folds
//! everything into a [`TestReport`].

use std::{sync::LazyLock, time::Duration};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use {anthropic::AnthropicAdapter, gemini::GeminiAdapter, openai::OpenAiAdapter};

/// Timeout for model listing requests.
pub(crate) const LIST_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for a single model test request.
pub(crate) const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client. Per-request timeouts are set by the adapters, so the
/// client itself carries none.
pub(crate) static HTTP: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

// ── Provider identity ───────────────────────────────────────────────────────

/// The upstream API families modelprobe can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Default API endpoint, for providers that have a canonical one.
    /// OpenAI-compatible endpoints vary per vendor, so openai has none and
    /// callers must supply a base URL.
    #[must_use]
    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => None,
            Self::Anthropic => Some("https://api.anthropic.com"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" => Ok(Self::Gemini),
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Wire-independent result types ───────────────────────────────────────────

/// A model as reported by an upstream, normalized across providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedModel {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Outcome of poking one model with a minimal chat request.
///
/// This is always produced, never an `Err`: unreachable hosts, auth
/// rejections, timeouts, and empty responses all land in `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub success: bool,
    /// Elapsed milliseconds; the wire field is `latency`.
    #[serde(rename = "latency")]
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestReport {
    #[must_use]
    pub fn ok(latency_ms: u64) -> Self {
        Self {
            success: true,
            latency_ms,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            latency_ms,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider requires a base URL")]
    MissingBaseUrl,

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),
}

// ── Adapter trait ───────────────────────────────────────────────────────────

/// One upstream API family.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// List every model the key can reach. Paginating providers follow the
    /// cursor to the end; any page failing fails the whole listing.
    async fn fetch_models(
        &self,
        base_url: Option<&str>,
        api_key: &str,
    ) -> Result<Vec<NormalizedModel>, ProviderError>;

    /// Send a minimal chat request to one model. Infallible by contract.
    async fn test_model(&self, base_url: Option<&str>, api_key: &str, model_id: &str)
    -> TestReport;
}

/// Adapter for a provider kind.
#[must_use]
pub fn adapter_for(kind: ProviderKind) -> Box<dyn ModelProvider> {
    match kind {
        ProviderKind::OpenAi => Box::new(OpenAiAdapter),
        ProviderKind::Anthropic => Box::new(AnthropicAdapter),
        ProviderKind::Gemini => Box::new(GeminiAdapter),
    }
}

/// Resolve the effective base URL: explicit value, else the provider
/// default, with any trailing slashes stripped before paths are appended.
pub(crate) fn resolve_base(
    kind: ProviderKind,
    base_url: Option<&str>,
) -> Result<String, ProviderError> {
    let base = match base_url.map(str::trim).filter(|s| !s.is_empty()) {
        Some(explicit) => explicit,
        None => kind.default_base_url().ok_or(ProviderError::MissingBaseUrl)?,
    };
    Ok(base.trim_end_matches('/').to_string())
}

/// Turn a reqwest error into the short human-readable form used in reports.
pub(crate) fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::str::FromStr};

    #[test]
    fn provider_kind_round_trips_through_str() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Gemini,
        ] {
            assert_eq!(ProviderKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(ProviderKind::from_str("mistral").is_err());
    }

    #[test]
    fn resolve_base_strips_trailing_slashes() {
        let base = resolve_base(ProviderKind::OpenAi, Some("https://api.example.com/v1///"))
            .unwrap();
        assert_eq!(base, "https://api.example.com/v1");
    }

    #[test]
    fn resolve_base_falls_back_to_default() {
        let base = resolve_base(ProviderKind::Anthropic, None).unwrap();
        assert_eq!(base, "https://api.anthropic.com");

        let base = resolve_base(ProviderKind::Gemini, Some("  ")).unwrap();
        assert_eq!(base, "https://generativelanguage.googleapis.com");
    }

    #[test]
    fn openai_requires_explicit_base() {
        assert!(matches!(
            resolve_base(ProviderKind::OpenAi, None),
            Err(ProviderError::MissingBaseUrl)
        ));
    }

    #[test]
    fn test_report_serializes_latency_without_unit_suffix() {
        let json = serde_json::to_value(TestReport::failed(42, "HTTP 401")).unwrap();
        assert_eq!(json["latency"], 42);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "HTTP 401");

        let ok = serde_json::to_value(TestReport::ok(7)).unwrap();
        assert_eq!(ok["latency"], 7);
        assert!(ok.get("error").is_none());
    }
}
