//! Google Gemini adapter.
//!
//! Gemini authenticates with a `key` query parameter rather than a header,
//! and namespaces model ids under `models/`. The listing strips that prefix;
//! testing puts it back when the caller passes a bare id.

use std::time::Instant;

use {async_trait::async_trait, serde::Deserialize, tracing::debug};

use crate::{
    HTTP, LIST_TIMEOUT, ModelProvider, NormalizedModel, ProviderError, ProviderKind, TEST_TIMEOUT,
    TestReport, describe_request_error, resolve_base,
};

const PAGE_SIZE: &str = "1000";

pub struct GeminiAdapter;

#[derive(Deserialize)]
struct ModelPage {
    #[serde(default)]
    models: Vec<ModelEntry>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "supportedGenerationMethods", default)]
    supported_generation_methods: Vec<String>,
}

#[async_trait]
impl ModelProvider for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn fetch_models(
        &self,
        base_url: Option<&str>,
        api_key: &str,
    ) -> Result<Vec<NormalizedModel>, ProviderError> {
        let base = resolve_base(self.kind(), base_url)?;
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{base}/v1beta/models?key={}&pageSize={PAGE_SIZE}",
                urlencoding::encode(api_key)
            );
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(&urlencoding::encode(token));
            }

            let res = HTTP.get(&url).timeout(LIST_TIMEOUT).send().await?;

            let status = res.status();
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(ProviderError::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }

            let page: ModelPage = res
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

            for entry in page.models {
                // Listing includes embedding and other non-chat models;
                // only generateContent-capable ones are usable here.
                if !entry
                    .supported_generation_methods
                    .iter()
                    .any(|m| m == "generateContent")
                {
                    continue;
                }
                let id = entry
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&entry.name)
                    .to_string();
                models.push(NormalizedModel {
                    id,
                    display_name: entry.display_name,
                });
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = models.len(), "listed gemini models");
        Ok(models)
    }

    async fn test_model(
        &self,
        base_url: Option<&str>,
        api_key: &str,
        model_id: &str,
    ) -> TestReport {
        let start = Instant::now();
        let base = match resolve_base(self.kind(), base_url) {
            Ok(base) => base,
            Err(e) => return TestReport::failed(0, e.to_string()),
        };

        let model_name = if model_id.starts_with("models/") {
            model_id.to_string()
        } else {
            format!("models/{model_id}")
        };
        let url = format!(
            "{base}/v1beta/{model_name}:generateContent?key={}",
            urlencoding::encode(api_key)
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": "hi" }] }],
        });

        let res = HTTP.post(&url).json(&body).timeout(TEST_TIMEOUT).send().await;

        let res = match res {
            Ok(res) => res,
            Err(e) => {
                return TestReport::failed(
                    start.elapsed().as_millis() as u64,
                    describe_request_error(&e),
                );
            },
        };

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return TestReport::failed(
                start.elapsed().as_millis() as u64,
                format!("HTTP {} {body}", status.as_u16()),
            );
        }

        let payload: serde_json::Value = match res.json().await {
            Ok(v) => v,
            Err(e) => {
                return TestReport::failed(start.elapsed().as_millis() as u64, e.to_string());
            },
        };
        let latency = start.elapsed().as_millis() as u64;

        let has_content = payload
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.as_array())
            .is_some_and(|parts| !parts.is_empty());

        if has_content {
            TestReport::ok(latency)
        } else {
            TestReport::failed(latency, "response has no valid content")
        }
    }
}
