//! Anthropic (Claude) adapter.

use std::time::Instant;

use {async_trait::async_trait, serde::Deserialize, tracing::debug};

use crate::{
    HTTP, LIST_TIMEOUT, ModelProvider, NormalizedModel, ProviderError, ProviderKind, TEST_TIMEOUT,
    TestReport, describe_request_error, resolve_base,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Page size for the models listing. The API caps at 1000.
const PAGE_LIMIT: &str = "1000";

pub struct AnthropicAdapter;

#[derive(Deserialize)]
struct ModelPage {
    #[serde(default)]
    data: Vec<ModelEntry>,
    #[serde(default)]
    has_more: bool,
    last_id: Option<String>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    display_name: Option<String>,
}

#[async_trait]
impl ModelProvider for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn fetch_models(
        &self,
        base_url: Option<&str>,
        api_key: &str,
    ) -> Result<Vec<NormalizedModel>, ProviderError> {
        let base = resolve_base(self.kind(), base_url)?;
        let mut models = Vec::new();
        let mut after_id: Option<String> = None;

        // Cursor pagination. Either every page lands or the listing fails.
        loop {
            let mut url = format!("{base}/v1/models?limit={PAGE_LIMIT}");
            if let Some(after) = &after_id {
                url.push_str("&after_id=");
                url.push_str(&urlencoding::encode(after));
            }

            let res = HTTP
                .get(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .timeout(LIST_TIMEOUT)
                .send()
                .await?;

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

            models.extend(page.data.into_iter().map(|m| NormalizedModel {
                id: m.id,
                display_name: m.display_name,
            }));

            match (page.has_more, page.last_id) {
                (true, Some(last)) => after_id = Some(last),
                _ => break,
            }
        }

        debug!(count = models.len(), "listed anthropic models");
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
        let url = format!("{base}/v1/messages");

        let body = serde_json::json!({
            "model": model_id,
            "max_tokens": 5,
            "messages": [{ "role": "user", "content": "hi" }],
        });

        let res = HTTP
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .timeout(TEST_TIMEOUT)
            .send()
            .await;

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
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| blocks.first())
            .is_some_and(|block| block.get("text").is_some());

        if has_content {
            TestReport::ok(latency)
        } else {
            TestReport::failed(latency, "response has no valid content")
        }
    }
}
