//! OpenAI-compatible adapter.
//!
//! Works against api.openai.com and the many proxies that mirror its shape,
//! which is why there is no default base URL.

use std::time::Instant;

use {async_trait::async_trait, serde::Deserialize, tracing::debug};

use crate::{
    HTTP, LIST_TIMEOUT, ModelProvider, NormalizedModel, ProviderError, ProviderKind, TEST_TIMEOUT,
    TestReport, describe_request_error, resolve_base,
};

pub struct OpenAiAdapter;

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[async_trait]
impl ModelProvider for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn fetch_models(
        &self,
        base_url: Option<&str>,
        api_key: &str,
    ) -> Result<Vec<NormalizedModel>, ProviderError> {
        let base = resolve_base(self.kind(), base_url)?;
        let url = format!("{base}/v1/models");

        let res = HTTP
            .get(&url)
            .bearer_auth(api_key)
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

        let list: ModelList = res
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        debug!(count = list.data.len(), "listed openai models");

        Ok(list
            .data
            .into_iter()
            .map(|m| NormalizedModel {
                id: m.id,
                display_name: None,
            })
            .collect())
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
        let url = format!("{base}/v1/chat/completions");

        let body = serde_json::json!({
            "model": model_id,
            "messages": [{ "role": "user", "content": "hi" }],
            "max_tokens": 5,
        });

        let res = HTTP
            .post(&url)
            .bearer_auth(api_key)
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

        // A usable reply has either message content or a streaming delta in
        // the first choice.
        let first = payload.get("choices").and_then(|c| c.get(0));
        let has_content = first.is_some_and(|choice| {
            choice
                .get("message")
                .and_then(|m| m.get("content"))
                .is_some()
                || choice.get("delta").is_some()
        });

        if has_content {
            TestReport::ok(latency)
        } else {
            TestReport::failed(latency, "response has no valid content")
        }
    }
}
