//! Model listing, single-model tests, and batch probe runs.

use std::str::FromStr;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use {
    modelprobe_providers::{ProviderError, ProviderKind, adapter_for},
    tracing::info,
};

use crate::{auth_middleware::CurrentUser, state::AppState};

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModelsRequest {
    provider: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestModelRequest {
    provider: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    model_id: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRequest {
    provider: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    model_ids: Vec<String>,
}

fn bad_request(msg: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": msg })),
    )
        .into_response()
}

/// Parse provider + required fields shared by all three endpoints.
/// The provider defaults to openai, which in turn demands a base URL.
fn validate(
    provider: Option<&str>,
    base_url: Option<&str>,
    api_key: Option<&str>,
) -> Result<ProviderKind, axum::response::Response> {
    let kind = match ProviderKind::from_str(provider.unwrap_or("openai")) {
        Ok(kind) => kind,
        Err(e) => return Err(bad_request(&e.to_string())),
    };
    if kind == ProviderKind::OpenAi && base_url.is_none_or(str::is_empty) {
        return Err(bad_request("baseUrl is required"));
    }
    if api_key.is_none_or(str::is_empty) {
        return Err(bad_request("apiKey is required"));
    }
    Ok(kind)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

pub async fn list_models_handler(
    CurrentUser(_user): CurrentUser,
    Json(body): Json<ListModelsRequest>,
) -> impl IntoResponse {
    let kind = match validate(
        body.provider.as_deref(),
        body.base_url.as_deref(),
        body.api_key.as_deref(),
    ) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    let api_key = body.api_key.unwrap_or_default();

    let adapter = adapter_for(kind);
    match adapter.fetch_models(body.base_url.as_deref(), &api_key).await {
        Ok(models) => Json(serde_json::json!({
            "object": "list",
            "data": models
                .iter()
                .map(|m| serde_json::json!({
                    "id": m.id,
                    "object": "model",
                    "owned_by": kind.as_str(),
                    "display_name": m.display_name,
                }))
                .collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => {
            let message = match &e {
                ProviderError::Network(inner) if inner.is_timeout() => {
                    "upstream request timed out".to_string()
                },
                other => other.to_string(),
            };
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": message })),
            )
                .into_response()
        },
    }
}

pub async fn test_model_handler(
    CurrentUser(_user): CurrentUser,
    Json(body): Json<TestModelRequest>,
) -> impl IntoResponse {
    let kind = match validate(
        body.provider.as_deref(),
        body.base_url.as_deref(),
        body.api_key.as_deref(),
    ) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    let Some(model_id) = body.model_id.filter(|m| !m.is_empty()) else {
        return bad_request("modelId is required");
    };
    let api_key = body.api_key.unwrap_or_default();

    // Infallible by contract: any failure is a 200 with success=false.
    let report = adapter_for(kind)
        .test_model(body.base_url.as_deref(), &api_key, &model_id)
        .await;
    Json(report).into_response()
}

pub async fn probe_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<ProbeRequest>,
) -> impl IntoResponse {
    let kind = match validate(
        body.provider.as_deref(),
        body.base_url.as_deref(),
        body.api_key.as_deref(),
    ) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    if body.model_ids.iter().any(String::is_empty) {
        return bad_request("modelIds must not contain empty ids");
    }
    let api_key = body.api_key.unwrap_or_default();

    info!(
        user_id = user.id,
        provider = %kind,
        models = body.model_ids.len(),
        "probe run requested"
    );

    let summary = state
        .runner
        .run(
            adapter_for(kind).into(),
            body.base_url.clone(),
            api_key,
            body.model_ids,
        )
        .await;

    Json(summary).into_response()
}
