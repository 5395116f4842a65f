//! Saved credential configs under `/api/configs`.
//!
//! API keys go through the vault codec on the way in and out. Listings only
//! ever show the masked form; fetching one config by id returns the
//! plaintext so it can be re-used for a probe. A blob that fails to decrypt
//! is a hard 500, never an empty key.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use modelprobe_vault::mask;

use crate::{
    auth_middleware::CurrentUser,
    auth_routes::internal_error,
    state::AppState,
    store::{ConfigUpdate, SavedConfig},
};

#[derive(serde::Deserialize)]
pub struct CreateConfigRequest {
    name: String,
    base_url: Option<String>,
    api_key: String,
    provider: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct UpdateConfigRequest {
    name: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    provider: Option<String>,
}

fn config_json(cfg: &SavedConfig, masked_key: &str) -> serde_json::Value {
    serde_json::json!({
        "id": cfg.id,
        "name": cfg.name,
        "base_url": cfg.base_url,
        "api_key_masked": masked_key,
        "provider": cfg.provider,
        "created_at": cfg.created_at,
        "updated_at": cfg.updated_at,
    })
}

fn decrypt_failed(e: &modelprobe_vault::VaultError) -> axum::response::Response {
    tracing::error!(error = %e, "stored credential failed to decrypt");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "credential decryption failed" })),
    )
        .into_response()
}

/// Look up a config and enforce ownership: 404 unknown, 403 foreign.
async fn fetch_owned(
    state: &AppState,
    id: i64,
    user_id: i64,
) -> Result<SavedConfig, axum::response::Response> {
    match state.store.get_config(id).await {
        Ok(Some(cfg)) if cfg.user_id == user_id => Ok(cfg),
        Ok(Some(_)) => Err((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "not your config" })),
        )
            .into_response()),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "config not found" })),
        )
            .into_response()),
        Err(e) => Err(internal_error("config fetch", &e)),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

pub async fn list_configs_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rows = match state.store.list_configs(user.id).await {
        Ok(rows) => rows,
        Err(e) => return internal_error("config list", &e),
    };

    let mut configs = Vec::with_capacity(rows.len());
    for cfg in &rows {
        let plaintext = match state.codec.decrypt(&cfg.api_key_enc) {
            Ok(key) => key,
            Err(e) => return decrypt_failed(&e),
        };
        configs.push(config_json(cfg, &mask(&plaintext)));
    }

    Json(serde_json::json!({ "configs": configs })).into_response()
}

pub async fn create_config_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<CreateConfigRequest>,
) -> impl IntoResponse {
    if body.name.is_empty() || body.api_key.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "name and api_key are required" })),
        )
            .into_response();
    }

    let blob = match state.codec.encrypt(&body.api_key) {
        Ok(blob) => blob,
        Err(e) => return internal_error("encrypt", &anyhow::anyhow!(e)),
    };

    let cfg = match state
        .store
        .create_config(
            user.id,
            &body.name,
            body.base_url.as_deref().unwrap_or(""),
            &blob,
            body.provider.as_deref().unwrap_or("openai"),
        )
        .await
    {
        Ok(cfg) => cfg,
        Err(e) => return internal_error("config create", &e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "config": config_json(&cfg, &mask(&body.api_key)) })),
    )
        .into_response()
}

pub async fn get_config_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let cfg = match fetch_owned(&state, id, user.id).await {
        Ok(cfg) => cfg,
        Err(resp) => return resp,
    };

    let api_key = match state.codec.decrypt(&cfg.api_key_enc) {
        Ok(key) => key,
        Err(e) => return decrypt_failed(&e),
    };

    Json(serde_json::json!({
        "config": {
            "id": cfg.id,
            "name": cfg.name,
            "base_url": cfg.base_url,
            "api_key": api_key,
            "provider": cfg.provider,
            "created_at": cfg.created_at,
            "updated_at": cfg.updated_at,
        }
    }))
    .into_response()
}

pub async fn update_config_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateConfigRequest>,
) -> impl IntoResponse {
    if let Err(resp) = fetch_owned(&state, id, user.id).await {
        return resp;
    }

    let api_key_enc = match &body.api_key {
        Some(key) if !key.is_empty() => match state.codec.encrypt(key) {
            Ok(blob) => Some(blob),
            Err(e) => return internal_error("encrypt", &anyhow::anyhow!(e)),
        },
        _ => None,
    };
    let update = ConfigUpdate {
        name: body.name.clone().filter(|s| !s.is_empty()),
        base_url: body.base_url.clone(),
        api_key_enc,
        provider: body.provider.clone().filter(|s| !s.is_empty()),
    };
    if update.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "no fields to update" })),
        )
            .into_response();
    }

    let cfg = match state.store.update_config(id, user.id, &update).await {
        Ok(Some(cfg)) => cfg,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "config not found" })),
            )
                .into_response();
        },
        Err(e) => return internal_error("config update", &e),
    };

    let plaintext = match body.api_key {
        Some(key) if !key.is_empty() => key,
        _ => match state.codec.decrypt(&cfg.api_key_enc) {
            Ok(key) => key,
            Err(e) => return decrypt_failed(&e),
        },
    };

    Json(serde_json::json!({ "config": config_json(&cfg, &mask(&plaintext)) })).into_response()
}

pub async fn delete_config_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    if let Err(resp) = fetch_owned(&state, id, user.id).await {
        return resp;
    }
    match state.store.delete_config(id, user.id).await {
        Ok(_) => Json(serde_json::json!({ "success": true })).into_response(),
        Err(e) => internal_error("config delete", &e),
    }
}
