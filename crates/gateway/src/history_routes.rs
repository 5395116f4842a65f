//! Probe run history under `/api/histories`.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    auth_middleware::CurrentUser,
    auth_routes::internal_error,
    state::AppState,
    store::NewHistory,
};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(serde::Deserialize)]
pub struct ListParams {
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct SaveHistoryRequest {
    config_id: Option<i64>,
    config_name: String,
    base_url: String,
    total: i64,
    success: i64,
    failed: i64,
    results_json: String,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

pub async fn list_histories_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let search = params.search.as_deref().filter(|s| !s.is_empty());

    let (histories, total) = match state.store.list_histories(user.id, page, limit, search).await {
        Ok(result) => result,
        Err(e) => return internal_error("history list", &e),
    };

    Json(serde_json::json!({
        "histories": histories,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "totalPages": (total as u64).div_ceil(limit as u64),
        }
    }))
    .into_response()
}

pub async fn save_history_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<SaveHistoryRequest>,
) -> impl IntoResponse {
    if body.config_name.is_empty() || body.base_url.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "config_name and base_url are required" })),
        )
            .into_response();
    }
    if body.results_json.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "results_json is required" })),
        )
            .into_response();
    }

    let new = NewHistory {
        config_id: body.config_id,
        config_name: &body.config_name,
        base_url: &body.base_url,
        total: body.total,
        success: body.success,
        failed: body.failed,
        results_json: &body.results_json,
    };
    match state.store.insert_history(user.id, &new).await {
        Ok(summary) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "history": summary })),
        )
            .into_response(),
        Err(e) => internal_error("history insert", &e),
    }
}

pub async fn get_history_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_history(id).await {
        Ok(Some((owner, record))) if owner == user.id => {
            Json(serde_json::json!({ "history": record })).into_response()
        },
        Ok(Some(_)) => (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "not your history" })),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "history not found" })),
        )
            .into_response(),
        Err(e) => internal_error("history fetch", &e),
    }
}

pub async fn delete_history_handler(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_history(id).await {
        Ok(Some((owner, _))) if owner == user.id => {},
        Ok(Some(_)) => {
            return (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": "not your history" })),
            )
                .into_response();
        },
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "history not found" })),
            )
                .into_response();
        },
        Err(e) => return internal_error("history fetch", &e),
    }

    match state.store.delete_history(id, user.id).await {
        Ok(_) => Json(serde_json::json!({ "success": true })).into_response(),
        Err(e) => internal_error("history delete", &e),
    }
}
