//! Router assembly and the serve loop.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    routing::{get, post},
};

use tracing::{info, warn};

use crate::state::AppState;

/// How often expired sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Build the full application router.
pub fn build_app(state: AppState) -> Router {
    use crate::{auth_routes, config_routes, history_routes, model_routes, oauth_routes};

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/auth/register", post(auth_routes::register_handler))
        .route("/api/auth/login", post(auth_routes::login_handler))
        .route("/api/auth/logout", post(auth_routes::logout_handler))
        .route("/api/auth/me", get(auth_routes::me_handler))
        .route(
            "/api/auth/oauth/{provider}",
            get(oauth_routes::oauth_start_handler),
        )
        .route(
            "/api/auth/callback/{provider}",
            get(oauth_routes::oauth_callback_handler),
        )
        .route(
            "/api/configs",
            get(config_routes::list_configs_handler).post(config_routes::create_config_handler),
        )
        .route(
            "/api/configs/{id}",
            get(config_routes::get_config_handler)
                .put(config_routes::update_config_handler)
                .delete(config_routes::delete_config_handler),
        )
        .route("/api/models", post(model_routes::list_models_handler))
        .route("/api/test", post(model_routes::test_model_handler))
        .route("/api/probe", post(model_routes::probe_handler))
        .route(
            "/api/histories",
            get(history_routes::list_histories_handler)
                .post(history_routes::save_history_handler),
        )
        .route(
            "/api/histories/{id}",
            get(history_routes::get_history_handler)
                .delete(history_routes::delete_history_handler),
        )
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Bind and serve until the task is cancelled. Also runs the periodic
/// session sweep.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let store = Arc::clone(&state.store);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            match store.cleanup_expired_sessions().await {
                Ok(0) => {},
                Ok(n) => info!(removed = n, "swept expired sessions"),
                Err(e) => warn!(error = %e, "session sweep failed"),
            }
        }
    });

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
