//! The modelprobe HTTP gateway.
//!
//! Serves the JSON API: registration and login (password or OAuth),
//! credential configs encrypted at rest, model listing, single-model tests,
//! batch probe runs, and probe history.

pub mod auth_middleware;
pub mod auth_routes;
pub mod config_routes;
pub mod history_routes;
pub mod model_routes;
pub mod oauth_routes;
pub mod server;
pub mod state;
pub mod store;

pub use {
    server::{build_app, serve},
    state::AppState,
    store::Store,
};
