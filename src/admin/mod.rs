//! Admin/introspection endpoints.
//!
//! Exposes the provider manager's config dump and a status summary.
//! Introspection only; nothing here is on the request path.

pub mod handlers;

use axum::routing::get;
use axum::Router;

pub use handlers::AdminState;

/// Build the admin router.
pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/config_dump", get(handlers::get_config_dump))
        .with_state(state)
}
