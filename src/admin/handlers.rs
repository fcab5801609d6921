use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::provider::{ConfigDump, ConfigProviderManager};

/// State shared with the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    /// Provider manager whose state the endpoints expose.
    pub providers: Arc<ConfigProviderManager>,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub subscriptions: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        subscriptions: state.providers.subscription_count(),
    })
}

pub async fn get_config_dump(State(state): State<AdminState>) -> Json<ConfigDump> {
    Json(state.providers.dump())
}
