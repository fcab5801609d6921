//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define configuration-distribution counters
//! - Expose a Prometheus-compatible metrics endpoint
//! - Label counters with the owning subscription's stat prefix
//!
//! # Metrics
//! - `scoped_rds_config_reload_total` (counter): successfully applied
//!   full-state updates, per subscription
//! - `scoped_rds_update_rejected_total` (counter): rejected updates by
//!   reason (malformed, duplicate, validation, transport)
//! - `scoped_rds_key_conflict_total` (counter): scope key displacements
//! - `vhds_config_reload_total` (counter): applied on-demand updates
//! - `vhds_update_empty_total` (counter): on-demand updates carrying no
//!   resources
//! - `vhds_on_demand_timeout_total` (counter): bounded waits that elapsed
//!   before the requested virtual host arrived
//!
//! # Design Decisions
//! - Counter updates are cheap (atomic increments behind the recorder)
//! - Subscriptions are identified by a stat prefix label, mirroring the
//!   `scoped_rds.<name>.` naming of the per-subscription stats scope

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Stat prefix for a named scoped-routes subscription.
pub fn scoped_rds_prefix(name: &str) -> String {
    format!("scoped_rds.{name}.")
}

/// Record a successfully applied full-state update.
pub fn record_config_reload(prefix: &str) {
    counter!("scoped_rds_config_reload_total", "subscription" => prefix.to_string()).increment(1);
}

/// Record a rejected update and why.
pub fn record_update_rejected(prefix: &str, reason: &'static str) {
    counter!(
        "scoped_rds_update_rejected_total",
        "subscription" => prefix.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Record a scope key displacement (two scopes claiming one key).
pub fn record_key_conflict(prefix: &str) {
    counter!("scoped_rds_key_conflict_total", "subscription" => prefix.to_string()).increment(1);
}

/// Record an applied on-demand discovery update.
pub fn record_vhds_config_reload(table: &str) {
    counter!("vhds_config_reload_total", "route_table" => table.to_string()).increment(1);
}

/// Record an on-demand discovery update that carried no resources.
pub fn record_vhds_update_empty(table: &str) {
    counter!("vhds_update_empty_total", "route_table" => table.to_string()).increment(1);
}

/// Record a bounded on-demand wait that elapsed unresolved.
pub fn record_on_demand_timeout(table: &str) {
    counter!("vhds_on_demand_timeout_total", "route_table" => table.to_string()).increment(1);
}
