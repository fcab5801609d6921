//! End-to-end tests for on-demand virtual host discovery.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use scoped_router::discovery::{DiscoveryError, OnDemandTransport, VirtualHostDiscovery};
use scoped_router::init::{InitManager, InitTarget};
use scoped_router::routing::RouteTable;

/// Records every requested name set for assertions.
#[derive(Default)]
struct RecordingTransport {
    requests: Mutex<Vec<Vec<String>>>,
}

impl OnDemandTransport for RecordingTransport {
    fn request(&self, names: &[String]) {
        self.requests.lock().unwrap().push(names.to_vec());
    }
}

impl RecordingTransport {
    fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

fn vh(name: &str, domain: &str) -> serde_json::Value {
    serde_json::json!({ "name": name, "domains": [domain] })
}

#[tokio::test]
async fn test_requests_exactly_the_missing_names() {
    let transport = Arc::new(RecordingTransport::default());
    let table = Arc::new(RouteTable::new("rt"));
    let discovery = VirtualHostDiscovery::new(
        Arc::clone(&table),
        Arc::clone(&transport) as Arc<dyn OnDemandTransport>,
        InitTarget::detached("vhds.rt"),
    );

    discovery.on_update(&[vh("present", "p.example.com")], &[], "v1").unwrap();
    discovery.demand(&["present".into(), "missing-1".into(), "missing-2".into()]);

    assert_eq!(
        discovery.version(),
        "v1",
        "demand must not touch the applied version"
    );
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0], vec!["missing-1", "missing-2"]);

    // Re-demanding pending names does not duplicate the request.
    discovery.demand(&["missing-1".into()]);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_pending_lookup_resolves_when_resource_arrives() {
    let discovery = Arc::new(VirtualHostDiscovery::new(
        Arc::new(RouteTable::new("rt")),
        Arc::new(RecordingTransport::default()),
        InitTarget::detached("vhds.rt"),
    ));

    let waiter = Arc::clone(&discovery);
    let lookup = tokio::spawn(async move {
        waiter.wait_for("acme", Duration::from_secs(5)).await
    });
    tokio::task::yield_now().await;

    discovery.on_update(&[vh("acme", "acme.example.com")], &[], "v1").unwrap();

    let host = lookup.await.unwrap().unwrap();
    assert_eq!(host.domains, vec!["acme.example.com"]);
}

#[tokio::test]
async fn test_unresolved_lookup_times_out_and_reports() {
    let discovery = VirtualHostDiscovery::new(
        Arc::new(RouteTable::new("rt")),
        Arc::new(RecordingTransport::default()),
        InitTarget::detached("vhds.rt"),
    );

    let result = discovery.wait_for("never", Duration::from_millis(20)).await;
    assert!(matches!(result, Err(DiscoveryError::Timeout(_))));
    assert!(discovery.table().is_empty());
}

#[tokio::test]
async fn test_timed_out_name_is_pruned_and_requested_again() {
    let transport = Arc::new(RecordingTransport::default());
    let discovery = VirtualHostDiscovery::new(
        Arc::new(RouteTable::new("rt")),
        Arc::clone(&transport) as Arc<dyn OnDemandTransport>,
        InitTarget::detached("vhds.rt"),
    );

    let result = discovery.wait_for("slow", Duration::from_millis(20)).await;
    assert!(matches!(result, Err(DiscoveryError::Timeout(_))));
    assert_eq!(transport.requests().len(), 1);

    // The abandoned entry was pruned, so a later demand re-requests the
    // name instead of deduplicating against it forever.
    discovery.demand(&["slow".into()]);
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1], vec!["slow"]);
}

#[tokio::test]
async fn test_discovery_readiness_lifecycle() {
    let init = InitManager::new();
    let discovery = VirtualHostDiscovery::new(
        Arc::new(RouteTable::new("rt")),
        Arc::new(RecordingTransport::default()),
        init.register("vhds.rt"),
    );

    // Not ready until the first update (or failure) arrives.
    assert_eq!(
        init.wait_ready(Duration::from_millis(20)).await,
        vec!["vhds.rt".to_string()]
    );

    discovery.on_update(&[], &[], "v1").unwrap();
    assert!(init.wait_ready(Duration::from_millis(20)).await.is_empty());
}

#[tokio::test]
async fn test_teardown_never_wedges_readiness() {
    let init = InitManager::new();
    let discovery = VirtualHostDiscovery::new(
        Arc::new(RouteTable::new("rt")),
        Arc::new(RecordingTransport::default()),
        init.register("vhds.rt"),
    );
    drop(discovery);

    assert!(init.wait_ready(Duration::from_millis(20)).await.is_empty());
}

#[tokio::test]
async fn test_failure_keeps_table_and_unblocks_gate() {
    let init = InitManager::new();
    let discovery = VirtualHostDiscovery::new(
        Arc::new(RouteTable::new("rt")),
        Arc::new(RecordingTransport::default()),
        init.register("vhds.rt"),
    );
    discovery.on_update(&[vh("a", "a.example.com")], &[], "v1").unwrap();

    discovery.on_update_failed(&"stream closed");

    assert_eq!(discovery.table().len(), 1);
    assert_eq!(discovery.version(), "v1");
    assert!(init.wait_ready(Duration::from_millis(20)).await.is_empty());
}
