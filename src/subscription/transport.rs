//! Transport seam for control-plane fetches.
//!
//! The wire mechanics (gRPC stream, REST poll) live outside this crate. A
//! transport delivers updates by calling back into the subscription; this
//! crate only initiates and cancels fetches through this trait.

/// Collaborator that fetches scoped-route state from the control plane.
pub trait SubscriptionTransport: Send + Sync {
    /// Begin fetching. Updates are delivered by the transport calling
    /// `ScopedConfigSubscription::on_update` / `on_update_failed`.
    fn start(&self);

    /// Cancel any pending fetch. Called on subscription teardown.
    fn stop(&self);
}

/// A transport that never delivers anything. Used where updates are driven
/// directly (tests, local tooling).
#[derive(Debug, Default)]
pub struct NullTransport;

impl SubscriptionTransport for NullTransport {
    fn start(&self) {}
    fn stop(&self) {}
}
