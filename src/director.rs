//! Routing contract: the caller-supplied director.
//!
//! Routing policy lives outside the proxy core. The embedding system
//! injects a [`Director`] at construction; the orchestrator calls it once
//! per call, before any backend I/O, and surfaces its errors to the
//! caller verbatim. Retry policy, if any, is the director's own business.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::Status;
use crate::transport::BackendChannel;

/// The routing outcome for one call.
///
/// `outbound` must be derived from the inbound context (see
/// [`CallContext::derived`]) so metadata and deadlines carry through;
/// the proxy validates required metadata against it, not the inbound one.
/// The decision lives for the duration of the call and is then discarded.
#[derive(Debug, Clone)]
pub struct RouteDecision<C> {
    /// Context for all backend-facing work on this call.
    pub outbound: CallContext,
    /// The pooled backend connection to proxy onto.
    pub channel: C,
}

/// Maps an inbound call to a backend connection.
///
/// Must be callable concurrently for independent calls. Any error returned
/// terminates the call immediately, before any backend I/O begins and
/// before a telemetry record is created.
#[async_trait]
pub trait Director: Send + Sync + 'static {
    /// The backend connection type this director hands out.
    type Channel: BackendChannel;

    /// Choose a backend for the call identified by `full_method`.
    async fn route(
        &self,
        inbound: &CallContext,
        full_method: &str,
    ) -> Result<RouteDecision<Self::Channel>, Status>;
}
