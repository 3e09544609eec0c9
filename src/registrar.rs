//! Wiring the orchestrator into a hosting RPC server.
//!
//! Two registration modes, both dispatching to the same
//! [`ProxyHandler`]: explicit registration of named methods, and a fully
//! transparent fallback for any service the hosting server's static
//! registry does not know.
//!
//! Precondition for both modes: the hosting server must run the proxied
//! streams through [`PassthroughCodec`](crate::frame::PassthroughCodec)
//! (or an equivalent identity codec). A decoding codec would violate
//! payload pass-through correctness.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::director::Director;
use crate::error::Status;
use crate::proxy::ProxyHandler;
use crate::reflection::DescriptorResolver;
use crate::telemetry::TelemetrySink;
use crate::transport::ServerStream;

/// The body of one registered stream: takes the caller-facing stream and
/// drives it to a terminal status.
pub type StreamHandler<S> =
    Arc<dyn Fn(S) -> BoxFuture<'static, Result<(), Status>> + Send + Sync>;

/// Registration-time description of one proxied method.
///
/// Proxied methods always register as bidirectional-streaming regardless
/// of the real method's shape: frames are opaque, so the wire-level
/// handling is uniform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDesc {
    /// Fully-qualified service name.
    pub service: String,
    /// Bare method name.
    pub method: String,
    /// Whether the registration advertises client streaming.
    pub client_streaming: bool,
    /// Whether the registration advertises server streaming.
    pub server_streaming: bool,
}

impl StreamDesc {
    /// The proxy's uniform registration: bidirectional streaming.
    pub fn bidi(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            client_streaming: true,
            server_streaming: true,
        }
    }

    /// The fully-qualified method name this registration answers to.
    pub fn full_method(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }
}

/// The hosting server's registration surface, as consumed by the proxy.
pub trait StreamServer {
    /// The caller-facing stream type the server dispatches.
    type Stream: ServerStream;

    /// Register a handler for one described method.
    fn register_stream(&mut self, desc: StreamDesc, handler: StreamHandler<Self::Stream>);

    /// Install the catch-all handler invoked for any call to a
    /// service/method unknown to the server's static registry.
    fn set_fallback(&mut self, handler: StreamHandler<Self::Stream>);
}

/// Make a [`StreamHandler`] out of a proxy handler.
///
/// This is the transparent/unknown-service mode: hand the result to the
/// hosting server as its fallback, and every unknown call flows through
/// the orchestrator.
pub fn transparent_handler<S, D, R, T>(proxy: Arc<ProxyHandler<D, R, T>>) -> StreamHandler<S>
where
    S: ServerStream,
    D: Director,
    R: DescriptorResolver<D::Channel>,
    T: TelemetrySink,
{
    Arc::new(move |stream: S| {
        let proxy = proxy.clone();
        Box::pin(async move { proxy.call(stream).await })
    })
}

/// Register a proxy handler for a particular service and set of methods.
///
/// Behaves like registering generated handlers for the service, except
/// every method body is the orchestrator and every method is advertised
/// as bidirectional-streaming.
pub fn register_service<Srv, D, R, T>(
    server: &mut Srv,
    proxy: Arc<ProxyHandler<D, R, T>>,
    service_name: &str,
    method_names: &[&str],
) where
    Srv: StreamServer,
    D: Director,
    R: DescriptorResolver<D::Channel>,
    T: TelemetrySink,
{
    for method in method_names {
        tracing::debug!(service = service_name, method = *method, "registering proxied method");
        server.register_stream(
            StreamDesc::bidi(service_name, *method),
            transparent_handler(proxy.clone()),
        );
    }
}
