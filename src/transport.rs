//! Consumed transport abstractions.
//!
//! The proxy core never opens sockets or frames bytes itself. The
//! embedding system supplies a caller-facing [`ServerStream`], a pooled
//! [`BackendChannel`] per backend, and the [`ClientStream`]s the channel
//! opens. All stream methods take `&self`: both pump directions of a call
//! share the same streams concurrently, so implementations must carry
//! their own interior synchronization (real transports typically already
//! do; test doubles use mutex-guarded queues).

use async_trait::async_trait;

use crate::context::{CallContext, Metadata};
use crate::error::Status;
use crate::frame::Frame;

/// The caller-facing side of one inbound call.
///
/// Receiving `Ok(None)` means the caller has finished sending (clean
/// end-of-input); any `Err` is a transport fault. The stream's lifecycle
/// is owned by the hosting server; the proxy never cancels it.
#[async_trait]
pub trait ServerStream: Send + Sync + 'static {
    /// The inbound call context (metadata, deadline, cancellation).
    fn context(&self) -> &CallContext;

    /// The fully-qualified method name, e.g. `/pkg.Service/Method`.
    fn full_method(&self) -> &str;

    /// Receive the next frame from the caller, `Ok(None)` at end-of-input.
    async fn recv(&self) -> Result<Option<Frame>, Status>;

    /// Send one frame to the caller.
    async fn send(&self, frame: &Frame) -> Result<(), Status>;

    /// Flush response headers to the caller. Must happen before the first
    /// payload frame is sent.
    async fn send_header(&self, metadata: Metadata) -> Result<(), Status>;

    /// Record trailers to deliver with the terminal status.
    fn set_trailer(&self, metadata: Metadata);
}

/// The backend-facing side of one proxied call.
#[async_trait]
pub trait ClientStream: Send + Sync + 'static {
    /// Send one frame to the backend.
    async fn send(&self, frame: &Frame) -> Result<(), Status>;

    /// Receive the next frame from the backend, `Ok(None)` at
    /// end-of-stream.
    async fn recv(&self) -> Result<Option<Frame>, Status>;

    /// The backend's response headers. Only available once the backend
    /// has started responding, which is why the pump reads them after the
    /// first received frame.
    async fn header(&self) -> Result<Metadata, Status>;

    /// The backend's trailers. Empty until the backend side has
    /// terminated; may be empty on abnormal termination.
    fn trailer(&self) -> Metadata;

    /// Half-close: signal the backend that no more frames will be sent,
    /// while the receive side stays open.
    async fn close_send(&self) -> Result<(), Status>;
}

/// A long-lived, externally pooled connection to one backend.
///
/// Channels are shared across many calls and never mutated by the proxy;
/// the proxy only opens new per-call streams over them. The same channel
/// doubles as the reflection transport for
/// [`DescriptorResolver`](crate::reflection::DescriptorResolver).
#[async_trait]
pub trait BackendChannel: Clone + Send + Sync + 'static {
    /// The stream type this channel opens.
    type Stream: ClientStream;

    /// The backend address this channel points at, for telemetry.
    fn target(&self) -> &str;

    /// Open a bidirectional stream for the given fully-qualified method.
    /// The context is the cancellable backend-facing child derived by the
    /// orchestrator; cancelling it must abort in-flight I/O on the stream.
    async fn open_stream(
        &self,
        ctx: &CallContext,
        full_method: &str,
    ) -> Result<Self::Stream, Status>;
}
