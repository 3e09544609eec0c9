//! In-memory test doubles for the proxy's consumed interfaces.
//!
//! Provides a scriptable caller-facing stream, two backend stream
//! flavors (a live echo and a scripted response sequence), a static
//! director/resolver pair, and a recording telemetry sink. Everything is
//! cheaply cloneable so tests can keep a handle for assertions while the
//! proxy owns its own.
//!
//! Note: not every test file uses every helper, hence the module-wide
//! `#[allow(dead_code)]`.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use framegate::context::{CallContext, Metadata};
use framegate::director::{Director, RouteDecision};
use framegate::error::Status;
use framegate::frame::Frame;
use framegate::proxy::ProxyHandler;
use framegate::reflection::{DescriptorResolver, MethodDescriptor, ServiceDescriptor};
use framegate::telemetry::{CallRecord, TelemetrySink};
use framegate::transport::{BackendChannel, ClientStream, ServerStream};

/// Install a test subscriber once so `RUST_LOG=debug cargo test` shows
/// the proxy's structured logs.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Caller-facing stream
// ─────────────────────────────────────────────────────────────────────────────

/// One observable caller-facing output, in the order it happened.
#[derive(Debug, Clone)]
pub enum CallerEvent {
    Header(Vec<(String, String)>),
    Frame(Vec<u8>),
}

struct CallerInner {
    ctx: CallContext,
    full_method: String,
    incoming: Mutex<VecDeque<Result<Frame, Status>>>,
    events: Mutex<Vec<CallerEvent>>,
    trailer: Mutex<Option<Metadata>>,
}

/// Scriptable caller-facing stream: tests enqueue the caller's frames (or
/// a read error) up front and inspect everything the proxy sent back.
#[derive(Clone)]
pub struct MockCaller(Arc<CallerInner>);

impl MockCaller {
    pub fn new(full_method: &str, metadata: Metadata) -> Self {
        Self(Arc::new(CallerInner {
            ctx: CallContext::new(metadata),
            full_method: full_method.to_string(),
            incoming: Mutex::new(VecDeque::new()),
            events: Mutex::new(Vec::new()),
            trailer: Mutex::new(None),
        }))
    }

    /// A caller with a valid `requestid` already attached.
    pub fn with_request_id(full_method: &str, request_id: &str) -> Self {
        let metadata: Metadata = [("requestid", request_id)].into_iter().collect();
        Self::new(full_method, metadata)
    }

    /// Enqueue a frame the caller will send.
    pub fn push_frame(&self, bytes: &[u8]) {
        self.0
            .incoming
            .lock()
            .unwrap()
            .push_back(Ok(Frame::from_bytes(bytes)));
    }

    /// Enqueue a read error on the caller's incoming stream.
    pub fn push_error(&self, status: Status) {
        self.0.incoming.lock().unwrap().push_back(Err(status));
    }

    /// Everything the proxy sent to the caller, in order.
    pub fn events(&self) -> Vec<CallerEvent> {
        self.0.events.lock().unwrap().clone()
    }

    /// Just the payload frames the proxy sent to the caller.
    pub fn received_frames(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                CallerEvent::Frame(bytes) => Some(bytes),
                CallerEvent::Header(_) => None,
            })
            .collect()
    }

    /// The trailers the proxy recorded for the terminal status, if any.
    pub fn trailer(&self) -> Option<Metadata> {
        self.0.trailer.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServerStream for MockCaller {
    fn context(&self) -> &CallContext {
        &self.0.ctx
    }

    fn full_method(&self) -> &str {
        &self.0.full_method
    }

    async fn recv(&self) -> Result<Option<Frame>, Status> {
        match self.0.incoming.lock().unwrap().pop_front() {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(status)) => Err(status),
            None => Ok(None),
        }
    }

    async fn send(&self, frame: &Frame) -> Result<(), Status> {
        self.0
            .events
            .lock()
            .unwrap()
            .push(CallerEvent::Frame(frame.as_bytes().to_vec()));
        Ok(())
    }

    async fn send_header(&self, metadata: Metadata) -> Result<(), Status> {
        let pairs = metadata
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.to_string(), v.clone())))
            .collect();
        self.0.events.lock().unwrap().push(CallerEvent::Header(pairs));
        Ok(())
    }

    fn set_trailer(&self, metadata: Metadata) {
        *self.0.trailer.lock().unwrap() = Some(metadata);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend stream and channel
// ─────────────────────────────────────────────────────────────────────────────

enum BackendMode {
    /// Frames sent to the backend come straight back; end-of-stream after
    /// half-close once the echoes are drained.
    Echo {
        tx: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
        rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    },
    /// A fixed response sequence; pends forever once exhausted unless
    /// `eof_after_script` is set.
    Scripted {
        responses: Mutex<VecDeque<Result<Frame, Status>>>,
        eof_after_script: bool,
    },
}

struct BackendInner {
    mode: BackendMode,
    header: Metadata,
    trailer: Metadata,
    received: Mutex<Vec<Vec<u8>>>,
    close_send_calls: AtomicUsize,
}

/// Backend-facing stream double.
#[derive(Clone)]
pub struct MockBackendStream(Arc<BackendInner>);

impl MockBackendStream {
    /// An echoing backend: every frame the proxy forwards comes back as a
    /// response, and the stream ends cleanly after half-close.
    pub fn echo() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self::build(BackendMode::Echo {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        })
    }

    /// A backend that replays the given response sequence, then ends the
    /// stream cleanly.
    pub fn scripted(responses: Vec<Result<Frame, Status>>) -> Self {
        Self::build(BackendMode::Scripted {
            responses: Mutex::new(responses.into()),
            eof_after_script: true,
        })
    }

    /// A backend that replays the given responses and then blocks forever,
    /// for tests where the backend must not be the side that finishes.
    pub fn scripted_then_pending(responses: Vec<Result<Frame, Status>>) -> Self {
        Self::build(BackendMode::Scripted {
            responses: Mutex::new(responses.into()),
            eof_after_script: false,
        })
    }

    fn build(mode: BackendMode) -> Self {
        Self(Arc::new(BackendInner {
            mode,
            header: [("x-backend", "mock")].into_iter().collect(),
            trailer: [("x-trailer", "done")].into_iter().collect(),
            received: Mutex::new(Vec::new()),
            close_send_calls: AtomicUsize::new(0),
        }))
    }

    /// Frames the proxy forwarded to this backend, in order.
    pub fn received_frames(&self) -> Vec<Vec<u8>> {
        self.0.received.lock().unwrap().clone()
    }

    /// How many times the proxy half-closed the send side.
    pub fn close_send_calls(&self) -> usize {
        self.0.close_send_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientStream for MockBackendStream {
    async fn send(&self, frame: &Frame) -> Result<(), Status> {
        self.0
            .received
            .lock()
            .unwrap()
            .push(frame.as_bytes().to_vec());
        if let BackendMode::Echo { tx, .. } = &self.0.mode {
            let sender = tx.lock().unwrap().clone();
            if let Some(sender) = sender {
                let _ = sender.send(frame.clone());
            }
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Frame>, Status> {
        match &self.0.mode {
            BackendMode::Echo { rx, .. } => Ok(rx.lock().await.recv().await),
            BackendMode::Scripted {
                responses,
                eof_after_script,
            } => {
                let next = responses.lock().unwrap().pop_front();
                match next {
                    Some(Ok(frame)) => Ok(Some(frame)),
                    Some(Err(status)) => Err(status),
                    None if *eof_after_script => Ok(None),
                    None => {
                        std::future::pending::<()>().await;
                        unreachable!()
                    }
                }
            }
        }
    }

    async fn header(&self) -> Result<Metadata, Status> {
        Ok(self.0.header.clone())
    }

    fn trailer(&self) -> Metadata {
        self.0.trailer.clone()
    }

    async fn close_send(&self) -> Result<(), Status> {
        self.0.close_send_calls.fetch_add(1, Ordering::SeqCst);
        if let BackendMode::Echo { tx, .. } = &self.0.mode {
            // Dropping the sender ends the echo stream once drained.
            tx.lock().unwrap().take();
        }
        Ok(())
    }
}

struct ChannelInner {
    target: String,
    stream: MockBackendStream,
    fail_open: Option<Status>,
    opened_ctx: Mutex<Option<CallContext>>,
    open_calls: AtomicUsize,
}

/// Pooled-connection double handing out a prebuilt backend stream.
#[derive(Clone)]
pub struct MockChannel(Arc<ChannelInner>);

impl MockChannel {
    pub fn new(target: &str, stream: MockBackendStream) -> Self {
        Self(Arc::new(ChannelInner {
            target: target.to_string(),
            stream,
            fail_open: None,
            opened_ctx: Mutex::new(None),
            open_calls: AtomicUsize::new(0),
        }))
    }

    /// A channel whose `open_stream` always fails with the given status.
    pub fn failing(target: &str, status: Status) -> Self {
        Self(Arc::new(ChannelInner {
            target: target.to_string(),
            stream: MockBackendStream::echo(),
            fail_open: Some(status),
            opened_ctx: Mutex::new(None),
            open_calls: AtomicUsize::new(0),
        }))
    }

    /// How many backend streams the proxy opened.
    pub fn open_calls(&self) -> usize {
        self.0.open_calls.load(Ordering::SeqCst)
    }

    /// The backend-facing context the proxy opened its stream with.
    pub fn opened_ctx(&self) -> Option<CallContext> {
        self.0.opened_ctx.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendChannel for MockChannel {
    type Stream = MockBackendStream;

    fn target(&self) -> &str {
        &self.0.target
    }

    async fn open_stream(
        &self,
        ctx: &CallContext,
        _full_method: &str,
    ) -> Result<Self::Stream, Status> {
        self.0.open_calls.fetch_add(1, Ordering::SeqCst);
        *self.0.opened_ctx.lock().unwrap() = Some(ctx.clone());
        if let Some(status) = &self.0.fail_open {
            return Err(status.clone());
        }
        Ok(self.0.stream.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Director, resolver, sink
// ─────────────────────────────────────────────────────────────────────────────

/// Director that always picks one channel (or always fails).
pub struct StaticDirector {
    channel: MockChannel,
    error: Option<Status>,
}

impl StaticDirector {
    pub fn new(channel: MockChannel) -> Self {
        Self {
            channel,
            error: None,
        }
    }

    pub fn failing(status: Status) -> Self {
        Self {
            channel: MockChannel::new("unroutable", MockBackendStream::echo()),
            error: Some(status),
        }
    }
}

#[async_trait]
impl Director for StaticDirector {
    type Channel = MockChannel;

    async fn route(
        &self,
        inbound: &CallContext,
        _full_method: &str,
    ) -> Result<RouteDecision<MockChannel>, Status> {
        if let Some(status) = &self.error {
            return Err(status.clone());
        }
        Ok(RouteDecision {
            outbound: inbound.derived(),
            channel: self.channel.clone(),
        })
    }
}

/// Resolver backed by a fixed service map instead of live reflection.
#[derive(Default)]
pub struct StaticResolver {
    services: HashMap<String, ServiceDescriptor>,
    error: Option<Status>,
}

impl StaticResolver {
    pub fn with_service(mut self, descriptor: ServiceDescriptor) -> Self {
        self.services
            .insert(descriptor.name().to_string(), descriptor);
        self
    }

    pub fn failing(status: Status) -> Self {
        Self {
            services: HashMap::new(),
            error: Some(status),
        }
    }
}

#[async_trait]
impl<C: BackendChannel> DescriptorResolver<C> for StaticResolver {
    async fn resolve_service(
        &self,
        _ctx: &CallContext,
        _channel: &C,
        service: &str,
    ) -> Result<ServiceDescriptor, Status> {
        if let Some(status) = &self.error {
            return Err(status.clone());
        }
        self.services.get(service).cloned().ok_or_else(|| {
            Status::unavailable(format!("reflection: service {service} not found"))
        })
    }
}

/// Sink that keeps every emitted record for assertions.
#[derive(Clone, Default)]
pub struct RecordingSink(Arc<Mutex<Vec<CallRecord>>>);

impl RecordingSink {
    pub fn records(&self) -> Vec<CallRecord> {
        self.0.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn send(&self, record: CallRecord) {
        self.0.lock().unwrap().push(record);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Descriptor and handler shorthands
// ─────────────────────────────────────────────────────────────────────────────

pub fn unary_method(service: &str, method: &str) -> MethodDescriptor {
    MethodDescriptor {
        service: service.to_string(),
        method: method.to_string(),
        client_streaming: false,
        server_streaming: false,
    }
}

pub fn server_streaming_method(service: &str, method: &str) -> MethodDescriptor {
    MethodDescriptor {
        server_streaming: true,
        ..unary_method(service, method)
    }
}

pub type TestHandler = ProxyHandler<StaticDirector, StaticResolver, RecordingSink>;

/// A handler plus the observation handles tests assert on.
pub struct TestProxy {
    pub handler: TestHandler,
    pub channel: MockChannel,
    pub sink: RecordingSink,
}

impl TestProxy {
    pub fn new(channel: MockChannel, resolver: StaticResolver) -> Self {
        let sink = RecordingSink::default();
        let handler = ProxyHandler::new(
            StaticDirector::new(channel.clone()),
            resolver,
            sink.clone(),
        );
        Self {
            handler,
            channel,
            sink,
        }
    }
}
