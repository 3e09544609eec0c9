//! The call orchestrator: per-call state machine.
//!
//! One [`ProxyHandler::call`] invocation owns one inbound call end to end:
//! it routes, validates the required request identifier, resolves the
//! method's streaming shape over the backend, opens the backend stream
//! with a cancellable context, starts the bidirectional pump, reconciles
//! the two completion signals, and guarantees the single telemetry
//! emission regardless of which step failed.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::director::{Director, RouteDecision};
use crate::error::{Code, Status};
use crate::pump;
use crate::reflection::{DescriptorResolver, split_full_method};
use crate::telemetry::{CallRecord, TelemetrySink};
use crate::transport::{BackendChannel, ClientStream, ServerStream};

/// Metadata key whose first value identifies the request. Calls without
/// it are rejected before any backend contact.
pub const REQUEST_ID_KEY: &str = "requestid";

/// Per-call bookkeeping shared between the state machine body and the
/// finalizer in [`ProxyHandler::call`].
struct CallState {
    record: Option<CallRecord>,
    streaming: bool,
}

impl CallState {
    fn record_error(&mut self, status: &Status) {
        if let Some(record) = self.record.as_mut() {
            record.error_message = status.message().to_owned();
        }
    }
}

/// The proxy's per-call handler.
///
/// Holds the injected collaborators (routing, reflection, telemetry)
/// and nothing else; all per-call state is local to [`call`], so one
/// handler serves any number of concurrent calls.
///
/// [`call`]: ProxyHandler::call
pub struct ProxyHandler<D, R, T>
where
    D: Director,
    R: DescriptorResolver<D::Channel>,
    T: TelemetrySink,
{
    director: D,
    resolver: R,
    sink: T,
}

impl<D, R, T> ProxyHandler<D, R, T>
where
    D: Director,
    R: DescriptorResolver<D::Channel>,
    T: TelemetrySink,
{
    /// Assemble a handler from its collaborators.
    pub fn new(director: D, resolver: R, sink: T) -> Self {
        Self {
            director,
            resolver,
            sink,
        }
    }

    /// Proxy one inbound call to a routed backend.
    ///
    /// Returns the call's terminal status: `Ok(())` when the backend
    /// completed the call cleanly, otherwise the first fatal error
    /// encountered, with backend trailers already propagated whenever the
    /// backend was reached.
    ///
    /// Exactly one [`CallRecord`] is emitted per call once routing and
    /// request-id validation have succeeded: streaming calls at
    /// classification time, unary calls here at close, never both.
    pub async fn call<S: ServerStream>(&self, stream: S) -> Result<(), Status> {
        let created = Utc::now();
        let started = Instant::now();
        let caller = Arc::new(stream);
        let mut state = CallState {
            record: None,
            streaming: false,
        };

        let result = self.run(&caller, &mut state, created, started).await;

        // Deferred finalization, covering every exit path above: unary
        // calls emit here with full duration; streaming calls were already
        // emitted at detection and are not reported again at close.
        if let Some(mut record) = state.record {
            if !state.streaming {
                record.end_time = Utc::now();
                record.duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
                self.sink.send(record);
            }
        }

        if let Err(ref status) = result {
            tracing::warn!(
                full_method = caller.full_method(),
                code = %status.code(),
                error = %status.message(),
                "proxied call failed"
            );
        }
        result
    }

    async fn run<S: ServerStream>(
        &self,
        caller: &Arc<S>,
        state: &mut CallState,
        created: chrono::DateTime<Utc>,
        started: Instant,
    ) -> Result<(), Status> {
        let full_method = caller.full_method().to_owned();
        let (service, method) = split_full_method(&full_method)?;

        let RouteDecision { outbound, channel } =
            self.director.route(caller.context(), &full_method).await?;

        // Hard precondition: no telemetry record and no backend I/O
        // without a request identifier on the routed outbound context.
        let request_id = outbound
            .metadata()
            .get_first(REQUEST_ID_KEY)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Status::permission_denied("required requestid metadata missing or empty")
            })?
            .to_owned();

        tracing::debug!(
            service,
            method,
            request_id = %request_id,
            backend = channel.target(),
            "routed inbound call"
        );

        state.record = Some(CallRecord::new(
            service,
            method,
            channel.target(),
            &request_id,
            created,
        ));

        let descriptor = self
            .resolver
            .resolve_service(&outbound, &channel, service)
            .await?;
        let method_descriptor = descriptor
            .find_method(method)
            .ok_or_else(|| Status::not_found("method not found"))?;

        if method_descriptor.is_streaming() {
            // Streams may run indefinitely, so report "a stream was
            // opened" promptly instead of a meaningless duration at some
            // unbounded later close.
            state.streaming = true;
            if let Some(record) = state.record.as_mut() {
                record.is_stream = true;
                record.end_time = Utc::now();
                record.duration_ms =
                    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
                self.sink.send(record.clone());
            }
            tracing::debug!(service, method, request_id = %request_id, "stream opened");
        }

        // The backend-facing side gets its own cancellable child so
        // in-flight backend I/O can be stopped without touching the
        // caller-facing stream.
        let backend_ctx = outbound.derived();
        let backend = match channel.open_stream(&backend_ctx, &full_method).await {
            Ok(stream) => Arc::new(stream),
            Err(status) => {
                state.record_error(&status);
                return Err(status);
            }
        };

        let mut request_done = pump::run_caller_to_backend(caller.clone(), backend.clone());
        let mut response_done = pump::run_backend_to_caller(backend.clone(), caller.clone());

        // Either direction may finish first. The happy path consumes two
        // signals: the caller's end-of-input (half-close the backend),
        // then the backend's end-of-stream (terminal success). Anything
        // left after both signals is a protocol-invariant violation.
        for _ in 0..2 {
            tokio::select! {
                Some(signal) = request_done.recv() => match signal {
                    Ok(()) => {
                        // Caller finished sending; half-close the backend
                        // send side and keep draining its responses.
                        if let Err(status) = backend.close_send().await {
                            tracing::debug!(
                                service,
                                method,
                                error = %status,
                                "backend half-close failed"
                            );
                        }
                    }
                    Err(status) => {
                        // A caller-side fault strands the backend mid-call:
                        // cancel its context to unblock in-flight I/O and
                        // let the other pump task exit.
                        backend_ctx.cancel();
                        if status.is_code(Code::Internal) {
                            state.record_error(&status);
                        }
                        return Err(Status::internal(format!(
                            "failed proxying caller to backend: {status}"
                        )));
                    }
                },
                Some(signal) = response_done.recv() => {
                    // Backend trailers reach the caller regardless of how
                    // the backend side ended; they may be empty on
                    // abnormal termination.
                    caller.set_trailer(backend.trailer());
                    return match signal {
                        Ok(()) => Ok(()),
                        Err(status) => {
                            backend_ctx.cancel();
                            if status.is_code(Code::Internal) {
                                state.record_error(&status);
                            }
                            Err(status)
                        }
                    };
                },
                else => break,
            }
        }

        let violation = Status::internal("proxying should never reach this stage");
        state.record_error(&violation);
        Err(violation)
    }
}
