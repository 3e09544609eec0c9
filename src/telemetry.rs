//! Call records and the fire-and-forget telemetry sink.
//!
//! One [`CallRecord`] describes one proxied call's identity, timing, and
//! outcome. The orchestrator hands a record to the [`TelemetrySink`]
//! exactly once per call (at stream detection for streaming calls, at
//! close for unary calls) and never waits for the sink. Emission must
//! stay off the call's critical path, and emission failures are the
//! sink's own problem, never a call-visible error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Telemetry for one proxied call.
///
/// Created once routing has succeeded and a request identifier is known,
/// mutated in place as the call progresses, and emitted exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Fully-qualified service name.
    pub service: String,
    /// Bare method name.
    pub method: String,
    /// The backend address the call was routed to.
    pub backend_target: String,
    /// Caller-supplied `requestid` metadata value.
    pub request_id: String,
    /// Wall-clock call start.
    pub created: DateTime<Utc>,
    /// Wall-clock time of emission (stream detection or call close).
    pub end_time: DateTime<Utc>,
    /// Milliseconds between `created` and `end_time`. For streaming calls
    /// this is time-to-classification, not call duration, since streams may
    /// run indefinitely, so duration-at-completion is not a meaningful
    /// signal for them.
    pub duration_ms: i64,
    /// Whether the method was classified client- or server-streaming.
    pub is_stream: bool,
    /// Message of the recorded call error, empty when none was recorded.
    pub error_message: String,
}

impl CallRecord {
    /// A fresh record for a call that just routed successfully.
    pub fn new(
        service: impl Into<String>,
        method: impl Into<String>,
        backend_target: impl Into<String>,
        request_id: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            backend_target: backend_target.into(),
            request_id: request_id.into(),
            created,
            end_time: created,
            duration_ms: 0,
            is_stream: false,
            error_message: String::new(),
        }
    }
}

/// Destination for emitted call records.
///
/// `send` must not block and must be safe for unsynchronized concurrent
/// invocation from many calls. Implementations typically enqueue onto a
/// channel drained by a background task.
pub trait TelemetrySink: Send + Sync + 'static {
    /// Accept one record, fire-and-forget.
    fn send(&self, record: CallRecord);
}

impl<T: TelemetrySink> TelemetrySink for std::sync::Arc<T> {
    fn send(&self, record: CallRecord) {
        T::send(self, record);
    }
}

/// A bounded-queue sink.
///
/// Records are pushed with a non-blocking `try_send`; when the queue is
/// full the record is dropped with a warning rather than stalling the
/// call path. The receiver half belongs to whatever drains records into
/// the real telemetry backend.
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: mpsc::Sender<CallRecord>,
}

impl QueueSink {
    /// Build a sink and the receiver its records arrive on.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<CallRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl TelemetrySink for QueueSink {
    fn send(&self, record: CallRecord) {
        if let Err(err) = self.tx.try_send(record) {
            let record = match &err {
                mpsc::error::TrySendError::Full(r)
                | mpsc::error::TrySendError::Closed(r) => r,
            };
            tracing::warn!(
                service = %record.service,
                method = %record.method,
                request_id = %record.request_id,
                reason = %err,
                "dropping call record, telemetry queue unavailable"
            );
        }
    }
}
