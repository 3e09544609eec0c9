//! The bidirectional pump: two independent forwarding loops per call.
//!
//! Each direction runs as its own tokio task, relaying opaque frames until
//! end-of-input or the first error, then reports exactly one completion
//! signal on its own single-slot channel and stops. The channels are
//! deliberately never closed: a one-shot signal needs no close, and the
//! orchestrator detects an already-signalled direction by the sender
//! having gone away.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::Status;
use crate::transport::{ClientStream, ServerStream};

/// One direction's sole completion signal. `Ok(())` means the source
/// reached clean end-of-input; `Err` is the first send/receive fault.
pub(crate) type PumpSignal = Result<(), Status>;

/// Spawn the caller→backend loop: relay every frame the caller sends
/// onward to the backend stream.
pub(crate) fn run_caller_to_backend<S, C>(
    caller: Arc<S>,
    backend: Arc<C>,
) -> mpsc::Receiver<PumpSignal>
where
    S: ServerStream,
    C: ClientStream,
{
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let signal = caller_to_backend(caller.as_ref(), backend.as_ref()).await;
        let _ = tx.send(signal).await;
    });
    rx
}

/// Spawn the backend→caller loop: relay backend responses to the caller,
/// flushing the backend's response headers ahead of the first payload.
pub(crate) fn run_backend_to_caller<C, S>(
    backend: Arc<C>,
    caller: Arc<S>,
) -> mpsc::Receiver<PumpSignal>
where
    C: ClientStream,
    S: ServerStream,
{
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let signal = backend_to_caller(backend.as_ref(), caller.as_ref()).await;
        let _ = tx.send(signal).await;
    });
    rx
}

async fn caller_to_backend<S, C>(caller: &S, backend: &C) -> PumpSignal
where
    S: ServerStream,
    C: ClientStream,
{
    loop {
        let Some(frame) = caller.recv().await? else {
            tracing::debug!(full_method = caller.full_method(), "caller finished sending");
            return Ok(());
        };
        backend.send(&frame).await?;
    }
}

async fn backend_to_caller<C, S>(backend: &C, caller: &S) -> PumpSignal
where
    C: ClientStream,
    S: ServerStream,
{
    let mut first = true;
    loop {
        let Some(frame) = backend.recv().await? else {
            tracing::debug!(full_method = caller.full_method(), "backend finished sending");
            return Ok(());
        };
        if first {
            // Response headers only become readable after the first
            // backend message, but must reach the caller before any
            // payload is flushed.
            let header = backend.header().await?;
            caller.send_header(header).await?;
            first = false;
        }
        caller.send(&frame).await?;
    }
}
