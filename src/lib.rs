//! framegate: transparent, schema-agnostic RPC proxy core.
//!
//! framegate accepts inbound calls for services it does not itself
//! implement, routes each call to a backend connection chosen at runtime,
//! and forwards the call's messages in both directions without decoding
//! their payload. Messages travel as opaque [`frame::Frame`]s, so the
//! proxy never needs compiled definitions for the services it forwards.
//!
//! The crate owns the proxy core only. The wire transport (connection
//! establishment, framing, TLS), the schema-reflection protocol, and the
//! telemetry backend are consumed through the traits in [`transport`],
//! [`reflection`], and [`telemetry`]; the embedding system supplies them.
//!
//! # Anatomy of a proxied call
//!
//! 1. The hosting server dispatches an inbound stream to a handler wired
//!    up by [`registrar`].
//! 2. The [`proxy::ProxyHandler`] asks the [`director::Director`] for a
//!    backend, validates the required `requestid` metadata, and resolves
//!    the method's streaming shape via [`reflection::DescriptorResolver`].
//! 3. Two pump tasks relay frames caller→backend and backend→caller until
//!    one side finishes or fails; the handler reconciles the two
//!    completion signals, propagates backend trailers, and returns the
//!    terminal status.
//! 4. Exactly one [`telemetry::CallRecord`] is emitted per call: at
//!    classification time for streaming calls, at close for unary calls.

pub mod context;
pub mod director;
pub mod error;
pub mod frame;
pub mod proxy;
pub mod reflection;
pub mod registrar;
pub mod telemetry;
pub mod transport;

mod pump;

pub use context::{CallContext, Metadata};
pub use director::{Director, RouteDecision};
pub use error::{Code, Status};
pub use frame::{Frame, PassthroughCodec};
pub use proxy::ProxyHandler;
pub use reflection::{DescriptorResolver, MethodDescriptor, ServiceDescriptor};
pub use telemetry::{CallRecord, TelemetrySink};
