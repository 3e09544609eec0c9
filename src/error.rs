//! Terminal status codes and the `Status` error type.
//!
//! Every consumed interface in the crate (routing, reflection, transport
//! streams) speaks [`Status`]. The proxy core never retries: the first
//! fatal `Status` encountered becomes the call's terminal status, surfaced
//! to the caller-facing stream verbatim (caller-side relay faults are the
//! one case reclassified as `Internal`).

use std::fmt;

/// Classification of a terminal call status.
///
/// Mirrors the subset of RPC status codes the proxy core produces or
/// inspects. Transports may map these onto their own wire-level codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// The call was cancelled, typically by the caller going away.
    Cancelled,
    /// An error whose classification is not known to the proxy.
    Unknown,
    /// The routed service does not expose the requested method.
    NotFound,
    /// A hard precondition failed before any backend contact, such as
    /// missing `requestid` metadata.
    PermissionDenied,
    /// The backend could not be reached or refused the stream.
    Unavailable,
    /// A proxy-internal failure: malformed transport metadata, a
    /// forwarding fault, or a protocol-invariant violation.
    Internal,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Code::Cancelled => "cancelled",
            Code::Unknown => "unknown",
            Code::NotFound => "not_found",
            Code::PermissionDenied => "permission_denied",
            Code::Unavailable => "unavailable",
            Code::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// A terminal call status: a [`Code`] plus a human-readable message.
///
/// `Status` is the error type of every fallible operation in the core.
/// Errors returned by the supplied [`Director`](crate::director::Director)
/// or [`DescriptorResolver`](crate::reflection::DescriptorResolver)
/// propagate to the caller unchanged; nothing is silently swallowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Status {
    code: Code,
    message: String,
}

impl Status {
    /// Build a status from a code and message.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The status classification.
    pub fn code(&self) -> Code {
        self.code
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this status carries the given code.
    pub fn is_code(&self, code: Code) -> bool {
        self.code == code
    }

    /// `Cancelled` status.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    /// `Unknown` status.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Code::Unknown, message)
    }

    /// `NotFound` status.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    /// `PermissionDenied` status.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(Code::PermissionDenied, message)
    }

    /// `Unavailable` status.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// `Internal` status.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }
}
