//! Runtime method-shape discovery.
//!
//! The proxy carries no compiled service definitions, so it asks the
//! routed backend to describe itself: a [`DescriptorResolver`] runs the
//! schema-reflection protocol over the chosen backend channel and returns
//! a [`ServiceDescriptor`]. The orchestrator only needs one bit of shape
//! information, whether the method streams, to decide when the call's
//! telemetry record is emitted.
//!
//! Descriptors are resolved once per call and not cached across calls.
//! That trades a reflection round-trip per call for never having to
//! invalidate anything; resolvers that can afford a staleness window are
//! free to cache internally.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::Status;
use crate::transport::BackendChannel;

/// The shape of one RPC method, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Fully-qualified service name.
    pub service: String,
    /// Bare method name.
    pub method: String,
    /// Whether the caller may send more than one message.
    pub client_streaming: bool,
    /// Whether the backend may send more than one message.
    pub server_streaming: bool,
}

impl MethodDescriptor {
    /// Whether the method streams in either direction.
    pub fn is_streaming(&self) -> bool {
        self.client_streaming || self.server_streaming
    }
}

/// A service and the methods the backend reports for it.
#[derive(Debug, Clone, Default)]
pub struct ServiceDescriptor {
    name: String,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    /// A descriptor for the named service with no methods yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Add a method to the descriptor.
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// The fully-qualified service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a method by bare name.
    pub fn find_method(&self, method: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.method == method)
    }

    /// All methods the backend reported.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }
}

/// Resolves service descriptors over the routed backend connection.
///
/// Resolution runs on the already-routed outbound context, using the
/// chosen backend channel as the reflection transport: the backend
/// describes itself; there is no static registry. Failure to resolve is a
/// terminal call error, surfaced verbatim.
#[async_trait]
pub trait DescriptorResolver<C: BackendChannel>: Send + Sync + 'static {
    /// Fetch the descriptor for `service` from the backend.
    async fn resolve_service(
        &self,
        ctx: &CallContext,
        channel: &C,
        service: &str,
    ) -> Result<ServiceDescriptor, Status>;
}

/// Split a fully-qualified method name (`/pkg.Service/Method`) into its
/// service and method parts.
///
/// A malformed name is an `Internal` error: the hosting server hands the
/// proxy this string, so it should never be malformed in a well-formed
/// server.
pub fn split_full_method(full_method: &str) -> Result<(&str, &str), Status> {
    let malformed =
        || Status::internal(format!("malformed full method name: {full_method:?}"));
    let rest = full_method.strip_prefix('/').ok_or_else(malformed)?;
    let (service, method) = rest.split_once('/').ok_or_else(malformed)?;
    if service.is_empty() || method.is_empty() || method.contains('/') {
        return Err(malformed());
    }
    Ok((service, method))
}
