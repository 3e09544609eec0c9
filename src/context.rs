//! Per-call context: metadata, deadline, and cancellation.
//!
//! A [`CallContext`] travels with a call from the hosting server through
//! routing to the backend-facing stream. Outbound contexts are always
//! derived from the inbound one, so metadata and deadlines carry through;
//! the backend-facing side additionally gets its own cancellable child
//! token so in-flight backend I/O can be stopped without touching the
//! caller-facing stream.

use std::collections::HashMap;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

/// Case-insensitive string multimap carrying call metadata.
///
/// Keys are lowercased on insertion and lookup, matching the usual RPC
/// metadata convention.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: HashMap<String, Vec<String>>,
}

impl Metadata {
    /// An empty metadata map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under the given key.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(key.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// All values recorded under the key, if any.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&[String]> {
        self.entries
            .get(&key.as_ref().to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// The first value recorded under the key, if any.
    pub fn get_first(&self, key: impl AsRef<str>) -> Option<&str> {
        self.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    /// Append every entry of `other` into this map.
    pub fn merge(&mut self, other: &Metadata) {
        for (key, values) in &other.entries {
            let slot = self.entries.entry(key.clone()).or_default();
            slot.extend(values.iter().cloned());
        }
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over `(key, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut metadata = Metadata::new();
        for (key, value) in iter {
            metadata.insert(key, value);
        }
        metadata
    }
}

/// Cancellation-aware context attached to one side of a proxied call.
///
/// Cloning a context shares its cancellation token; [`derived`] contexts
/// get a child token instead, so cancelling the child never affects the
/// parent while parent cancellation still reaches every child.
///
/// [`derived`]: CallContext::derived
#[derive(Debug, Clone)]
pub struct CallContext {
    metadata: Metadata,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl CallContext {
    /// A fresh root context carrying the given metadata.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            deadline: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach a deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The call metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable access to the call metadata.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// The call deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derive a child context.
    ///
    /// The child carries everything the parent carried (metadata and
    /// deadline) under a child cancellation token. Directors must build
    /// their outbound context this way rather than replacing it.
    pub fn derived(&self) -> CallContext {
        CallContext {
            metadata: self.metadata.clone(),
            deadline: self.deadline,
            cancellation: self.cancellation.child_token(),
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether this context (or an ancestor) has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The underlying cancellation token, for transports that need to
    /// select on it while blocked in I/O.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new(Metadata::new())
    }
}
