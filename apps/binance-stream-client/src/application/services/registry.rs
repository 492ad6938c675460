//! Stream Registry
//!
//! Tracks every open connection under its stream id. All mutations and
//! lookups go through a single mutex; the id allocator is an independent
//! atomic counter so allocation never waits on the registry.
//!
//! Entries are added once a connection is open and removed when the
//! connection reports closed. Closing a connection never removes its entry
//! directly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::application::ports::Transport;
use crate::domain::stream::{StreamId, StreamKind};
use crate::infrastructure::metrics;

// =============================================================================
// Id Allocator
// =============================================================================

/// Thread-safe, strictly increasing stream id generator starting at 1.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: AtomicU64,
}

impl IdAllocator {
    /// Create a new allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> StreamId {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }
}

// =============================================================================
// Stream Handle
// =============================================================================

/// A registered connection and its metadata.
#[derive(Clone)]
pub struct StreamHandle {
    /// Caller-visible stream id.
    pub stream_id: StreamId,
    /// Owned connection.
    pub connection: Arc<dyn Transport>,
    /// Kind of stream carried by the connection.
    pub kind: StreamKind,
    /// Whether this is the shared user data stream.
    pub is_user_stream: bool,
}

impl StreamHandle {
    /// Create a handle. The user stream flag follows from the kind.
    #[must_use]
    pub fn new(stream_id: StreamId, connection: Arc<dyn Transport>, kind: StreamKind) -> Self {
        Self {
            stream_id,
            connection,
            kind,
            is_user_stream: kind.is_user_data(),
        }
    }

    /// Check whether this handle owns `connection`.
    #[must_use]
    pub fn owns(&self, connection: &Arc<dyn Transport>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.connection), Arc::as_ptr(connection))
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("stream_id", &self.stream_id)
            .field("url", &self.connection.url())
            .field("kind", &self.kind)
            .field("is_user_stream", &self.is_user_stream)
            .finish()
    }
}

// =============================================================================
// Stream Registry
// =============================================================================

/// Registry of open streams keyed by stream id.
///
/// # Example
///
/// ```rust
/// use binance_stream_client::application::services::StreamRegistry;
///
/// let registry = StreamRegistry::new();
/// assert!(registry.find_user_stream().is_none());
///
/// // Unknown ids are simply absent
/// assert!(registry.find_by_id(42).is_none());
/// ```
#[derive(Debug, Default)]
pub struct StreamRegistry {
    handles: Mutex<BTreeMap<StreamId, StreamHandle>>,
}

impl StreamRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle.
    ///
    /// Adding a user stream evicts any user stream that is already closing,
    /// so at most one user stream is registered at a time. The evicted
    /// connection's later close notification finds nothing to remove.
    pub fn add(&self, handle: StreamHandle) {
        let (evicted, count) = {
            let mut handles = self.handles.lock();
            let evicted: Vec<StreamId> = if handle.is_user_stream {
                handles
                    .values()
                    .filter(|h| h.is_user_stream && h.connection.is_closed())
                    .map(|h| h.stream_id)
                    .collect()
            } else {
                Vec::new()
            };
            for stream_id in &evicted {
                handles.remove(stream_id);
            }
            handles.insert(handle.stream_id, handle);
            (evicted, handles.len())
        };

        for stream_id in evicted {
            tracing::debug!(stream_id, "Draining user data stream evicted from registry");
        }
        metrics::set_active_streams(count);
    }

    /// Remove the handle owning `connection`.
    ///
    /// Returns the removed handle, or `None` if it was already gone.
    pub fn remove_by_connection(&self, connection: &Arc<dyn Transport>) -> Option<StreamHandle> {
        let (removed, count) = {
            let mut handles = self.handles.lock();
            let stream_id = handles
                .values()
                .find(|handle| handle.owns(connection))
                .map(|handle| handle.stream_id);
            let removed = stream_id.and_then(|id| handles.remove(&id));
            (removed, handles.len())
        };

        if let Some(handle) = &removed {
            tracing::debug!(
                stream_id = handle.stream_id,
                kind = %handle.kind,
                "Stream removed from registry"
            );
            metrics::set_active_streams(count);
        }

        removed
    }

    /// Look up a handle by stream id.
    #[must_use]
    pub fn find_by_id(&self, stream_id: StreamId) -> Option<StreamHandle> {
        self.handles.lock().get(&stream_id).cloned()
    }

    /// Look up the live shared user data stream.
    ///
    /// A user stream whose close has already been requested is skipped, so a
    /// replacement can be opened while the old one drains.
    #[must_use]
    pub fn find_user_stream(&self) -> Option<StreamHandle> {
        self.handles
            .lock()
            .values()
            .find(|handle| handle.is_user_stream && !handle.connection.is_closed())
            .cloned()
    }

    /// Request close on every registered connection.
    ///
    /// Works on a snapshot so close callbacks can re-enter the registry.
    /// Entries leave the registry through their close notifications.
    pub fn close_all(&self) {
        let snapshot = self.snapshot();

        for handle in &snapshot {
            tracing::debug!(stream_id = handle.stream_id, "Closing stream");
            handle.connection.close();
        }
    }

    /// Copy of all handles ordered by stream id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StreamHandle> {
        self.handles.lock().values().cloned().collect()
    }

    /// Number of registered streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Check if no streams are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
