//! Per-request context and cooperative cancellation
//!
//! Every coordination and read operation takes a [`RequestContext`]
//! parameter; nothing here is ambient or process-global. Long loops poll
//! [`QueryStatus::is_running`] and bail out early when the host abandons
//! the query, returning whatever was safely produced instead of an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Shared cancellation handle for one query
#[derive(Debug, Clone)]
pub struct QueryStatus {
    running: Arc<AtomicBool>,
}

impl QueryStatus {
    /// Create a handle in the running state
    pub fn running() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a handle that is already cancelled
    pub fn cancelled() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the host still wants results
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Signal that the host abandoned the query
    pub fn cancel(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Default for QueryStatus {
    fn default() -> Self {
        Self::running()
    }
}

/// Identity and lifecycle of one host request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Host-assigned query identifier
    pub query_id: String,
    /// Catalog name the host addressed this request to
    pub catalog: String,
    /// Cancellation handle, shared with the host
    pub status: QueryStatus,
}

impl RequestContext {
    /// Create a context with a fresh query id
    pub fn new(catalog: impl Into<String>) -> Self {
        Self {
            query_id: Uuid::new_v4().to_string(),
            catalog: catalog.into(),
            status: QueryStatus::running(),
        }
    }

    /// Create a context with a host-assigned query id
    pub fn with_query_id(query_id: impl Into<String>, catalog: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            catalog: catalog.into(),
            status: QueryStatus::running(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_cancel_visible_to_clones() {
        let status = QueryStatus::running();
        let observer = status.clone();
        assert!(observer.is_running());

        status.cancel();
        assert!(!observer.is_running());
    }

    #[test]
    fn test_cancelled_constructor() {
        assert!(!QueryStatus::cancelled().is_running());
    }

    #[test]
    fn test_context_ids_unique() {
        let a = RequestContext::new("lakehouse");
        let b = RequestContext::new("lakehouse");
        assert_ne!(a.query_id, b.query_id);
        assert_eq!(a.catalog, "lakehouse");
    }
}
