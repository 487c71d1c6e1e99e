//! Delivery backend seam
//!
//! The coordinator never talks to a concrete delivery service; it drives
//! whatever implements [`DeliveryBackend`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::{BackendError, DeliveryHandle};

/// Outcome of the backend's permission gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// External service that delivers items, subject to a permission gate and a
/// ceiling on outstanding items
#[async_trait]
pub trait DeliveryBackend: Send + Sync {
    /// Whether the caller may deliver at all
    async fn check_permission(&self) -> Result<Permission, BackendError>;

    /// Number of items enqueued but not yet delivered
    async fn outstanding_count(&self) -> Result<usize, BackendError>;

    /// Maximum number of outstanding items the backend accepts
    fn outstanding_ceiling(&self) -> usize;

    /// Enqueue delivery at a specific time
    async fn enqueue_at(
        &self,
        content: &str,
        title: &str,
        at: DateTime<Utc>,
    ) -> Result<DeliveryHandle, BackendError>;

    /// Enqueue delivery as soon as possible
    async fn enqueue_immediate(
        &self,
        content: &str,
        title: &str,
    ) -> Result<DeliveryHandle, BackendError>;

    /// Cancel one outstanding item; unknown handles are not an error
    async fn cancel(&self, handle: &DeliveryHandle) -> Result<(), BackendError>;

    /// Cancel every outstanding item
    async fn cancel_all(&self) -> Result<(), BackendError>;
}
