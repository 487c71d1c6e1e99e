//! Error types for splitting and delivery
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Added out-of-range schedule errors
//! - 1.0.0: Initial release

use thiserror::Error;

use crate::core::item::{DeliveryHandle, ItemId, ItemStatus};

/// Failure reported by a delivery backend for a single call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend rejected request: {0}")]
    Rejected(String),
}

/// Errors surfaced by the caller-facing API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("text to split is empty")]
    InputEmpty,

    #[error("permission to deliver was denied")]
    PermissionDenied,

    #[error("no delivery slots available ({outstanding}/{ceiling} outstanding)")]
    CapacityExceeded { outstanding: usize, ceiling: usize },

    #[error("scheduled {succeeded} item(s) before part {failed_part} failed: {reason}")]
    PartialSchedulingFailure {
        succeeded: usize,
        failed_at: ItemId,
        failed_part: usize,
        reason: String,
    },

    #[error("delivery interval of {0}s is out of range")]
    IntervalOutOfRange(u64),

    #[error("target time for part {part_number} is out of range")]
    TargetTimeOutOfRange { part_number: usize },

    #[error("delivery backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("work item {0} not found")]
    ItemNotFound(ItemId),

    #[error("work item {id} is {status} and cannot be edited")]
    NotEditable { id: ItemId, status: ItemStatus },

    #[error("no scheduled item holds handle {0}")]
    UnknownHandle(DeliveryHandle),
}

impl From<BackendError> for DeliveryError {
    fn from(err: BackendError) -> Self {
        DeliveryError::BackendUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
