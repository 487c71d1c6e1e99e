//! # Feature: Delivery
//!
//! Drives a batch of split work items through a delivery backend: scheduling
//! with a fixed interval, immediate sending, cancellation, removal, and
//! delivery confirmation.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod backend;
pub mod coordinator;
pub mod events;
pub mod memory;

pub use backend::{DeliveryBackend, Permission};
pub use coordinator::{DeliveryCoordinator, ScheduleOutcome};
pub use events::BatchEvent;
pub use memory::{MemoryBackend, QueuedDelivery, DEFAULT_CEILING};
