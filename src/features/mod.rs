//! # Features
//!
//! Feature modules built on top of `core`.

pub mod delivery;

pub use delivery::{
    BatchEvent, DeliveryBackend, DeliveryCoordinator, MemoryBackend, Permission, ScheduleOutcome,
};
