//! # Core Module
//!
//! Shared domain types, configuration, error handling, and the pure
//! split/build steps that run before any delivery.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add segmenter and item factory
//! - 1.0.0: Initial creation with config, error, and item modules

pub mod config;
pub mod error;
pub mod factory;
pub mod item;
pub mod segmenter;

// Re-export commonly used items
pub use config::{Config, SplitConfiguration, MAX_INTERVAL_SECS};
pub use error::{BackendError, DeliveryError, Result};
pub use factory::{build_items, renumber};
pub use item::{DeliveryHandle, ItemId, ItemStatus, WorkItem};
pub use segmenter::{estimate_segments, prepare_text, split, BOUNDARY_WINDOW};
