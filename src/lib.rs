// Core layer - shared types, configuration, splitting
pub mod core;

// Features layer - delivery coordination
pub mod features;

// Re-export core items
pub use core::{
    build_items, estimate_segments, prepare_text, split, BackendError, Config, DeliveryError,
    DeliveryHandle, ItemId, ItemStatus, SplitConfiguration, WorkItem,
};

// Re-export feature items
pub use features::{
    BatchEvent, DeliveryBackend, DeliveryCoordinator, MemoryBackend, Permission, ScheduleOutcome,
};
