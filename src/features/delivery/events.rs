//! Change notifications published by the coordinator
//!
//! Observers opt in through [`super::DeliveryCoordinator::subscribe`]; the
//! coordinator never calls back into them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ItemId;

/// Broadcast channel capacity for batch events
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchEvent {
    /// A new batch replaced the previous one
    Loaded { total: usize },
    /// An item was handed to the backend
    Scheduled {
        id: ItemId,
        part_number: usize,
        at: DateTime<Utc>,
    },
    /// The backend confirmed delivery
    Delivered { id: ItemId },
    Cancelled { id: ItemId },
    /// An item left the batch; remaining items were renumbered
    Removed { id: ItemId, remaining: usize },
    Edited { id: ItemId },
    /// The batch was emptied
    Cleared { removed: usize },
}
