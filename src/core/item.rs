//! # Work Items
//!
//! One segment of split text wrapped with its delivery state.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Added title and preview helpers
//! - 1.0.0: Initial release with status lifecycle

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Longest content shown unabridged by [`WorkItem::preview`]
pub const PREVIEW_LIMIT: usize = 50;

/// Unique identifier of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        ItemId(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle a delivery backend hands out for an outstanding item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryHandle(String);

impl DeliveryHandle {
    pub fn new(value: impl Into<String>) -> Self {
        DeliveryHandle(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery status of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Split and waiting to be scheduled
    Pending,
    /// Handed to the backend, waiting for delivery
    Scheduled,
    /// Backend confirmed delivery
    Sent,
    /// Cancelled by the caller
    Cancelled,
}

impl ItemStatus {
    /// Terminal states never transition again
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Sent | ItemStatus::Cancelled)
    }

    /// Content may only change before delivery
    pub fn is_editable(self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Scheduled)
    }

    /// Human-readable label for list views
    pub fn display_name(self) -> &'static str {
        match self {
            ItemStatus::Pending => "Ready to send",
            ItemStatus::Scheduled => "Scheduled",
            ItemStatus::Sent => "Sent",
            ItemStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Scheduled => write!(f, "scheduled"),
            ItemStatus::Sent => write!(f, "sent"),
            ItemStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "scheduled" => Ok(ItemStatus::Scheduled),
            "sent" => Ok(ItemStatus::Sent),
            "cancelled" => Ok(ItemStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid item status: {}", s)),
        }
    }
}

/// One unit of text to be delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique item identifier
    pub id: ItemId,

    /// 1-based position within the batch
    pub part_number: usize,

    /// Number of items in the batch
    pub total_parts: usize,

    /// Text of this segment
    pub content: String,

    /// Committed delivery time
    pub scheduled_at: Option<DateTime<Utc>>,

    /// Backend handle, present only while scheduled
    pub delivery_handle: Option<DeliveryHandle>,

    /// Current status
    pub status: ItemStatus,
}

impl WorkItem {
    /// Create a fresh pending item
    pub fn new(part_number: usize, total_parts: usize, content: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            part_number,
            total_parts,
            content: content.into(),
            scheduled_at: None,
            delivery_handle: None,
            status: ItemStatus::Pending,
        }
    }

    /// Title shown with the delivered text, e.g. `Part 2/5`
    pub fn title(&self, prefix: &str) -> String {
        format!("{} {}/{}", prefix, self.part_number, self.total_parts)
    }

    /// Content shortened for list display
    pub fn preview(&self) -> String {
        if self.content.chars().count() <= PREVIEW_LIMIT {
            return self.content.clone();
        }
        let head: String = self.content.chars().take(PREVIEW_LIMIT - 3).collect();
        format!("{head}...")
    }

    pub(crate) fn mark_scheduled(&mut self, at: DateTime<Utc>, handle: DeliveryHandle) {
        self.scheduled_at = Some(at);
        self.delivery_handle = Some(handle);
        self.status = ItemStatus::Scheduled;
    }

    pub(crate) fn mark_sent(&mut self) {
        self.delivery_handle = None;
        self.status = ItemStatus::Sent;
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.delivery_handle = None;
        self.scheduled_at = None;
        self.status = ItemStatus::Cancelled;
    }
}
