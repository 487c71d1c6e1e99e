//! # In-Memory Delivery Backend
//!
//! Process-local [`DeliveryBackend`] that keeps outstanding items in a
//! DashMap keyed by handle. Supports toggling permission and availability and
//! injecting enqueue failures, so callers can exercise every coordinator path
//! without a real delivery service.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::backend::{DeliveryBackend, Permission};
use crate::core::{BackendError, DeliveryHandle};

/// Platform ceiling on pending local notifications
pub const DEFAULT_CEILING: usize = 64;

/// An item waiting in the in-memory queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedDelivery {
    pub title: String,
    pub content: String,
    /// `None` for immediate deliveries
    pub deliver_at: Option<DateTime<Utc>>,
}

pub struct MemoryBackend {
    queue: DashMap<DeliveryHandle, QueuedDelivery>,
    ceiling: usize,
    permission_granted: AtomicBool,
    available: AtomicBool,
    /// Successful enqueues left before injected failures start
    enqueue_budget: AtomicUsize,
    cancel_failures: AtomicBool,
    cancel_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_ceiling(DEFAULT_CEILING)
    }

    pub fn with_ceiling(ceiling: usize) -> Self {
        Self {
            queue: DashMap::new(),
            ceiling,
            permission_granted: AtomicBool::new(true),
            available: AtomicBool::new(true),
            enqueue_budget: AtomicUsize::new(usize::MAX),
            cancel_failures: AtomicBool::new(false),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    /// Occupy `count` slots with deliveries owned by someone else
    pub fn preload(&self, count: usize) {
        for n in 0..count {
            self.queue.insert(
                Self::next_handle(),
                QueuedDelivery {
                    title: format!("external {}", n + 1),
                    content: String::new(),
                    deliver_at: None,
                },
            );
        }
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    /// When unavailable, every call fails with [`BackendError::Unavailable`]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Let `successes` more enqueues through, then reject the rest
    pub fn fail_after(&self, successes: usize) {
        self.enqueue_budget.store(successes, Ordering::SeqCst);
    }

    pub fn set_cancel_failures(&self, fail: bool) {
        self.cancel_failures.store(fail, Ordering::SeqCst);
    }

    /// Number of `cancel` calls received, failed ones included
    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, handle: &DeliveryHandle) -> Option<QueuedDelivery> {
        self.queue.get(handle).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Simulate the platform delivering an item, freeing its slot
    pub fn deliver(&self, handle: &DeliveryHandle) -> Option<QueuedDelivery> {
        self.queue.remove(handle).map(|(_, delivery)| delivery)
    }

    /// Deliver everything due at or before `now`, returning the handles
    pub fn deliver_due(&self, now: DateTime<Utc>) -> Vec<DeliveryHandle> {
        let due: Vec<DeliveryHandle> = self
            .queue
            .iter()
            .filter(|entry| entry.deliver_at.is_none_or(|at| at <= now))
            .map(|entry| entry.key().clone())
            .collect();
        for handle in &due {
            self.queue.remove(handle);
        }
        due
    }

    fn next_handle() -> DeliveryHandle {
        DeliveryHandle::new(uuid::Uuid::new_v4().to_string())
    }

    fn ensure_available(&self) -> Result<(), BackendError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("memory backend offline".into()))
        }
    }

    fn enqueue(&self, delivery: QueuedDelivery) -> Result<DeliveryHandle, BackendError> {
        self.ensure_available()?;

        let budget = self.enqueue_budget.load(Ordering::SeqCst);
        if budget == 0 {
            return Err(BackendError::Rejected("injected enqueue failure".into()));
        }
        if budget != usize::MAX {
            self.enqueue_budget.store(budget - 1, Ordering::SeqCst);
        }

        if self.queue.len() >= self.ceiling {
            return Err(BackendError::Rejected(format!(
                "outstanding ceiling of {} reached",
                self.ceiling
            )));
        }

        let handle = Self::next_handle();
        debug!("Queued '{}' as {}", delivery.title, handle);
        self.queue.insert(handle.clone(), delivery);
        Ok(handle)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryBackend for MemoryBackend {
    async fn check_permission(&self) -> Result<Permission, BackendError> {
        self.ensure_available()?;
        if self.permission_granted.load(Ordering::SeqCst) {
            Ok(Permission::Granted)
        } else {
            Ok(Permission::Denied)
        }
    }

    async fn outstanding_count(&self) -> Result<usize, BackendError> {
        self.ensure_available()?;
        Ok(self.queue.len())
    }

    fn outstanding_ceiling(&self) -> usize {
        self.ceiling
    }

    async fn enqueue_at(
        &self,
        content: &str,
        title: &str,
        at: DateTime<Utc>,
    ) -> Result<DeliveryHandle, BackendError> {
        self.enqueue(QueuedDelivery {
            title: title.to_string(),
            content: content.to_string(),
            deliver_at: Some(at),
        })
    }

    async fn enqueue_immediate(
        &self,
        content: &str,
        title: &str,
    ) -> Result<DeliveryHandle, BackendError> {
        self.enqueue(QueuedDelivery {
            title: title.to_string(),
            content: content.to_string(),
            deliver_at: None,
        })
    }

    async fn cancel(&self, handle: &DeliveryHandle) -> Result<(), BackendError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        if self.cancel_failures.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("injected cancel failure".into()));
        }
        self.queue.remove(handle);
        Ok(())
    }

    async fn cancel_all(&self) -> Result<(), BackendError> {
        self.ensure_available()?;
        self.queue.clear();
        Ok(())
    }
}
