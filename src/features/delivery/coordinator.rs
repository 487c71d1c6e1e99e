//! # Delivery Coordinator
//!
//! Owns one batch of work items and drives it through the delivery backend.
//! Every public operation holds the batch lock for its whole duration, backend
//! awaits included, so backend calls go out one at a time in batch order and
//! nothing else mutates the batch in between.
//!
//! - **Version**: 1.3.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.3.0: Target times are computed with overflow checks before enqueueing
//! - 1.2.0: Added broadcast events for observers
//! - 1.1.0: Added immediate sending and delivery confirmation
//! - 1.0.0: Initial release with scheduling, cancellation, and removal

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use super::backend::{DeliveryBackend, Permission};
use super::events::{BatchEvent, EVENT_CHANNEL_CAPACITY};
use crate::core::{
    build_items, prepare_text, renumber, split, DeliveryError, DeliveryHandle, ItemId,
    ItemStatus, Result, SplitConfiguration, WorkItem,
};

/// Result of a scheduling call that did not hit a backend failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    /// Items moved to `scheduled` by this call
    pub scheduled: usize,
    /// Eligible items left `pending` because the backend ran out of slots
    pub deferred: usize,
}

impl ScheduleOutcome {
    /// True when every eligible item was scheduled
    pub fn is_complete(&self) -> bool {
        self.deferred == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnqueueMode {
    /// Every item goes through `enqueue_at`
    AtTime,
    /// The first item goes through `enqueue_immediate`
    ImmediateFirst,
}

pub struct DeliveryCoordinator {
    backend: Arc<dyn DeliveryBackend>,
    config: SplitConfiguration,
    batch: Mutex<Vec<WorkItem>>,
    event_tx: broadcast::Sender<BatchEvent>,
}

impl DeliveryCoordinator {
    /// Create a coordinator with an empty batch
    pub fn new(backend: Arc<dyn DeliveryBackend>, config: SplitConfiguration) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            config,
            batch: Mutex::new(Vec::new()),
            event_tx,
        }
    }

    pub fn config(&self) -> &SplitConfiguration {
        &self.config
    }

    /// Receive a [`BatchEvent`] after each mutation
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: BatchEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Split text with the configured limit and make it the current batch
    ///
    /// Returns the number of items produced. Blank text yields
    /// [`DeliveryError::InputEmpty`] and leaves the current batch untouched.
    pub async fn load_text(&self, text: &str) -> Result<usize> {
        let trimmed = prepare_text(text)?;
        let segments = split(trimmed, self.config.max_chars);
        self.load_segments(segments).await
    }

    /// Replace the current batch with items built from `segments`
    ///
    /// Items of the previous batch that are still outstanding are cancelled
    /// first, best-effort.
    pub async fn load_segments(&self, segments: Vec<String>) -> Result<usize> {
        let mut batch = self.batch.lock().await;
        for index in 0..batch.len() {
            self.cancel_at(&mut batch, index).await;
        }

        *batch = build_items(segments);
        let total = batch.len();
        info!("Loaded batch of {} item(s)", total);
        self.emit(BatchEvent::Loaded { total });
        Ok(total)
    }

    /// Schedule pending items starting at `base_time`, spaced by the
    /// configured interval
    pub async fn schedule_batch(&self, base_time: DateTime<Utc>) -> Result<ScheduleOutcome> {
        self.run_schedule(base_time, EnqueueMode::AtTime).await
    }

    /// Schedule pending items starting now; the first goes out immediately
    pub async fn send_immediately(&self) -> Result<ScheduleOutcome> {
        self.run_schedule(Utc::now(), EnqueueMode::ImmediateFirst)
            .await
    }

    async fn run_schedule(
        &self,
        base_time: DateTime<Utc>,
        mode: EnqueueMode,
    ) -> Result<ScheduleOutcome> {
        let mut batch = self.batch.lock().await;

        match self.backend.check_permission().await {
            Ok(Permission::Granted) => {}
            Ok(Permission::Denied) => {
                warn!("Delivery permission denied");
                return Err(DeliveryError::PermissionDenied);
            }
            Err(e) => {
                warn!("Permission check failed: {e}");
                return Err(DeliveryError::PermissionDenied);
            }
        }

        let eligible: Vec<usize> = batch
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status == ItemStatus::Pending)
            .map(|(index, _)| index)
            .collect();
        if eligible.is_empty() {
            debug!("No pending items to schedule");
            return Ok(ScheduleOutcome::default());
        }

        let ceiling = self.backend.outstanding_ceiling();
        let outstanding = self.backend.outstanding_count().await?;
        let available = ceiling.saturating_sub(outstanding);
        if available == 0 {
            warn!("No delivery slots available ({outstanding}/{ceiling})");
            return Err(DeliveryError::CapacityExceeded {
                outstanding,
                ceiling,
            });
        }

        let take = eligible.len().min(available);
        let interval = self.config.interval().ok_or_else(|| {
            warn!("Interval of {}s is out of range", self.config.interval_secs);
            DeliveryError::IntervalOutOfRange(self.config.interval_secs)
        })?;

        // All targets are known to be representable before anything is enqueued
        let targets = eligible
            .iter()
            .take(take)
            .enumerate()
            .map(|(offset, &index)| {
                i32::try_from(offset)
                    .ok()
                    .and_then(|n| interval.checked_mul(n))
                    .and_then(|step| base_time.checked_add_signed(step))
                    .ok_or(DeliveryError::TargetTimeOutOfRange {
                        part_number: batch[index].part_number,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        for (offset, (&index, target)) in eligible.iter().zip(targets).enumerate() {
            let (id, part_number, content, title) = {
                let item = &batch[index];
                (
                    item.id,
                    item.part_number,
                    item.content.clone(),
                    item.title(&self.config.title_prefix),
                )
            };

            let result = if mode == EnqueueMode::ImmediateFirst && offset == 0 {
                self.backend.enqueue_immediate(&content, &title).await
            } else {
                self.backend.enqueue_at(&content, &title, target).await
            };

            match result {
                Ok(handle) => {
                    debug!("Scheduled {title} for {target} as {handle}");
                    batch[index].mark_scheduled(target, handle);
                    self.emit(BatchEvent::Scheduled {
                        id,
                        part_number,
                        at: target,
                    });
                }
                Err(e) => {
                    warn!("Scheduling stopped at {title} after {offset} success(es): {e}");
                    return Err(DeliveryError::PartialSchedulingFailure {
                        succeeded: offset,
                        failed_at: id,
                        failed_part: part_number,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let outcome = ScheduleOutcome {
            scheduled: take,
            deferred: eligible.len() - take,
        };
        if outcome.is_complete() {
            info!("Scheduled {} item(s)", outcome.scheduled);
        } else {
            info!(
                "Scheduled {} item(s); {} deferred for lack of delivery slots",
                outcome.scheduled, outcome.deferred
            );
        }
        Ok(outcome)
    }

    /// Cancel one item and return its resulting status
    ///
    /// Sent and cancelled items are left as they are.
    pub async fn cancel(&self, id: ItemId) -> Result<ItemStatus> {
        let mut batch = self.batch.lock().await;
        let index = Self::position(&batch, id)?;
        self.cancel_at(&mut batch, index).await;
        Ok(batch[index].status)
    }

    /// Cancel (if still active) and remove one item, renumbering the rest
    pub async fn remove(&self, id: ItemId) -> Result<WorkItem> {
        let mut batch = self.batch.lock().await;
        let index = Self::position(&batch, id)?;
        self.cancel_at(&mut batch, index).await;

        let removed = batch.remove(index);
        renumber(&mut batch);
        debug!("Removed part {} ({id})", removed.part_number);
        self.emit(BatchEvent::Removed {
            id,
            remaining: batch.len(),
        });
        Ok(removed)
    }

    /// Cancel every active item, best-effort, and empty the batch
    ///
    /// Returns how many items were removed.
    pub async fn clear_all(&self) -> Result<usize> {
        let mut batch = self.batch.lock().await;
        if batch.is_empty() {
            return Ok(0);
        }

        for index in 0..batch.len() {
            self.cancel_at(&mut batch, index).await;
        }
        let removed = batch.len();
        batch.clear();
        info!("Cleared batch of {removed} item(s)");
        self.emit(BatchEvent::Cleared { removed });
        Ok(removed)
    }

    /// Ask the backend to drop every outstanding delivery, including ones
    /// this batch does not own, and mark active items cancelled
    pub async fn cancel_all_outstanding(&self) -> Result<usize> {
        let mut batch = self.batch.lock().await;
        if let Err(e) = self.backend.cancel_all().await {
            warn!("Backend cancel-all failed, marking items cancelled anyway: {e}");
        }

        let mut cancelled = 0;
        for item in batch.iter_mut().filter(|item| !item.status.is_terminal()) {
            item.mark_cancelled();
            cancelled += 1;
            self.emit(BatchEvent::Cancelled { id: item.id });
        }
        Ok(cancelled)
    }

    /// Replace the text of an item that has not been delivered yet
    pub async fn edit_content(&self, id: ItemId, new_content: impl Into<String>) -> Result<()> {
        let mut batch = self.batch.lock().await;
        let index = Self::position(&batch, id)?;
        let item = &mut batch[index];
        if !item.status.is_editable() {
            return Err(DeliveryError::NotEditable {
                id,
                status: item.status,
            });
        }
        item.content = new_content.into();
        self.emit(BatchEvent::Edited { id });
        Ok(())
    }

    /// Record that the backend delivered the item holding `handle`
    pub async fn confirm_delivery(&self, handle: &DeliveryHandle) -> Result<ItemId> {
        let mut batch = self.batch.lock().await;
        let item = batch
            .iter_mut()
            .find(|item| {
                item.status == ItemStatus::Scheduled && item.delivery_handle.as_ref() == Some(handle)
            })
            .ok_or_else(|| DeliveryError::UnknownHandle(handle.clone()))?;

        item.mark_sent();
        let id = item.id;
        debug!("Part {} delivered", item.part_number);
        self.emit(BatchEvent::Delivered { id });
        Ok(id)
    }

    /// Copy of the current batch for display or polling
    pub async fn snapshot(&self) -> Vec<WorkItem> {
        self.batch.lock().await.clone()
    }

    pub async fn get(&self, id: ItemId) -> Option<WorkItem> {
        self.batch
            .lock()
            .await
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.batch.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.batch.lock().await.is_empty()
    }

    /// Whether anything in the batch can still be sent or cancelled
    pub async fn can_send(&self) -> bool {
        self.batch
            .lock()
            .await
            .iter()
            .any(|item| matches!(item.status, ItemStatus::Pending | ItemStatus::Scheduled))
    }

    /// Get counts of items by status
    pub async fn status_counts(&self) -> HashMap<ItemStatus, usize> {
        let mut stats = HashMap::new();
        stats.insert(ItemStatus::Pending, 0);
        stats.insert(ItemStatus::Scheduled, 0);
        stats.insert(ItemStatus::Sent, 0);
        stats.insert(ItemStatus::Cancelled, 0);

        for item in self.batch.lock().await.iter() {
            *stats.entry(item.status).or_insert(0) += 1;
        }

        stats
    }

    fn position(batch: &[WorkItem], id: ItemId) -> Result<usize> {
        batch
            .iter()
            .position(|item| item.id == id)
            .ok_or(DeliveryError::ItemNotFound(id))
    }

    /// Cancel the item at `index` unless terminal; backend failures are
    /// logged and swallowed
    async fn cancel_at(&self, batch: &mut [WorkItem], index: usize) -> bool {
        if batch[index].status.is_terminal() {
            debug!(
                "Part {} is already {}, nothing to cancel",
                batch[index].part_number, batch[index].status
            );
            return false;
        }

        if let Some(handle) = batch[index].delivery_handle.clone() {
            if let Err(e) = self.backend.cancel(&handle).await {
                warn!("Failed to cancel delivery {handle}: {e}");
            }
        }

        let item = &mut batch[index];
        item.mark_cancelled();
        self.emit(BatchEvent::Cancelled { id: item.id });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::delivery::memory::MemoryBackend;
    use chrono::Duration;

    fn coordinator_with(backend: Arc<MemoryBackend>) -> DeliveryCoordinator {
        let config = SplitConfiguration {
            max_chars: 20,
            interval_secs: 60,
            title_prefix: "Part".into(),
        };
        DeliveryCoordinator::new(backend, config)
    }

    fn segments(count: usize) -> Vec<String> {
        (1..=count).map(|n| format!("segment {n}")).collect()
    }

    async fn loaded(count: usize) -> (Arc<MemoryBackend>, DeliveryCoordinator) {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = coordinator_with(backend.clone());
        coordinator.load_segments(segments(count)).await.unwrap();
        (backend, coordinator)
    }

    fn assert_handle_invariant(items: &[WorkItem]) {
        for item in items {
            assert_eq!(
                item.delivery_handle.is_some(),
                item.status == ItemStatus::Scheduled,
                "handle/status mismatch on part {}",
                item.part_number
            );
        }
    }

    #[tokio::test]
    async fn test_load_text_splits_with_configured_limit() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = coordinator_with(backend);

        let total = coordinator
            .load_text("The quick brown fox jumps over the lazy dog.")
            .await
            .unwrap();
        assert_eq!(total, 3);

        let items = coordinator.snapshot().await;
        assert_eq!(items[0].content, "The quick brown fox");
        assert_eq!(items[2].content, "dog.");
        assert!(items.iter().all(|item| item.total_parts == 3));
    }

    #[tokio::test]
    async fn test_load_blank_text_is_input_empty() {
        let (_, coordinator) = loaded(2).await;
        assert_eq!(
            coordinator.load_text("   \n ").await,
            Err(DeliveryError::InputEmpty)
        );
        assert_eq!(coordinator.len().await, 2);
    }

    #[tokio::test]
    async fn test_schedule_batch_assigns_spaced_times() {
        let (backend, coordinator) = loaded(3).await;
        let base = Utc::now() + Duration::minutes(5);

        let outcome = coordinator.schedule_batch(base).await.unwrap();
        assert_eq!(
            outcome,
            ScheduleOutcome {
                scheduled: 3,
                deferred: 0
            }
        );

        let items = coordinator.snapshot().await;
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.status, ItemStatus::Scheduled);
            assert_eq!(item.scheduled_at, Some(base + Duration::seconds(60 * i as i64)));
            let queued = backend.get(item.delivery_handle.as_ref().unwrap()).unwrap();
            assert_eq!(queued.title, format!("Part {}/3", i + 1));
            assert_eq!(queued.content, item.content);
        }
        assert_handle_invariant(&items);
    }

    #[tokio::test]
    async fn test_capacity_truncation() {
        let backend = Arc::new(MemoryBackend::new());
        backend.preload(60);
        let coordinator = coordinator_with(backend.clone());
        coordinator.load_segments(segments(10)).await.unwrap();

        let outcome = coordinator.schedule_batch(Utc::now()).await.unwrap();
        assert_eq!(outcome.scheduled, 4);
        assert_eq!(outcome.deferred, 6);
        assert!(!outcome.is_complete());

        let items = coordinator.snapshot().await;
        assert!(items[..4].iter().all(|i| i.status == ItemStatus::Scheduled));
        assert!(items[4..].iter().all(|i| i.status == ItemStatus::Pending));
        assert_eq!(backend.len(), 64);
    }

    #[tokio::test]
    async fn test_capacity_exceeded_touches_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        backend.preload(64);
        let coordinator = coordinator_with(backend);
        coordinator.load_segments(segments(2)).await.unwrap();

        let result = coordinator.schedule_batch(Utc::now()).await;
        assert_eq!(
            result,
            Err(DeliveryError::CapacityExceeded {
                outstanding: 64,
                ceiling: 64
            })
        );
        let items = coordinator.snapshot().await;
        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
    }

    #[tokio::test]
    async fn test_permission_denied_touches_nothing() {
        let (backend, coordinator) = loaded(3).await;
        backend.set_permission(false);

        assert_eq!(
            coordinator.schedule_batch(Utc::now()).await,
            Err(DeliveryError::PermissionDenied)
        );
        assert_eq!(coordinator.send_immediately().await, Err(DeliveryError::PermissionDenied));
        assert!(backend.is_empty());
        let items = coordinator.snapshot().await;
        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
    }

    #[tokio::test]
    async fn test_unavailable_backend_reports_permission_error() {
        let (backend, coordinator) = loaded(1).await;
        backend.set_available(false);
        assert_eq!(
            coordinator.schedule_batch(Utc::now()).await,
            Err(DeliveryError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_partial_failure_is_fail_fast() {
        let (backend, coordinator) = loaded(5).await;
        backend.fail_after(2);

        let result = coordinator.schedule_batch(Utc::now()).await;
        let items = coordinator.snapshot().await;
        match result {
            Err(DeliveryError::PartialSchedulingFailure {
                succeeded,
                failed_at,
                failed_part,
                ..
            }) => {
                assert_eq!(succeeded, 2);
                assert_eq!(failed_at, items[2].id);
                assert_eq!(failed_part, 3);
            }
            other => panic!("expected partial failure, got {other:?}"),
        }

        assert_eq!(items[0].status, ItemStatus::Scheduled);
        assert_eq!(items[1].status, ItemStatus::Scheduled);
        assert!(items[2..].iter().all(|i| i.status == ItemStatus::Pending));
        assert_handle_invariant(&items);

        // Retrying picks up exactly the unscheduled remainder
        backend.fail_after(usize::MAX);
        let retry = coordinator.schedule_batch(Utc::now()).await.unwrap();
        assert_eq!(retry.scheduled, 3);
    }

    #[tokio::test]
    async fn test_only_pending_items_are_eligible() {
        let (_, coordinator) = loaded(3).await;
        let items = coordinator.snapshot().await;
        coordinator.cancel(items[0].id).await.unwrap();

        let base = Utc::now();
        let outcome = coordinator.schedule_batch(base).await.unwrap();
        assert_eq!(outcome.scheduled, 2);

        // Offsets count eligible items, not batch positions
        let items = coordinator.snapshot().await;
        assert_eq!(items[1].scheduled_at, Some(base));
        assert_eq!(items[2].scheduled_at, Some(base + Duration::seconds(60)));

        let again = coordinator.schedule_batch(base).await.unwrap();
        assert_eq!(again, ScheduleOutcome::default());
    }

    #[tokio::test]
    async fn test_send_immediately() {
        let (backend, coordinator) = loaded(3).await;
        let before = Utc::now();

        let outcome = coordinator.send_immediately().await.unwrap();
        assert_eq!(outcome.scheduled, 3);

        let items = coordinator.snapshot().await;
        let first = backend.get(items[0].delivery_handle.as_ref().unwrap()).unwrap();
        assert!(first.deliver_at.is_none());

        let second_at = items[1].scheduled_at.unwrap();
        let first_at = items[0].scheduled_at.unwrap();
        assert!(first_at >= before);
        assert_eq!(second_at - first_at, Duration::seconds(60));
        assert_handle_invariant(&items);
    }

    #[tokio::test]
    async fn test_send_immediately_first_enqueue_fails() {
        let (backend, coordinator) = loaded(3).await;
        backend.fail_after(0);

        let result = coordinator.send_immediately().await;
        let items = coordinator.snapshot().await;
        match result {
            Err(DeliveryError::PartialSchedulingFailure {
                succeeded,
                failed_at,
                failed_part,
                ..
            }) => {
                assert_eq!(succeeded, 0);
                assert_eq!(failed_at, items[0].id);
                assert_eq!(failed_part, 1);
            }
            other => panic!("expected partial failure, got {other:?}"),
        }

        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
        assert!(items.iter().all(|i| i.delivery_handle.is_none()));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_send_immediately_stops_after_first_item() {
        let (backend, coordinator) = loaded(3).await;
        backend.fail_after(1);

        let result = coordinator.send_immediately().await;
        let items = coordinator.snapshot().await;
        match result {
            Err(DeliveryError::PartialSchedulingFailure {
                succeeded,
                failed_at,
                failed_part,
                ..
            }) => {
                assert_eq!(succeeded, 1);
                assert_eq!(failed_at, items[1].id);
                assert_eq!(failed_part, 2);
            }
            other => panic!("expected partial failure, got {other:?}"),
        }

        assert_eq!(items[0].status, ItemStatus::Scheduled);
        let first = backend.get(items[0].delivery_handle.as_ref().unwrap()).unwrap();
        assert!(first.deliver_at.is_none());
        assert!(items[1..].iter().all(|i| i.status == ItemStatus::Pending));
        assert_eq!(backend.len(), 1);
        assert_handle_invariant(&items);
    }

    #[tokio::test]
    async fn test_send_immediately_capacity_truncation() {
        let backend = Arc::new(MemoryBackend::new());
        backend.preload(60);
        let coordinator = coordinator_with(backend.clone());
        coordinator.load_segments(segments(10)).await.unwrap();

        let outcome = coordinator.send_immediately().await.unwrap();
        assert_eq!(
            outcome,
            ScheduleOutcome {
                scheduled: 4,
                deferred: 6
            }
        );

        let items = coordinator.snapshot().await;
        assert!(items[..4].iter().all(|i| i.status == ItemStatus::Scheduled));
        assert!(items[4..].iter().all(|i| i.status == ItemStatus::Pending));
        let first = backend.get(items[0].delivery_handle.as_ref().unwrap()).unwrap();
        assert!(first.deliver_at.is_none());
        assert_eq!(backend.len(), 64);
    }

    #[tokio::test]
    async fn test_unrepresentable_interval_enqueues_nothing() {
        for interval_secs in [u64::MAX, 10_000_000_000_000_000] {
            let backend = Arc::new(MemoryBackend::new());
            let config = SplitConfiguration {
                interval_secs,
                ..Default::default()
            };
            let coordinator = DeliveryCoordinator::new(backend.clone(), config);
            coordinator.load_segments(segments(3)).await.unwrap();

            assert_eq!(
                coordinator.schedule_batch(Utc::now()).await,
                Err(DeliveryError::IntervalOutOfRange(interval_secs))
            );
            assert_eq!(
                coordinator.send_immediately().await,
                Err(DeliveryError::IntervalOutOfRange(interval_secs))
            );
            assert!(backend.is_empty());
            let items = coordinator.snapshot().await;
            assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
        }
    }

    #[tokio::test]
    async fn test_target_time_overflow_enqueues_nothing() {
        let (backend, coordinator) = loaded(3).await;
        let base = DateTime::<Utc>::MAX_UTC - Duration::seconds(30);

        assert_eq!(
            coordinator.schedule_batch(base).await,
            Err(DeliveryError::TargetTimeOutOfRange { part_number: 2 })
        );
        assert!(backend.is_empty());
        let items = coordinator.snapshot().await;
        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
        assert_handle_invariant(&items);
    }

    #[tokio::test]
    async fn test_longest_interval_keeps_targets_increasing() {
        let backend = Arc::new(MemoryBackend::new());
        let config = SplitConfiguration {
            interval_secs: crate::core::MAX_INTERVAL_SECS,
            ..Default::default()
        };
        let coordinator = DeliveryCoordinator::new(backend, config);
        coordinator.load_segments(segments(4)).await.unwrap();

        coordinator.schedule_batch(Utc::now()).await.unwrap();
        let times: Vec<_> = coordinator
            .snapshot()
            .await
            .iter()
            .map(|item| item.scheduled_at.unwrap())
            .collect();
        assert!(times.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_cancel_scheduled_item() {
        let (backend, coordinator) = loaded(2).await;
        coordinator.schedule_batch(Utc::now()).await.unwrap();
        let items = coordinator.snapshot().await;

        let status = coordinator.cancel(items[0].id).await.unwrap();
        assert_eq!(status, ItemStatus::Cancelled);

        let item = coordinator.get(items[0].id).await.unwrap();
        assert!(item.delivery_handle.is_none());
        assert!(item.scheduled_at.is_none());
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_swallows_backend_failure() {
        let (backend, coordinator) = loaded(1).await;
        coordinator.schedule_batch(Utc::now()).await.unwrap();
        backend.set_cancel_failures(true);

        let id = coordinator.snapshot().await[0].id;
        assert_eq!(coordinator.cancel(id).await, Ok(ItemStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_sent_item_is_ignored() {
        let (_, coordinator) = loaded(1).await;
        coordinator.schedule_batch(Utc::now()).await.unwrap();
        let item = coordinator.snapshot().await.remove(0);

        coordinator
            .confirm_delivery(item.delivery_handle.as_ref().unwrap())
            .await
            .unwrap();
        assert_eq!(coordinator.cancel(item.id).await, Ok(ItemStatus::Sent));
        assert_eq!(coordinator.get(item.id).await.unwrap().status, ItemStatus::Sent);
    }

    #[tokio::test]
    async fn test_cancel_unknown_item() {
        let (_, coordinator) = loaded(1).await;
        let missing = ItemId::new();
        assert_eq!(
            coordinator.cancel(missing).await,
            Err(DeliveryError::ItemNotFound(missing))
        );
    }

    #[tokio::test]
    async fn test_remove_middle_item_renumbers() {
        let (_, coordinator) = loaded(3).await;
        let items = coordinator.snapshot().await;

        let removed = coordinator.remove(items[1].id).await.unwrap();
        assert_eq!(removed.status, ItemStatus::Cancelled);

        let remaining = coordinator.snapshot().await;
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].part_number, 1);
        assert_eq!(remaining[1].part_number, 2);
        assert_eq!(remaining[1].id, items[2].id);
        assert!(remaining.iter().all(|i| i.total_parts == 2));
    }

    #[tokio::test]
    async fn test_remove_scheduled_item_cancels_at_backend() {
        let (backend, coordinator) = loaded(2).await;
        coordinator.schedule_batch(Utc::now()).await.unwrap();
        let id = coordinator.snapshot().await[0].id;

        coordinator.remove(id).await.unwrap();
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.cancel_calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_is_best_effort() {
        let (backend, coordinator) = loaded(3).await;
        coordinator.schedule_batch(Utc::now()).await.unwrap();
        backend.set_cancel_failures(true);

        assert_eq!(coordinator.clear_all().await, Ok(3));
        assert!(coordinator.is_empty().await);
        // Every scheduled item was attempted despite failures
        assert_eq!(backend.cancel_calls(), 3);
    }

    #[tokio::test]
    async fn test_clear_all_twice_on_empty_batch() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = coordinator_with(backend);
        let mut events = coordinator.subscribe();

        assert_eq!(coordinator.clear_all().await, Ok(0));
        assert_eq!(coordinator.clear_all().await, Ok(0));
        assert!(coordinator.is_empty().await);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancel_all_outstanding() {
        let (backend, coordinator) = loaded(3).await;
        backend.preload(5);
        coordinator.schedule_batch(Utc::now()).await.unwrap();

        assert_eq!(coordinator.cancel_all_outstanding().await, Ok(3));
        assert!(backend.is_empty());
        let counts = coordinator.status_counts().await;
        assert_eq!(counts[&ItemStatus::Cancelled], 3);
        assert!(!coordinator.can_send().await);
    }

    #[tokio::test]
    async fn test_edit_content_rules() {
        let (_, coordinator) = loaded(2).await;
        coordinator.schedule_batch(Utc::now()).await.unwrap();
        let items = coordinator.snapshot().await;

        coordinator.edit_content(items[0].id, "rewritten").await.unwrap();
        let edited = coordinator.get(items[0].id).await.unwrap();
        assert_eq!(edited.content, "rewritten");
        assert_eq!(edited.status, ItemStatus::Scheduled);
        assert_eq!(edited.delivery_handle, items[0].delivery_handle);
        assert_eq!(edited.scheduled_at, items[0].scheduled_at);

        coordinator.cancel(items[1].id).await.unwrap();
        assert_eq!(
            coordinator.edit_content(items[1].id, "too late").await,
            Err(DeliveryError::NotEditable {
                id: items[1].id,
                status: ItemStatus::Cancelled
            })
        );
    }

    #[tokio::test]
    async fn test_confirm_delivery() {
        let (backend, coordinator) = loaded(2).await;
        coordinator.schedule_batch(Utc::now()).await.unwrap();

        let delivered = backend.deliver_due(Utc::now());
        assert_eq!(delivered.len(), 1);
        let id = coordinator.confirm_delivery(&delivered[0]).await.unwrap();

        let item = coordinator.get(id).await.unwrap();
        assert_eq!(item.status, ItemStatus::Sent);
        assert!(item.delivery_handle.is_none());
        assert_handle_invariant(&coordinator.snapshot().await);

        assert_eq!(
            coordinator.confirm_delivery(&delivered[0]).await,
            Err(DeliveryError::UnknownHandle(delivered[0].clone()))
        );
    }

    #[tokio::test]
    async fn test_reload_cancels_previous_batch() {
        let (backend, coordinator) = loaded(2).await;
        coordinator.schedule_batch(Utc::now()).await.unwrap();
        assert_eq!(backend.len(), 2);

        coordinator.load_segments(segments(4)).await.unwrap();
        assert!(backend.is_empty());
        assert_eq!(coordinator.len().await, 4);
        assert!(coordinator.can_send().await);
    }

    #[tokio::test]
    async fn test_events_follow_mutations() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = coordinator_with(backend);
        let mut events = coordinator.subscribe();

        coordinator.load_segments(segments(2)).await.unwrap();
        let first = coordinator.snapshot().await[0].id;
        coordinator.remove(first).await.unwrap();

        assert_eq!(events.recv().await.unwrap(), BatchEvent::Loaded { total: 2 });
        assert_eq!(events.recv().await.unwrap(), BatchEvent::Cancelled { id: first });
        assert_eq!(
            events.recv().await.unwrap(),
            BatchEvent::Removed {
                id: first,
                remaining: 1
            }
        );
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (_, coordinator) = loaded(3).await;
        let first = coordinator.snapshot().await[0].id;
        coordinator.cancel(first).await.unwrap();

        let counts = coordinator.status_counts().await;
        assert_eq!(counts[&ItemStatus::Pending], 2);
        assert_eq!(counts[&ItemStatus::Cancelled], 1);
        assert_eq!(counts[&ItemStatus::Scheduled], 0);
        assert_eq!(counts[&ItemStatus::Sent], 0);
    }
}
