//! Turns split segments into numbered work items

use crate::core::item::WorkItem;

/// Build a fresh pending batch, numbered 1..N in segment order
pub fn build_items(segments: Vec<String>) -> Vec<WorkItem> {
    let total = segments.len();
    segments
        .into_iter()
        .enumerate()
        .map(|(index, content)| WorkItem::new(index + 1, total, content))
        .collect()
}

/// Restore contiguous numbering after the batch size changed
pub fn renumber(items: &mut [WorkItem]) {
    let total = items.len();
    for (index, item) in items.iter_mut().enumerate() {
        item.part_number = index + 1;
        item.total_parts = total;
    }
}
