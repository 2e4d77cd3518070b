// src/queue/allocator.rs
// Order numbers are sequential per room per local day, starting at 1.

use crate::error::QueueError;

/// Next order number after the highest one already issued in the window.
pub fn next_order_num(latest: Option<i32>) -> Result<i32, QueueError> {
    latest
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| QueueError::Conflict("order number space exhausted".into()))
}
