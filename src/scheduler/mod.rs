//! Delayed-job scheduler seen from the retry side: peek a bucket, list buckets,
//! remove an entry. Enqueueing delayed jobs is the scheduler's own business.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryScheduler;
pub use self::redis::RedisScheduler;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::job::JobDescriptor;

#[async_trait]
pub trait DelayedScheduler: Send + Sync + 'static {
    /// Jobs scheduled at `timestamp`, in bucket order, without removing them.
    ///
    /// `limit == 0` reads to the end of the bucket.
    async fn peek(&self, timestamp: i64, offset: usize, limit: usize) -> Result<Vec<JobDescriptor>>;

    /// Removes every delayed entry whose class and args equal the given ones.
    ///
    /// Returns `false` when nothing matched.
    async fn remove(&self, class: &str, args: &[Value]) -> Result<bool>;

    /// Scheduled bucket timestamps, ascending. `limit == 0` lists all of them.
    async fn timestamps(&self, offset: usize, limit: usize) -> Result<Vec<i64>>;
}

/// Inclusive redis-style range for an offset/limit window.
///
/// Bounds past `isize::MAX` clamp to it.
pub(crate) fn range_bounds(offset: usize, limit: usize) -> (isize, isize) {
    let start = isize::try_from(offset).unwrap_or(isize::MAX);
    let stop = if limit == 0 {
        -1
    } else {
        isize::try_from(offset.saturating_add(limit) - 1).unwrap_or(isize::MAX)
    };
    (start, stop)
}

pub(crate) fn window<T: Clone>(items: &[T], offset: usize, limit: usize) -> Vec<T> {
    let rest = items.iter().skip(offset);
    if limit == 0 {
        rest.cloned().collect()
    } else {
        rest.take(limit).cloned().collect()
    }
}
