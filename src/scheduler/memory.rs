use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{window, DelayedScheduler};
use crate::error::Result;
use crate::job::JobDescriptor;

/// In-process delayed schedule: timestamp bucket -> jobs in insertion order.
///
/// Clones share the same schedule.
#[derive(Debug, Clone, Default)]
pub struct MemoryScheduler {
    buckets: Arc<RwLock<BTreeMap<i64, Vec<JobDescriptor>>>>,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue_at(&self, timestamp: i64, job: JobDescriptor) {
        self.buckets.write().await.entry(timestamp).or_default().push(job);
    }

    pub async fn is_scheduled(&self, job: &JobDescriptor) -> bool {
        self.buckets
            .read()
            .await
            .values()
            .flatten()
            .any(|entry| entry.matches(&job.class, &job.args))
    }

    pub async fn len(&self) -> usize {
        self.buckets.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl DelayedScheduler for MemoryScheduler {
    async fn peek(&self, timestamp: i64, offset: usize, limit: usize) -> Result<Vec<JobDescriptor>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(&timestamp)
            .map(|jobs| window(jobs, offset, limit))
            .unwrap_or_default())
    }

    async fn remove(&self, class: &str, args: &[Value]) -> Result<bool> {
        let mut buckets = self.buckets.write().await;
        let mut removed = 0;

        buckets.retain(|_, jobs| {
            let before = jobs.len();
            jobs.retain(|job| !job.matches(class, args));
            removed += before - jobs.len();
            !jobs.is_empty()
        });

        Ok(removed > 0)
    }

    async fn timestamps(&self, offset: usize, limit: usize) -> Result<Vec<i64>> {
        let buckets = self.buckets.read().await;
        let all: Vec<i64> = buckets.keys().copied().collect();
        Ok(window(&all, offset, limit))
    }
}
