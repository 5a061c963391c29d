use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use serde_json::Value;
use tracing::{debug, warn};

use super::{range_bounds, DelayedScheduler};
use crate::error::Result;
use crate::job::JobDescriptor;
use crate::utils::constants::{DELAYED_SCHEDULE_KEY, PREFIX_DELAYED, PREFIX_TIMESTAMPS};
use crate::utils::rdconfig::{get_redis_conn, namespaced};

/// Drops a bucket from the schedule once its list is empty.
///
/// KEYS[1] = bucket list, KEYS[2] = schedule zset, ARGV[1] = timestamp
const CLEAN_UP_BUCKET: &str = r#"
if redis.call('LLEN', KEYS[1]) == 0 then
    redis.call('DEL', KEYS[1])
    redis.call('ZREM', KEYS[2], ARGV[1])
    return 1
end
return 0
"#;

fn schedule_key(namespace: &str) -> String {
    namespaced(namespace, DELAYED_SCHEDULE_KEY)
}

/// `delayed:<ts>`, also the member stored in a job's timestamps set.
fn bucket_ref(timestamp: i64) -> String {
    format!("{PREFIX_DELAYED}:{timestamp}")
}

fn bucket_key(namespace: &str, timestamp: i64) -> String {
    namespaced(namespace, &bucket_ref(timestamp))
}

fn timestamps_key(namespace: &str, encoded: &str) -> String {
    namespaced(namespace, &format!("{PREFIX_TIMESTAMPS}:{encoded}"))
}

/// Delayed schedule in the resque-scheduler layout:
///
/// - `<ns>:delayed_queue_schedule` zset of bucket timestamps
/// - `<ns>:delayed:<ts>` list of JSON-encoded jobs
/// - `<ns>:timestamps:<encoded job>` set of `delayed:<ts>` back references
#[derive(Clone)]
pub struct RedisScheduler {
    conn: MultiplexedConnection,
    namespace: String,
    clean_up: Script,
}

impl RedisScheduler {
    pub fn new(conn: MultiplexedConnection, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
            clean_up: Script::new(CLEAN_UP_BUCKET),
        }
    }

    pub async fn connect(redis_url: &str, namespace: impl Into<String>) -> Result<Self> {
        let conn = get_redis_conn(redis_url).await?;
        Ok(Self::new(conn, namespace))
    }

    fn key_schedule(&self) -> String {
        schedule_key(&self.namespace)
    }

    fn key_bucket(&self, timestamp: i64) -> String {
        bucket_key(&self.namespace, timestamp)
    }

    fn key_timestamps(&self, encoded: &str) -> String {
        timestamps_key(&self.namespace, encoded)
    }

    fn decode_entry(timestamp: i64, raw: &str) -> Option<JobDescriptor> {
        match serde_json::from_str(raw) {
            Ok(job) => Some(job),
            Err(err) => {
                warn!(timestamp, entry = raw, error = %err, "skipping malformed delayed entry");
                None
            }
        }
    }

    /// Removes matching entries from one bucket, returning how many went.
    async fn remove_from_bucket(&self, timestamp: i64, class: &str, args: &[Value]) -> Result<usize> {
        let mut conn = self.conn.clone();
        let bucket_key = self.key_bucket(timestamp);
        let entries: Vec<String> = conn.lrange(&bucket_key, 0, -1).await?;

        let mut removed = 0;
        for raw in entries {
            let matched = Self::decode_entry(timestamp, &raw)
                .map(|job| job.matches(class, args))
                .unwrap_or(false);
            if !matched {
                continue;
            }

            let count: usize = conn.lrem(&bucket_key, 0, &raw).await?;
            conn.srem::<_, _, ()>(self.key_timestamps(&raw), bucket_ref(timestamp))
                .await?;
            removed += count;
        }

        if removed > 0 {
            let _: i64 = self
                .clean_up
                .key(&bucket_key)
                .key(self.key_schedule())
                .arg(timestamp)
                .invoke_async(&mut conn)
                .await?;
        }

        Ok(removed)
    }
}

#[async_trait]
impl DelayedScheduler for RedisScheduler {
    async fn peek(&self, timestamp: i64, offset: usize, limit: usize) -> Result<Vec<JobDescriptor>> {
        let mut conn = self.conn.clone();
        let (start, stop) = range_bounds(offset, limit);
        let entries: Vec<String> = conn.lrange(self.key_bucket(timestamp), start, stop).await?;

        Ok(entries
            .iter()
            .filter_map(|raw| Self::decode_entry(timestamp, raw))
            .collect())
    }

    // Scans every bucket: the scheduler indexes entries by time, not by job.
    async fn remove(&self, class: &str, args: &[Value]) -> Result<bool> {
        let mut removed = 0;
        for timestamp in self.timestamps(0, 0).await? {
            removed += self.remove_from_bucket(timestamp, class, args).await?;
        }

        debug!(class, removed, "removed delayed entries");
        Ok(removed > 0)
    }

    async fn timestamps(&self, offset: usize, limit: usize) -> Result<Vec<i64>> {
        let mut conn = self.conn.clone();
        let (start, stop) = range_bounds(offset, limit);
        let timestamps: Vec<i64> = conn.zrange(self.key_schedule(), start, stop).await?;
        Ok(timestamps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resque_namespace_layout() {
        assert_eq!(schedule_key("resque"), "resque:delayed_queue_schedule");
        assert_eq!(bucket_ref(1_700_000_000), "delayed:1700000000");
        assert_eq!(bucket_key("resque", 1_700_000_000), "resque:delayed:1700000000");
        assert_eq!(
            timestamps_key("resque", r#"{"class":"SendEmail","args":[]}"#),
            r#"resque:timestamps:{"class":"SendEmail","args":[]}"#
        );
    }

    #[test]
    fn empty_namespace_layout() {
        assert_eq!(schedule_key(""), "delayed_queue_schedule");
        assert_eq!(bucket_key("", 42), "delayed:42");
        assert_eq!(timestamps_key("", "{}"), "timestamps:{}");
    }

    #[test]
    fn decode_entry_skips_malformed() {
        assert!(RedisScheduler::decode_entry(42, "not json").is_none());
        assert!(RedisScheduler::decode_entry(42, r#"{"args":[]}"#).is_none());
    }

    #[test]
    fn decode_entry_ignores_queue_field() {
        let job = RedisScheduler::decode_entry(
            42,
            r#"{"class":"SendEmail","args":["a@example.com"],"queue":"mail"}"#,
        );
        assert_eq!(
            job,
            Some(JobDescriptor::new("SendEmail", vec![json!("a@example.com")]))
        );
    }
}
