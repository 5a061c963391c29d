pub const DEFAULT_FINGERPRINT_PREFIX: &str = "retry";
pub const FAILURE_KEY_PREFIX: &str = "failure-";

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_NAMESPACE: &str = "resque";
pub const DEFAULT_CANCEL_CONCURRENCY: usize = 8;

pub const DELAYED_SCHEDULE_KEY: &str = "delayed_queue_schedule";
pub const PREFIX_DELAYED: &str = "delayed";
pub const PREFIX_TIMESTAMPS: &str = "timestamps";
