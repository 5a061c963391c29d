//! Retry fingerprinting and retry cancellation for Redis-backed job queues.
//!
//! A failed job's retry state (attempt counter and failure detail) is keyed by
//! a fingerprint derived from the job's class and args. Cancelling a scheduled
//! retry removes that state and the scheduler's delayed entry.

pub mod cancel;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod job;
pub mod retry_state;
pub mod scheduler;
pub mod store;
pub mod utils;

pub use cancel::{CancelOutcome, CancelStatus, CancelSummary, RetryCanceller};
pub use config::RetryConfig;
pub use error::{Result, RetryError};
pub use fingerprint::{derive, Fingerprinter, RetryFingerprint};
pub use job::JobDescriptor;
pub use retry_state::{FailureDetail, RetryState, RetryStatus};
pub use scheduler::{DelayedScheduler, MemoryScheduler, RedisScheduler};
pub use store::{KeyValueStore, MemoryStore, RedisStore};
