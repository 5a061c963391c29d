//! Key-value store behind the retry state.
//!
//! Every call goes to the backing store; nothing is cached, since a worker may
//! be bumping the same counter concurrently.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;

use crate::error::Result;

/// Durable get/set/delete. All three are idempotent at the store level.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
