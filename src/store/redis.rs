use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::debug;

use super::KeyValueStore;
use crate::error::Result;
use crate::utils::rdconfig::{get_redis_conn, namespaced};

/// Retry state kept in Redis as plain string keys under a namespace.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    namespace: String,
}

impl RedisStore {
    pub fn new(conn: MultiplexedConnection, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    pub async fn connect(redis_url: &str, namespace: impl Into<String>) -> Result<Self> {
        let conn = get_redis_conn(redis_url).await?;
        Ok(Self::new(conn, namespace))
    }

    fn key(&self, key: &str) -> String {
        namespaced(&self.namespace, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(self.key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.key(key), value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.del(self.key(key)).await?;
        debug!(key, removed, "deleted key");
        Ok(())
    }
}
