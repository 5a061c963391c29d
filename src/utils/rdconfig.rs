// src/utils/rdconfig.rs
use redis::{aio::MultiplexedConnection, Client};

pub async fn get_redis_conn(redis_url: &str) -> redis::RedisResult<MultiplexedConnection> {
    // Client::open will auto-handle rediss:// since the TLS feature is enabled
    let client = Client::open(redis_url)?;
    client.get_multiplexed_async_connection().await
}

/// Prefixes a logical key with the Redis namespace, `ns:key`.
pub fn namespaced(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{namespace}:{key}")
    }
}
