// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetryError>;

#[derive(Error, Debug)]
pub enum RetryError {
    /// Redis call failed (connection dropped, timeout, loading).
    #[error("Redis interaction failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// Any other store adapter that could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored failure detail exists but is not valid JSON for the record shape.
    #[error("Malformed failure detail at '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stored attempt counter exists but is not an integer.
    #[error("Malformed attempt counter at '{key}': {value:?}")]
    BadCounter { key: String, value: String },

    #[error("Failed to encode failure detail: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RetryError {
    /// Store outages. Worth reporting per job and trying again later.
    pub fn is_transient(&self) -> bool {
        match self {
            RetryError::Redis(e) => {
                e.is_connection_dropped()
                    || e.is_connection_refusal()
                    || e.is_timeout()
                    || e.is_io_error()
                    || e.is_cluster_error()
            }
            RetryError::Unavailable(_) => true,
            _ => false,
        }
    }

    /// Stored data that could not be read back.
    pub fn is_decode(&self) -> bool {
        matches!(self, RetryError::Decode { .. } | RetryError::BadCounter { .. })
    }
}
