use std::env;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use crate::cancel::RetryCanceller;
use crate::fingerprint::Fingerprinter;
use crate::retry_state::RetryState;
use crate::scheduler::RedisScheduler;
use crate::store::RedisStore;
use crate::utils::constants::{
    DEFAULT_CANCEL_CONCURRENCY, DEFAULT_FINGERPRINT_PREFIX, DEFAULT_NAMESPACE, DEFAULT_REDIS_URL,
};
use crate::utils::rdconfig::get_redis_conn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    pub redis_url: String,
    /// Prefix for every Redis key, `<namespace>:<key>`. Empty for none.
    pub namespace: String,
    /// First segment of every retry fingerprint.
    pub fingerprint_prefix: String,
    pub cancel_concurrency: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            fingerprint_prefix: DEFAULT_FINGERPRINT_PREFIX.to_string(),
            cancel_concurrency: DEFAULT_CANCEL_CONCURRENCY,
        }
    }
}

impl RetryConfig {
    pub fn new(redis_url: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `QRUSH_REDIS_URL` (or `REDIS_URL`), `QRUSH_NAMESPACE`,
    /// `QRUSH_RETRY_PREFIX` and `QRUSH_CANCEL_CONCURRENCY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("QRUSH_REDIS_URL").or_else(|| lookup("REDIS_URL")) {
            config.redis_url = url;
        }
        if let Some(namespace) = lookup("QRUSH_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(prefix) = lookup("QRUSH_RETRY_PREFIX") {
            config.fingerprint_prefix = prefix;
        }
        if let Some(raw) = lookup("QRUSH_CANCEL_CONCURRENCY") {
            config.cancel_concurrency = raw
                .trim()
                .parse()
                .with_context(|| format!("QRUSH_CANCEL_CONCURRENCY is not a number: {raw:?}"))?;
        }

        config.validate()?;
        debug!(?config, "retry config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.redis_url.trim().is_empty() {
            return Err(anyhow!("Redis URL must not be empty"));
        }
        if self.cancel_concurrency == 0 {
            return Err(anyhow!("cancel concurrency must be at least 1"));
        }
        if self.fingerprint_prefix.chars().any(char::is_whitespace) {
            return Err(anyhow!(
                "fingerprint prefix must not contain whitespace: {:?}",
                self.fingerprint_prefix
            ));
        }
        Ok(())
    }

    pub fn fingerprinter(&self) -> Fingerprinter {
        Fingerprinter::new(self.fingerprint_prefix.clone())
    }

    /// Opens one multiplexed connection shared by the store and the scheduler.
    pub async fn connect(&self) -> Result<(RedisStore, RedisScheduler)> {
        self.validate()?;
        let conn = get_redis_conn(&self.redis_url)
            .await
            .with_context(|| "Failed to get Redis connection")?;
        info!(namespace = %self.namespace, "connected to Redis");

        Ok((
            RedisStore::new(conn.clone(), self.namespace.clone()),
            RedisScheduler::new(conn, self.namespace.clone()),
        ))
    }

    /// Redis-backed canceller wired from this config.
    pub async fn canceller(&self) -> Result<RetryCanceller<RedisStore, RedisScheduler>> {
        let (store, scheduler) = self.connect().await?;
        let state = RetryState::with_fingerprinter(store, self.fingerprinter());
        Ok(RetryCanceller::new(state, scheduler).with_concurrency(self.cancel_concurrency))
    }
}
