// src/retry_state.rs
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, RetryError};
use crate::fingerprint::{Fingerprinter, RetryFingerprint};
use crate::job::JobDescriptor;
use crate::store::KeyValueStore;

const FAILED_AT_FORMAT: &str = "%Y/%m/%d %H:%M:%S UTC";

/// Diagnostics about the most recent failure of a retried job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FailureDetail {
    pub failed_at: String,
    #[serde(default)]
    pub payload: Value,
    pub exception: String,
    pub error: String,
    #[serde(default)]
    pub backtrace: Vec<String>,
    #[serde(default)]
    pub worker: Option<String>,
    #[serde(default)]
    pub queue: Option<String>,
}

impl FailureDetail {
    /// `failed_at` as a UTC time; accepts `YYYY/MM/DD HH:MM:SS UTC` and RFC 3339.
    pub fn failed_at_utc(&self) -> Option<DateTime<Utc>> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&self.failed_at, FAILED_AT_FORMAT) {
            return Some(naive.and_utc());
        }
        DateTime::parse_from_rfc3339(&self.failed_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// What an operator sees for one job: its fingerprint and recorded retry state.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RetryStatus {
    pub job: JobDescriptor,
    pub fingerprint: String,
    /// Zero when no counter is stored.
    pub attempts: i64,
    pub failure: Option<FailureDetail>,
}

/// Reads and removes the attempt counter and failure detail for a fingerprint.
///
/// Holds no cache. Every call hits the store.
#[derive(Debug, Clone)]
pub struct RetryState<S> {
    store: S,
    fingerprinter: Fingerprinter,
}

impl<S: KeyValueStore> RetryState<S> {
    pub fn new(store: S) -> Self {
        Self::with_fingerprinter(store, Fingerprinter::default())
    }

    pub fn with_fingerprinter(store: S, fingerprinter: Fingerprinter) -> Self {
        Self {
            store,
            fingerprinter,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    pub fn fingerprint(&self, job: &JobDescriptor) -> RetryFingerprint {
        self.fingerprinter.derive(job)
    }

    pub async fn get_attempts(&self, fingerprint: &RetryFingerprint) -> Result<Option<i64>> {
        let key = fingerprint.counter_key();
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let text = String::from_utf8_lossy(&raw);
        text.trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| RetryError::BadCounter {
                key,
                value: text.into_owned(),
            })
    }

    pub async fn set_attempts(&self, fingerprint: &RetryFingerprint, attempts: i64) -> Result<()> {
        self.store
            .set(&fingerprint.counter_key(), attempts.to_string().as_bytes())
            .await
    }

    pub async fn get_failure_detail(
        &self,
        fingerprint: &RetryFingerprint,
    ) -> Result<Option<FailureDetail>> {
        let key = fingerprint.failure_key();
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| RetryError::Decode { key, source })
    }

    pub async fn put_failure_detail(
        &self,
        fingerprint: &RetryFingerprint,
        detail: &FailureDetail,
    ) -> Result<()> {
        let encoded = serde_json::to_vec(detail)?;
        self.store.set(&fingerprint.failure_key(), &encoded).await
    }

    /// Removes the failure detail, then the counter. Missing keys are fine.
    pub async fn delete_state(&self, fingerprint: &RetryFingerprint) -> Result<()> {
        self.store.delete(&fingerprint.failure_key()).await?;
        self.store.delete(&fingerprint.counter_key()).await?;
        debug!(fingerprint = %fingerprint, "retry state deleted");
        Ok(())
    }

    pub async fn status(&self, job: &JobDescriptor) -> Result<RetryStatus> {
        let fingerprint = self.fingerprint(job);
        let attempts = self.get_attempts(&fingerprint).await?.unwrap_or(0);
        let failure = self.get_failure_detail(&fingerprint).await?;

        Ok(RetryStatus {
            job: job.clone(),
            fingerprint: fingerprint.to_string(),
            attempts,
            failure,
        })
    }
}
