// src/fingerprint.rs
//! Retry fingerprints and the key names derived from them.
//!
//! A fingerprint is `<prefix>:<class>:<sha1 hex of [class, args]>` with all
//! whitespace removed. The attempt counter lives at the fingerprint itself and
//! the failure detail at `failure-<fingerprint>`. Anything else reading or
//! writing retry state has to build the same strings, so they live here only.

use std::fmt;

use sha1::{Digest, Sha1};

use crate::job::JobDescriptor;
use crate::utils::constants::{DEFAULT_FINGERPRINT_PREFIX, FAILURE_KEY_PREFIX};

/// Content-addressed identity of a job occurrence's retry lineage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RetryFingerprint(String);

impl RetryFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the attempt counter.
    pub fn counter_key(&self) -> String {
        counter_key(&self.0)
    }

    /// Key of the failure detail record.
    pub fn failure_key(&self) -> String {
        failure_key(&self.0)
    }
}

impl fmt::Display for RetryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RetryFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn counter_key(fingerprint: &str) -> String {
    fingerprint.to_string()
}

pub fn failure_key(fingerprint: &str) -> String {
    format!("{FAILURE_KEY_PREFIX}{fingerprint}")
}

/// Derives fingerprints under a fixed first segment.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    prefix: String,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(DEFAULT_FINGERPRINT_PREFIX)
    }
}

impl Fingerprinter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn derive(&self, job: &JobDescriptor) -> RetryFingerprint {
        let digest = format!("{:x}", Sha1::digest(job.canonical_bytes()));
        let joined = [self.prefix.as_str(), job.class.as_str(), digest.as_str()].join(":");

        RetryFingerprint(joined.chars().filter(|c| !c.is_whitespace()).collect())
    }
}

/// Fingerprint under the default `retry` prefix.
pub fn derive(job: &JobDescriptor) -> RetryFingerprint {
    Fingerprinter::default().derive(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn send_email() -> JobDescriptor {
        JobDescriptor::new("SendEmail", vec![json!("a@example.com")])
    }

    #[test]
    fn fingerprint_has_prefix_class_and_sha1() {
        let fp = derive(&send_email());
        let parts: Vec<&str> = fp.as_str().split(':').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "retry");
        assert_eq!(parts[1], "SendEmail");
        assert_eq!(parts[2].len(), 40);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn digest_covers_class_and_args() {
        // sha1 of `["SendEmail",["a@example.com"]]`
        let expected = format!("{:x}", Sha1::digest(br#"["SendEmail",["a@example.com"]]"#));
        assert_eq!(derive(&send_email()).as_str(), format!("retry:SendEmail:{expected}"));
    }

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(derive(&send_email()), derive(&send_email()));
    }

    #[test]
    fn different_args_or_class_give_different_fingerprints() {
        let base = derive(&send_email());
        let other_args = derive(&JobDescriptor::new("SendEmail", vec![json!("b@example.com")]));
        let other_class = derive(&JobDescriptor::new("SendSms", vec![json!("a@example.com")]));
        let no_args = derive(&JobDescriptor::new("SendEmail", vec![]));

        assert_ne!(base, other_args);
        assert_ne!(base, other_class);
        assert_ne!(base, no_args);
    }

    #[test]
    fn empty_class_keeps_its_segment() {
        let digest = format!("{:x}", Sha1::digest(br#"["",[]]"#));
        let empty = derive(&JobDescriptor::new("", vec![]));
        assert_eq!(empty.as_str(), format!("retry::{digest}"));

        let blank = derive(&JobDescriptor::new(" ", vec![]));
        assert!(blank.as_str().starts_with("retry::"));
        assert_eq!(blank.as_str().split(':').count(), 3);
    }

    #[test]
    fn whitespace_is_stripped() {
        let fp = derive(&JobDescriptor::new("Send Email\t", vec![json!("x y")]));
        assert!(!fp.as_str().chars().any(char::is_whitespace));
        assert!(fp.as_str().starts_with("retry:SendEmail:"));
    }

    #[test]
    fn custom_prefix_and_keys() {
        let fp = Fingerprinter::new("resque-retry").derive(&send_email());
        assert!(fp.as_str().starts_with("resque-retry:SendEmail:"));
        assert_eq!(fp.counter_key(), fp.as_str());
        assert_eq!(fp.failure_key(), format!("failure-{fp}"));
    }
}
