// src/job.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One scheduled occurrence of a background job: class name plus ordered args.
///
/// Matches the `{"class": .., "args": [..]}` shape the delayed scheduler stores.
/// Extra fields in a stored entry (such as `queue`) are ignored on decode.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub class: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl JobDescriptor {
    pub fn new(class: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            class: class.into(),
            args,
        }
    }

    /// Stable byte form `[class, args]` used for hashing.
    ///
    /// Object keys inside args come out sorted, so equal descriptors always
    /// produce equal bytes regardless of how they were built.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // A (String, Vec<Value>) tuple cannot fail to serialize.
        serde_json::to_vec(&(&self.class, &self.args)).unwrap_or_default()
    }

    /// Same class and same args, which is how the scheduler matches entries.
    pub fn matches(&self, class: &str, args: &[Value]) -> bool {
        self.class == class && self.args.as_slice() == args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_bytes_is_class_then_args() {
        let job = JobDescriptor::new("SendEmail", vec![json!("a@example.com")]);
        assert_eq!(job.canonical_bytes(), br#"["SendEmail",["a@example.com"]]"#.to_vec());
    }

    #[test]
    fn canonical_bytes_ignores_object_key_order() {
        let a: JobDescriptor =
            serde_json::from_str(r#"{"class":"Sync","args":[{"b":1,"a":2}]}"#).unwrap();
        let b: JobDescriptor =
            serde_json::from_str(r#"{"class":"Sync","args":[{"a":2,"b":1}]}"#).unwrap();
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn decodes_scheduler_entry_with_queue() {
        let job: JobDescriptor =
            serde_json::from_str(r#"{"class":"SendEmail","args":[1,"x"],"queue":"mail"}"#)
                .unwrap();
        assert!(job.matches("SendEmail", &[json!(1), json!("x")]));
        assert!(!job.matches("SendEmail", &[json!("x"), json!(1)]));
    }
}
