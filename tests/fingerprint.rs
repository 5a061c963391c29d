use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::{json, Value};

use qrush_retry::{derive, Fingerprinter, JobDescriptor};

fn arb_arg() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        "[a-z@.]{0,12}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn arb_job() -> impl Strategy<Value = JobDescriptor> {
    ("[A-Z][A-Za-z]{0,10}", prop::collection::vec(arb_arg(), 0..4))
        .prop_map(|(class, args)| JobDescriptor::new(class, args))
}

proptest! {
    #[test]
    fn derive_is_deterministic(job in arb_job()) {
        prop_assert_eq!(derive(&job), derive(&job.clone()));
    }

    #[test]
    fn distinct_jobs_get_distinct_fingerprints(a in arb_job(), b in arb_job()) {
        prop_assume!(a != b);
        prop_assert_ne!(derive(&a), derive(&b));
    }

    #[test]
    fn fingerprint_shape(job in arb_job()) {
        let fp = derive(&job);
        let expected_prefix = format!("retry:{}:", job.class);
        prop_assert!(fp.as_str().starts_with(&expected_prefix));

        let digest = &fp.as_str()[expected_prefix.len()..];
        prop_assert_eq!(digest.len(), 40);
        prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        prop_assert_eq!(fp.failure_key(), format!("failure-{}", fp));
    }
}

#[test]
fn no_collisions_across_many_jobs() {
    let fingerprints: HashSet<String> = (0..5_000)
        .map(|i| derive(&JobDescriptor::new("SendEmail", vec![json!(format!("user{i}@example.com"))])))
        .map(|fp| fp.to_string())
        .collect();
    assert_eq!(fingerprints.len(), 5_000);
}

#[test]
fn arg_order_and_types_matter() {
    let a = derive(&JobDescriptor::new("Sync", vec![json!(1), json!(2)]));
    let b = derive(&JobDescriptor::new("Sync", vec![json!(2), json!(1)]));
    let c = derive(&JobDescriptor::new("Sync", vec![json!("1"), json!(2)]));
    assert_ne!(a, b);
    assert_ne!(a, c);
}

#[test]
fn prefix_only_changes_the_first_segment() {
    let job = JobDescriptor::new("SendEmail", vec![json!("a@example.com")]);
    let default = derive(&job);
    let legacy = Fingerprinter::new("resque-retry").derive(&job);

    assert_eq!(
        default.as_str().trim_start_matches("retry:"),
        legacy.as_str().trim_start_matches("resque-retry:")
    );
}
