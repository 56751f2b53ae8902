//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check fingerprint determinism and prefix addressing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use crate::cache::{Entity, Filters, Fingerprint};

// == Strategies ==
fn filter_key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,15}"
}

/// Filter values, including absent ones
fn filter_value_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-zA-Z0-9 &=?/%]{0,24}")
}

fn filter_fields_strategy() -> impl Strategy<Value = Vec<(String, Option<String>)>> {
    prop::collection::vec((filter_key_strategy(), filter_value_strategy()), 0..8)
}

fn entity_strategy() -> impl Strategy<Value = Entity> {
    prop_oneof![
        Just(Entity::Features),
        Just(Entity::Notifications),
        Just(Entity::Panels),
        Just(Entity::Sessions),
    ]
}

/// Keeps the last value per key, as a map insert would.
fn dedup_last(fields: &[(String, Option<String>)]) -> Vec<(String, Option<String>)> {
    let mut out: Vec<(String, Option<String>)> = Vec::new();
    for (key, value) in fields {
        out.retain(|(k, _)| k != key);
        out.push((key.clone(), value.clone()));
    }
    out
}

fn build_filters(fields: &[(String, Option<String>)]) -> Filters {
    let mut filters = Filters::new();
    for (key, value) in fields {
        filters.insert(key.clone(), value.clone());
    }
    filters
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Insertion order never changes the fingerprint.
    #[test]
    fn prop_fingerprint_ignores_key_order(
        entity in entity_strategy(),
        fields in filter_fields_strategy(),
    ) {
        let fields = dedup_last(&fields);
        let mut reversed = fields.clone();
        reversed.reverse();

        let forward = Fingerprint::list(entity, &build_filters(&fields));
        let backward = Fingerprint::list(entity, &build_filters(&reversed));
        prop_assert_eq!(forward, backward);
    }

    // Null or omitted JSON fields produce the same fingerprint.
    #[test]
    fn prop_absent_fields_normalize_identically(
        entity in entity_strategy(),
        fields in filter_fields_strategy(),
    ) {
        let fields = dedup_last(&fields);
        let mut with_nulls = Map::new();
        let mut without_nulls = Map::new();
        for (key, value) in &fields {
            match value {
                Some(v) => {
                    with_nulls.insert(key.clone(), Value::String(v.clone()));
                    without_nulls.insert(key.clone(), Value::String(v.clone()));
                }
                None => {
                    with_nulls.insert(key.clone(), Value::Null);
                }
            }
        }

        let a = Filters::from_json(&Value::Object(with_nulls)).unwrap();
        let b = Filters::from_json(&Value::Object(without_nulls)).unwrap();
        prop_assert_eq!(Fingerprint::list(entity, &a), Fingerprint::list(entity, &b));
    }

    // Different normalized filter sets never collide.
    #[test]
    fn prop_distinct_filters_distinct_fingerprints(
        entity in entity_strategy(),
        a in filter_fields_strategy(),
        b in filter_fields_strategy(),
    ) {
        let fa = build_filters(&dedup_last(&a));
        let fb = build_filters(&dedup_last(&b));
        let same_key = Fingerprint::list(entity, &fa) == Fingerprint::list(entity, &fb);
        prop_assert_eq!(same_key, fa == fb);
    }

    // Namespace prefixes address only their own entity.
    #[test]
    fn prop_namespace_prefix_isolated(
        entity in entity_strategy(),
        other in entity_strategy(),
        fields in filter_fields_strategy(),
        id in "[a-z0-9]{1,8}",
    ) {
        let prefix = format!("{}/", entity.namespace());
        let list = Fingerprint::list(other, &build_filters(&dedup_last(&fields)));
        let detail = Fingerprint::detail(other, &id);
        prop_assert_eq!(list.matches_prefix(&prefix), entity == other);
        prop_assert_eq!(detail.matches_prefix(&prefix), entity == other);
    }

    // A detail prefix never matches a longer sibling id.
    #[test]
    fn prop_detail_prefix_respects_segment(id in "[0-9]{1,6}", suffix in "[0-9]{1,3}") {
        let prefix = Fingerprint::detail(Entity::Notifications, &id);
        let sibling = Fingerprint::detail(Entity::Notifications, &format!("{id}{suffix}"));
        prop_assert!(prefix.matches_prefix(prefix.as_str()));
        prop_assert!(!sibling.matches_prefix(prefix.as_str()));
    }
}
