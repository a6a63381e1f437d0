// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId;
}

#[test]
fn new_generates_a_v4_uuid() {
    let id = TestId::new();
    assert_eq!(id.as_str().len(), 36);
    assert_eq!(id.as_str().chars().filter(|c| *c == '-').count(), 4);
}

#[test]
fn new_generates_distinct_ids() {
    assert_ne!(TestId::new(), TestId::new());
}

#[test]
fn from_string_round_trips() {
    let id = TestId::from_string("fixed-value");
    assert_eq!(id.as_str(), "fixed-value");
    assert_eq!(id.to_string(), "fixed-value");
}

#[test]
fn hash_map_lookup_by_borrowed_str() {
    let mut map = HashMap::new();
    map.insert(TestId::from_string("k"), 42);
    assert_eq!(map.get("k"), Some(&42));
}

#[test]
fn equality_against_str_and_ref_str() {
    let id = TestId::from_string("abc");
    assert_eq!(id, *"abc");
    assert_eq!(id, "abc");
}

#[test]
fn default_is_a_fresh_random_id() {
    assert_ne!(TestId::default(), TestId::default());
}

#[test]
fn is_empty_reports_blank_ids() {
    assert!(TestId::from_string("").is_empty());
    assert!(!TestId::new().is_empty());
}
