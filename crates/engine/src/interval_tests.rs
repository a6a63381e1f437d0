// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

#[test]
fn suffixed_intervals_parse_to_seconds() {
    assert_eq!(parse_interval("30s"), Some(Duration::from_secs(30)));
    assert_eq!(parse_interval("5m"), Some(Duration::from_secs(300)));
    assert_eq!(parse_interval("2h"), Some(Duration::from_secs(7200)));
    assert_eq!(parse_interval("1d"), Some(Duration::from_secs(86_400)));
    assert_eq!(parse_interval("1w"), Some(Duration::from_secs(604_800)));
}

#[test]
fn named_aliases_resolve() {
    assert_eq!(parse_interval("hourly"), Some(Duration::from_secs(3_600)));
    assert_eq!(parse_interval("daily"), Some(Duration::from_secs(86_400)));
    assert_eq!(parse_interval("weekly"), Some(Duration::from_secs(604_800)));
    assert_eq!(parse_interval("monthly"), Some(Duration::from_secs(2_592_000)));
}

#[test]
fn malformed_intervals_are_rejected() {
    assert_eq!(parse_interval(""), None);
    assert_eq!(parse_interval("s"), None);
    assert_eq!(parse_interval("5"), None);
    assert_eq!(parse_interval("5x"), None);
    assert_eq!(parse_interval("five minutes"), None);
}
