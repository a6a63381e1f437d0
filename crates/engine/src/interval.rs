// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parses the `every`/`jitter` interval grammar: a numeric prefix with a
//! `s/m/h/d/w` suffix, or a named alias (`hourly`, `daily`, `weekly`,
//! `monthly`).

use std::time::Duration;

pub fn parse_interval(spec: &str) -> Option<Duration> {
    match spec {
        "hourly" => return Some(Duration::from_secs(60 * 60)),
        "daily" => return Some(Duration::from_secs(24 * 60 * 60)),
        "weekly" => return Some(Duration::from_secs(7 * 24 * 60 * 60)),
        "monthly" => return Some(Duration::from_secs(30 * 24 * 60 * 60)),
        _ => {}
    }

    let split_at = spec.len().checked_sub(1)?;
    let (digits, suffix) = spec.split_at(split_at);
    let n: u64 = digits.parse().ok()?;
    let secs = match suffix {
        "s" => n,
        "m" => n * 60,
        "h" => n * 60 * 60,
        "d" => n * 24 * 60 * 60,
        "w" => n * 7 * 24 * 60 * 60,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
#[path = "interval_tests.rs"]
mod tests;
