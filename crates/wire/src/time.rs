// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epoch-ms <-> RFC3339 conversion (SPEC_FULL.md §3.1: "timestamps are
//! stored as epoch milliseconds internally ... and rendered as RFC3339
//! strings only at the wire boundary, never the reverse").

use chrono::{DateTime, Utc};

pub fn iso8601(epoch_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339()
}

pub fn iso8601_signed(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339()
}

pub fn iso8601_opt(epoch_ms: Option<i64>) -> Option<String> {
    epoch_ms.map(iso8601_signed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_chrono() {
        let s = iso8601(1_700_000_000_000);
        let parsed = DateTime::parse_from_rfc3339(&s).expect("valid rfc3339");
        assert_eq!(parsed.timestamp_millis(), 1_700_000_000_000);
    }
}
