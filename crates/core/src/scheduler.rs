// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ScheduledJob and schedule variants, plus `next_run_at_ms` (spec §4.5.1).

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a scheduled job.
    pub struct JobId("job-");
}

/// How a scheduled job's trigger fires (spec §4.5.1). Field names are
/// camelCase at the `kind` tag's sibling level since `Schedule` is embedded
/// verbatim into `ScheduledJobDto`/the scheduler job store file (spec §6
/// "Scheduler file format") without its own wire mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Fires once at the given epoch-ms instant.
    At {
        #[serde(rename = "atMs")]
        at_ms: i64,
    },
    /// Fires every `every_ms`, anchored at `anchor_ms` (default 0).
    Every {
        #[serde(rename = "everyMs")]
        every_ms: i64,
        #[serde(default, rename = "anchorMs")]
        anchor_ms: i64,
    },
    /// Five-field cron expression `m h dom mon dow`, evaluated in UTC unless
    /// `tz` names another IANA zone (spec §9 open question: only UTC and the
    /// literal string `"UTC"` are currently honored; any other `tz` value is
    /// accepted but treated as UTC, which MUST be documented — done here).
    Cron {
        expr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tz: Option<String>,
    },
}

/// What a scheduled job does when it fires. Same camelCase-sibling-field
/// treatment as `Schedule`, for the same reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Enqueue a Run with this instruction.
    Run {
        instruction: String,
        #[serde(default, skip_serializing_if = "Option::is_none", rename = "agentId")]
        agent_id: Option<String>,
    },
    /// Publish an event onto the bus.
    Event { topic: String, payload: serde_json::Value },
}

/// Dynamic, frequently-mutated state tracked per job (spec §3 ScheduledJob).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub consecutive_errors: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub name: String,
    pub enabled: bool,
    pub schedule: Schedule,
    pub payload: JobPayload,
    #[serde(default)]
    pub delete_after_run: bool,
    #[serde(default)]
    pub state: JobState,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// A stale `runningAtMs` older than this is treated as crash residue and
/// cleared on boot/tick (spec §3 ScheduledJob invariant).
pub const STUCK_JOB_THRESHOLD_MS: i64 = 10 * 60 * 1000;

/// The timer never arms further out than this, to cope with sleep/wake skew
/// (spec §4.5).
pub const MAX_TIMER_DELAY_MS: i64 = 60_000;

impl ScheduledJob {
    /// Recompute `nextRunAtMs` for this job's schedule at `now_ms`. Disabled
    /// jobs clear it (spec §4.5.1).
    pub fn recompute_next_run(&mut self, now_ms: i64) -> bool {
        let next = if self.enabled { next_run_at_ms(&self.schedule, now_ms) } else { None };
        let changed = next != self.state.next_run_at_ms;
        self.state.next_run_at_ms = next;
        changed
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.enabled
            && self.state.running_at_ms.is_none()
            && self.state.next_run_at_ms.is_some_and(|t| t <= now_ms)
    }

    /// Clear a stale `runningAtMs` marker left by a crashed execution.
    pub fn clear_stale_running(&mut self, now_ms: i64) -> bool {
        if let Some(started) = self.state.running_at_ms {
            if now_ms - started > STUCK_JOB_THRESHOLD_MS {
                self.state.running_at_ms = None;
                return true;
            }
        }
        false
    }
}

/// Compute the next fire time strictly greater than `now`, or `None` if the
/// schedule can never fire again / is malformed (spec §4.5.1 table, §8
/// property 3, and the boundary behaviors in §8).
pub fn next_run_at_ms(schedule: &Schedule, now_ms: i64) -> Option<i64> {
    match schedule {
        Schedule::At { at_ms } => {
            if *at_ms > now_ms {
                Some(*at_ms)
            } else {
                None
            }
        }
        Schedule::Every { every_ms, anchor_ms } => {
            if *every_ms <= 0 {
                return None;
            }
            if *anchor_ms > now_ms {
                return Some(*anchor_ms);
            }
            let elapsed = now_ms - anchor_ms;
            let steps = elapsed.div_ceil(*every_ms);
            Some(anchor_ms + steps * every_ms)
        }
        Schedule::Cron { expr, .. } => next_cron_run(expr, now_ms),
    }
}

struct CronField {
    values: Vec<u32>,
}

impl CronField {
    fn matches(&self, v: u32) -> bool {
        self.values.contains(&v)
    }
}

/// Parse one of the five cron fields: `*`, `a`, `a-b`, `a,b,c`, `*/n`, `a-b/n`.
fn parse_field(raw: &str, min: u32, max: u32) -> Option<CronField> {
    let mut values = Vec::new();
    for part in raw.split(',') {
        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => (r, s.parse::<u32>().ok()?.max(1)),
            None => (part, 1),
        };
        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            (a.parse::<u32>().ok()?, b.parse::<u32>().ok()?)
        } else {
            let v = range_part.parse::<u32>().ok()?;
            (v, v)
        };
        if lo > hi || hi > max || lo < min {
            return None;
        }
        let mut v = lo;
        while v <= hi {
            values.push(v);
            v += step;
        }
    }
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    values.dedup();
    Some(CronField { values })
}

struct ParsedCron {
    minute: CronField,
    hour: CronField,
    dom: CronField,
    month: CronField,
    dow: CronField,
}

fn parse_cron(expr: &str) -> Option<ParsedCron> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return None;
    }
    Some(ParsedCron {
        minute: parse_field(fields[0], 0, 59)?,
        hour: parse_field(fields[1], 0, 23)?,
        dom: parse_field(fields[2], 1, 31)?,
        month: parse_field(fields[3], 1, 12)?,
        dow: parse_field(fields[4], 0, 6)?,
    })
}

/// Smallest epoch-ms strictly greater than `now_ms` satisfying all five
/// fields. Evaluated in UTC (spec §9 open question). Searches minute by
/// minute over a two-year horizon, which is more than enough for any
/// satisfiable expression and cheap since each tick is O(1).
fn next_cron_run(expr: &str, now_ms: i64) -> Option<i64> {
    let cron = parse_cron(expr)?;
    let now = Utc.timestamp_millis_opt(now_ms).single()?;
    let mut candidate = now.date_naive().and_hms_opt(now.hour(), now.minute(), 0)? + ChronoDuration::minutes(1);

    let horizon = now + ChronoDuration::days(366 * 2);
    while candidate <= horizon {
        let dt: DateTime<Utc> = Utc.from_utc_datetime(&candidate);
        let dow = dt.weekday().num_days_from_sunday();
        if cron.minute.matches(dt.minute())
            && cron.hour.matches(dt.hour())
            && cron.dom.matches(dt.day())
            && cron.month.matches(dt.month())
            && cron.dow.matches(dow)
        {
            return Some(dt.timestamp_millis());
        }
        candidate += ChronoDuration::minutes(1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_and_job_payload_serialize_with_camel_case_keys() {
        let schedule = Schedule::Every { every_ms: 500, anchor_ms: 1000 };
        let value = serde_json::to_value(&schedule).expect("serialize schedule");
        assert_eq!(value["everyMs"], 500);
        assert_eq!(value["anchorMs"], 1000);
        assert!(value.get("every_ms").is_none());
        assert!(value.get("anchor_ms").is_none());

        let payload = JobPayload::Run { instruction: "do it".into(), agent_id: Some("agent-1".into()) };
        let value = serde_json::to_value(&payload).expect("serialize payload");
        assert_eq!(value["agentId"], "agent-1");
        assert!(value.get("agent_id").is_none());
    }

    #[test]
    fn every_with_zero_interval_is_undefined() {
        assert_eq!(next_run_at_ms(&Schedule::Every { every_ms: 0, anchor_ms: 0 }, 100), None);
        assert_eq!(next_run_at_ms(&Schedule::Every { every_ms: -5, anchor_ms: 0 }, 100), None);
    }

    #[test]
    fn at_in_the_past_is_undefined() {
        assert_eq!(next_run_at_ms(&Schedule::At { at_ms: 100 }, 200), None);
    }

    #[test]
    fn every_anchor_500_at_1000() {
        // spec §8 scenario 2
        let s = Schedule::Every { every_ms: 500, anchor_ms: 1000 };
        assert_eq!(next_run_at_ms(&s, 1600), Some(2000));
        assert_eq!(next_run_at_ms(&s, 2001), Some(2500));
    }

    #[test]
    fn every_before_anchor_returns_anchor() {
        let s = Schedule::Every { every_ms: 1000, anchor_ms: 5000 };
        assert_eq!(next_run_at_ms(&s, 100), Some(5000));
    }

    #[test]
    fn cron_wrong_field_count_is_undefined() {
        assert_eq!(next_run_at_ms(&Schedule::Cron { expr: "* * *".into(), tz: None }, 0), None);
    }

    #[test]
    fn cron_every_fifteen_minutes() {
        // spec §8 scenario 3: next run minute after 10:00:00Z is :15
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).single().unwrap();
        let next = next_run_at_ms(&Schedule::Cron { expr: "*/15 * * * *".into(), tz: None }, now.timestamp_millis());
        let next_dt = Utc.timestamp_millis_opt(next.unwrap()).single().unwrap();
        assert_eq!(next_dt.minute(), 15);
        assert_eq!(next_dt.hour(), 10);
    }

    #[test]
    fn next_run_always_strictly_greater_than_now_except_at() {
        // spec §8 invariant 3
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 34, 0).single().unwrap().timestamp_millis();
        for s in [
            Schedule::Every { every_ms: 1000, anchor_ms: 0 },
            Schedule::Cron { expr: "0 * * * *".into(), tz: None },
        ] {
            let n = next_run_at_ms(&s, now).unwrap();
            assert!(n > now);
        }
    }

    #[test]
    fn recompute_clears_on_disable() {
        let mut job = ScheduledJob {
            id: JobId::new(),
            name: "j".into(),
            enabled: false,
            schedule: Schedule::Every { every_ms: 1000, anchor_ms: 0 },
            payload: JobPayload::Event { topic: "t".into(), payload: serde_json::Value::Null },
            delete_after_run: false,
            state: JobState { next_run_at_ms: Some(500), ..Default::default() },
            created_at_ms: 0,
            updated_at_ms: 0,
        };
        job.recompute_next_run(100);
        assert_eq!(job.state.next_run_at_ms, None);
    }

    #[test]
    fn stuck_job_threshold_clears_stale_running() {
        let mut job = ScheduledJob {
            id: JobId::new(),
            name: "j".into(),
            enabled: true,
            schedule: Schedule::Every { every_ms: 1000, anchor_ms: 0 },
            payload: JobPayload::Event { topic: "t".into(), payload: serde_json::Value::Null },
            delete_after_run: false,
            state: JobState { running_at_ms: Some(0), ..Default::default() },
            created_at_ms: 0,
            updated_at_ms: 0,
        };
        assert!(!job.clear_stale_running(STUCK_JOB_THRESHOLD_MS));
        assert!(job.clear_stale_running(STUCK_JOB_THRESHOLD_MS + 1));
        assert_eq!(job.state.running_at_ms, None);
    }
}
