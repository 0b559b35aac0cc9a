//! Timestamp helpers, command envelopes and the weekly digest window.

use chrono::{DateTime, Datelike, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Storage format for every persisted timestamp. Lexicographic order is chronological.
pub const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current UTC time in storage format (e.g. `2025-01-06T09:30:00.000Z`).
pub fn now_rfc3339() -> String {
    to_storage(&Utc::now())
}

pub fn to_storage<T: TimeZone>(dt: &DateTime<T>) -> String {
    dt.with_timezone(&Utc).format(STORAGE_FORMAT).to_string()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_rfc3339(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}

/// Resolve a local wall-clock time in `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// DST gap move forward to the first valid minute.
pub fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = naive;
    for _ in 0..=180 {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => candidate += Duration::minutes(1),
        }
    }
    tz.from_utc_datetime(&naive)
}

/// Inclusive `[start, end]` reporting window of one weekly digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekWindow {
    /// Monday 00:00:00.000 local time of the current week.
    pub start: DateTime<FixedOffset>,
    /// "Today" 23:59:59.999 local time.
    pub end: DateTime<FixedOffset>,
}

impl WeekWindow {
    /// Window for the week containing `now`, evaluated in `now`'s timezone.
    pub fn containing(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let days_back = i64::from(now.weekday().num_days_from_monday());
        let monday = today - Duration::days(days_back);
        let start = resolve_local(&tz, monday.and_time(chrono::NaiveTime::MIN));
        let end_naive = today
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap_or_else(|| today.and_time(chrono::NaiveTime::MIN));
        let end = resolve_local(&tz, end_naive);
        Self {
            start: start.fixed_offset(),
            end: end.fixed_offset(),
        }
    }

    pub fn start_utc(&self) -> String {
        to_storage(&self.start)
    }

    pub fn end_utc(&self) -> String {
        to_storage(&self.end)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }

    /// Whether a stored timestamp lies inside the window (bounds inclusive).
    pub fn contains_stored(&self, ts: &str) -> bool {
        match parse_stored(ts) {
            Some(dt) => {
                dt >= self.start.with_timezone(&Utc) && dt <= self.end.with_timezone(&Utc)
            }
            None => false,
        }
    }
}

/// Parse a stored timestamp; accepts any RFC 3339 offset.
pub fn parse_stored(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
