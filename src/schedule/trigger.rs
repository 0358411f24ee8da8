//! Trigger instant arithmetic
//!
//! Daily-repeat wall-clock math only; no time zones, weekdays, or leap
//! handling. `now` is always passed in so callers and tests control the
//! clock.

use chrono::{Duration, NaiveDateTime, NaiveTime};

use super::time_parse::TimeOfDay;

/// Minutes between a primary alert and its follow-up
pub const FOLLOWUP_DELAY_MIN: u32 = 5;

/// Next absolute instant at which a daily reminder fires.
///
/// Today at the target time, unless that instant has already passed
/// (or is exactly now), in which case tomorrow. A reminder saved for a
/// time earlier in the day therefore fires tomorrow, not immediately.
pub fn next_occurrence(tod: TimeOfDay, now: NaiveDateTime) -> NaiveDateTime {
    // Ranges are enforced by parse/TimeOfDay::new
    let time = NaiveTime::from_hms_opt(tod.hour, tod.minute, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date().and_time(time);
    if today <= now {
        today + Duration::days(1)
    } else {
        today
    }
}

/// Wall-clock time of the follow-up alert paired with a primary at `tod`.
///
/// Minute overflow carries into the hour, and the hour wraps past
/// midnight (23:58 becomes 00:03 on the next implicit day).
pub fn followup_time(tod: TimeOfDay) -> TimeOfDay {
    let minute = tod.minute + FOLLOWUP_DELAY_MIN;
    TimeOfDay {
        hour: (tod.hour + minute / 60) % 24,
        minute: minute % 60,
    }
}

/// Absolute instant for a postponed one-shot alert: now plus the
/// standard follow-up delay.
pub fn postpone_target(now: NaiveDateTime) -> NaiveDateTime {
    now + Duration::minutes(FOLLOWUP_DELAY_MIN as i64)
}
