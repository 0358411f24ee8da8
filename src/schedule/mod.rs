//! Schedule calculation
//!
//! Pure time arithmetic for reminders: parsing user-entered reminder
//! times and computing trigger instants.

mod time_parse;
mod trigger;

pub use time_parse::{parse_time_str, ParseError, TimeOfDay};
pub use trigger::{followup_time, next_occurrence, postpone_target, FOLLOWUP_DELAY_MIN};
