//! Reminder time parsing
//!
//! Accepts user-entered times in 24-hour ("8:30", "08:30") or 12-hour
//! ("8:30 AM", "08:30 p.m.") form. Everything except digits, the colon,
//! and meridian letters is stripped before parsing, so "08:30 hrs." and
//! "8:30AM " both work.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from reminder time parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("time must look like HH:MM or HH:MM AM/PM, got '{0}'")]
    Malformed(String),

    #[error("hour {0} is out of range")]
    HourOutOfRange(u32),

    #[error("minute {0} is out of range")]
    MinuteOutOfRange(u32),
}

/// A wall-clock time of day in 24-hour form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    /// Construct a validated time of day
    pub fn new(hour: u32, minute: u32) -> Result<Self, ParseError> {
        if hour > 23 {
            return Err(ParseError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(ParseError::MinuteOutOfRange(minute));
        }
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for TimeOfDay {
    /// Normalized 24-hour "HH:MM" form, the storage format
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridian {
    Am,
    Pm,
}

/// Parse a reminder time string into a 24-hour `TimeOfDay`
pub fn parse_time_str(input: &str) -> Result<TimeOfDay, ParseError> {
    let cleaned: String = input
        .chars()
        .filter(|c| {
            c.is_ascii_digit() || *c == ':' || matches!(c.to_ascii_lowercase(), 'a' | 'p' | 'm')
        })
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let (digits, meridian) = if let Some(rest) = cleaned.strip_suffix("am") {
        (rest, Some(Meridian::Am))
    } else if let Some(rest) = cleaned.strip_suffix("pm") {
        (rest, Some(Meridian::Pm))
    } else {
        (cleaned.as_str(), None)
    };

    let malformed = || ParseError::Malformed(input.trim().to_string());

    let mut parts = digits.split(':');
    let hour_part = parts.next().ok_or_else(malformed)?;
    let minute_part = parts.next().ok_or_else(malformed)?;
    if parts.next().is_some() {
        return Err(malformed());
    }

    if hour_part.is_empty() || hour_part.len() > 2 || minute_part.is_empty() || minute_part.len() > 2
    {
        return Err(malformed());
    }

    let hour: u32 = hour_part.parse().map_err(|_| malformed())?;
    let minute: u32 = minute_part.parse().map_err(|_| malformed())?;

    let hour = match meridian {
        None => {
            if hour > 23 {
                return Err(ParseError::HourOutOfRange(hour));
            }
            hour
        }
        Some(m) => {
            if hour < 1 || hour > 12 {
                return Err(ParseError::HourOutOfRange(hour));
            }
            match (m, hour) {
                (Meridian::Am, 12) => 0,
                (Meridian::Am, h) => h,
                (Meridian::Pm, 12) => 12,
                (Meridian::Pm, h) => h + 12,
            }
        }
    };

    if minute > 59 {
        return Err(ParseError::MinuteOutOfRange(minute));
    }

    Ok(TimeOfDay { hour, minute })
}
