use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TimestampError;

/// Offset from the start of a transcript, in whole milliseconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

/// The three clock-time shapes found in cached TTML files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEncoding {
    /// `HH:MM:SS.mmm`
    HoursMinutesSeconds,
    /// `MM:SS.mmm`
    MinutesSeconds,
    /// `SS.mmm`
    Seconds,
}

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * MS_PER_SECOND)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MS_PER_SECOND as f64
    }

    /// Signed distance from `earlier` to `self`. Negative when the spans
    /// overlap; saturates at the `i64` range.
    pub fn millis_since(self, earlier: Timestamp) -> i64 {
        if self.0 >= earlier.0 {
            i64::try_from(self.0 - earlier.0).unwrap_or(i64::MAX)
        } else {
            i64::try_from(earlier.0 - self.0).map_or(i64::MIN, |d| -d)
        }
    }

    /// Decode a clock-time string. Hours and minutes are optional; the
    /// fractional part may have any number of digits and is truncated to
    /// milliseconds.
    pub fn parse(input: &str) -> Result<Self, TimestampError> {
        Self::parse_with_encoding(input).map(|(ts, _)| ts)
    }

    /// Like [`Timestamp::parse`], also reporting which shape the input used.
    pub fn parse_with_encoding(input: &str) -> Result<(Self, ClockEncoding), TimestampError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TimestampError::Empty);
        }
        let malformed = || TimestampError::Malformed(trimmed.to_string());

        let parts: Vec<&str> = trimmed.split(':').collect();
        let (hours, minutes, seconds, encoding) = match parts.as_slice() {
            [h, m, s] => (
                parse_whole(h).ok_or_else(malformed)?,
                parse_whole(m).ok_or_else(malformed)?,
                *s,
                ClockEncoding::HoursMinutesSeconds,
            ),
            [m, s] => (
                0,
                parse_whole(m).ok_or_else(malformed)?,
                *s,
                ClockEncoding::MinutesSeconds,
            ),
            [s] => (0, 0, *s, ClockEncoding::Seconds),
            _ => return Err(malformed()),
        };
        let seconds_ms = parse_seconds(seconds).ok_or_else(malformed)?;

        let total = hours
            .checked_mul(MS_PER_HOUR)
            .and_then(|h| minutes.checked_mul(MS_PER_MINUTE).and_then(|m| h.checked_add(m)))
            .and_then(|hm| hm.checked_add(seconds_ms))
            .ok_or_else(malformed)?;

        Ok((Self(total), encoding))
    }

    pub fn format(self, encoding: ClockEncoding) -> String {
        let ms = self.0 % MS_PER_SECOND;
        let total_secs = self.0 / MS_PER_SECOND;
        match encoding {
            ClockEncoding::HoursMinutesSeconds => format!(
                "{:02}:{:02}:{:02}.{:03}",
                total_secs / 3600,
                (total_secs / 60) % 60,
                total_secs % 60,
                ms
            ),
            ClockEncoding::MinutesSeconds => {
                format!("{:02}:{:02}.{:03}", total_secs / 60, total_secs % 60, ms)
            }
            ClockEncoding::Seconds => format!("{}.{:03}", total_secs, ms),
        }
    }

    /// `HH:MM:SS` with the fraction dropped, for display.
    pub fn clock(self) -> String {
        let total_secs = self.0 / MS_PER_SECOND;
        format!(
            "{:02}:{:02}:{:02}",
            total_secs / 3600,
            (total_secs / 60) % 60,
            total_secs % 60
        )
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format(ClockEncoding::HoursMinutesSeconds))
    }
}

fn parse_whole(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `SS` or `SS.fff` into milliseconds.
fn parse_seconds(s: &str) -> Option<u64> {
    let (whole, fraction) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    let whole = parse_whole(whole)?;
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis = fraction
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(3)
        .fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'));
    whole.checked_mul(MS_PER_SECOND)?.checked_add(millis)
}
