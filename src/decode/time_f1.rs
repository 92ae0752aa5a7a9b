//! Time Format 1 payload decoding.
//!
//! Time packets pair the relative time counter in their own header with an
//! absolute BCD time in the body. [`crate::time::TimeRef::sync_time`] uses
//! them to anchor the counter.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{le_u16, le_u32};
use crate::time::{DateFormat, IrigTime};
use crate::{Error, Result};

/// Channel specific data word for Time Format 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsdwTime {
    pub raw: u32,
}

impl CsdwTime {
    /// Time source field; 1 is an external clock.
    #[must_use]
    pub fn source(&self) -> u8 {
        (self.raw & 0xf) as u8
    }

    #[must_use]
    pub fn is_external(&self) -> bool {
        self.source() == 1
    }

    /// Encoded time format (IRIG-B, GPS, ...).
    #[must_use]
    pub fn time_format(&self) -> u8 {
        ((self.raw >> 4) & 0xf) as u8
    }

    /// Set when the current year is a leap year; governs day-of-year
    /// conversion, which carries no year of its own.
    #[must_use]
    pub fn leap_year(&self) -> bool {
        self.raw & (1 << 8) != 0
    }

    /// True for day-month-year bodies, false for day-of-year.
    #[must_use]
    pub fn is_dmy(&self) -> bool {
        self.raw & (1 << 9) != 0
    }
}

/// A decoded Time Format 1 packet body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeF1 {
    pub csdw: CsdwTime,
    pub time: IrigTime,
}

impl TimeF1 {
    /// Decode a Time Format 1 packet body.
    ///
    /// Day-of-year bodies carry no year, so they are placed in a reference
    /// year chosen purely for its leap shape: 1972 when the leap year flag
    /// is set, 1971 otherwise. Callers needing calendar dates should record
    /// with day-month-year time packets.
    ///
    /// # Errors
    /// [`Error::NotEnoughData`] for a truncated body, [`Error::InvalidData`]
    /// if the BCD fields do not form a valid time of day.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let Some(raw) = le_u32(payload, 0) else {
            return Err(Error::NotEnoughData {
                actual: payload.len(),
                minimum: 4,
            });
        };
        let csdw = CsdwTime { raw };
        let word_count = if csdw.is_dmy() { 4 } else { 3 };
        let minimum = 4 + 2 * word_count;
        let mut words = [0u16; 4];
        for (i, w) in words.iter_mut().enumerate().take(word_count) {
            *w = le_u16(payload, 4 + 2 * i).ok_or(Error::NotEnoughData {
                actual: payload.len(),
                minimum,
            })?;
        }

        // word 0: milliseconds and seconds
        let tmn = u32::from(words[0] & 0xf); // tens of ms
        let hmn = u32::from((words[0] >> 4) & 0xf); // hundreds of ms
        let sec = u32::from((words[0] >> 8) & 0xf) + 10 * u32::from((words[0] >> 12) & 0x7);
        // word 1: minutes and hours
        let min = u32::from(words[1] & 0xf) + 10 * u32::from((words[1] >> 4) & 0x7);
        let hour = u32::from((words[1] >> 8) & 0xf) + 10 * u32::from((words[1] >> 12) & 0x3);
        // 100 ns ticks into the second
        let fracs = hmn * 1_000_000 + tmn * 100_000;

        let invalid = || {
            Error::InvalidData(format!(
                "time packet BCD fields out of range: {words:04x?}"
            ))
        };

        let (date, format) = if csdw.is_dmy() {
            let day = u32::from(words[2] & 0xf) + 10 * u32::from((words[2] >> 4) & 0xf);
            let month = u32::from((words[2] >> 8) & 0xf) + 10 * u32::from((words[2] >> 12) & 0x1);
            let year = i32::from(words[3] & 0xf)
                + 10 * i32::from((words[3] >> 4) & 0xf)
                + 100 * i32::from((words[3] >> 8) & 0xf)
                + 1000 * i32::from((words[3] >> 12) & 0xf);
            (
                NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?,
                DateFormat::DayMonthYear,
            )
        } else {
            let day = u32::from(words[2] & 0xf)
                + 10 * u32::from((words[2] >> 4) & 0xf)
                + 100 * u32::from((words[2] >> 8) & 0x3);
            let year = if csdw.leap_year() { 1972 } else { 1971 };
            (
                NaiveDate::from_yo_opt(year, day.max(1)).ok_or_else(invalid)?,
                DateFormat::DayOfYear,
            )
        };
        let datetime = date.and_hms_opt(hour, min, sec).ok_or_else(invalid)?;

        Ok(TimeF1 {
            csdw,
            time: IrigTime::new(datetime.and_utc().timestamp(), fracs, format),
        })
    }
}
