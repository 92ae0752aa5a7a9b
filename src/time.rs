//! Relative-to-absolute time mapping.
//!
//! Every packet header carries a free-running 10 MHz relative time counter.
//! A [`TimeRef`] pairs one counter sample with the absolute time decoded
//! from a Time packet; any other counter value maps to absolute time by
//! offsetting from that anchor.

use std::io::{Read, Seek};

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decode::time_f1::TimeF1;
use crate::packet::{Ch10Reader, DataType};
use crate::{Error, Result};

/// Relative time counter rate, 100 ns ticks.
pub const RTC_TICKS_PER_SEC: u64 = 10_000_000;

/// Calendar form an absolute time was decoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    /// Day of year, no year information in the source
    DayOfYear,
    /// Full day, month and year
    DayMonthYear,
}

/// An absolute time: seconds since the Unix epoch plus a sub-second count
/// of 100 ns ticks in `[0, 10^7)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrigTime {
    pub secs: i64,
    /// 100 ns ticks into the second
    pub fracs: u32,
    pub format: DateFormat,
}

impl IrigTime {
    #[must_use]
    pub fn new(secs: i64, fracs: u32, format: DateFormat) -> Self {
        IrigTime {
            secs,
            fracs,
            format,
        }
    }

    /// Microseconds into the second. Truncates the odd 100 ns tick.
    #[must_use]
    pub fn micros(&self) -> u32 {
        self.fracs / 10
    }

    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.secs, self.fracs * 100)
    }
}

impl std::fmt::Display for IrigTime {
    /// Day-of-year times render as `DDD:HH:MM:SS.ffffff`, day-month-year
    /// times as `YYYY/MM/DD HH:MM:SS.ffffff`. Fractions are microseconds.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(dt) = self.to_datetime() else {
            return write!(f, "invalid time {}.{:07}", self.secs, self.fracs);
        };
        match self.format {
            DateFormat::DayOfYear => write!(
                f,
                "{:03}:{:02}:{:02}:{:02}.{:06}",
                dt.ordinal(),
                dt.hour(),
                dt.minute(),
                dt.second(),
                self.micros(),
            ),
            DateFormat::DayMonthYear => write!(
                f,
                "{:04}/{:02}/{:02} {:02}:{:02}:{:02}.{:06}",
                dt.year(),
                dt.month(),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second(),
                self.micros(),
            ),
        }
    }
}

/// Anchor mapping the relative time counter to absolute time.
///
/// Construct one with [`TimeRef::sync_time`] against a stream, or
/// [`TimeRef::set_relative_time`] when the pairing is known out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRef {
    ref_rel: u64,
    ref_time: IrigTime,
}

impl TimeRef {
    /// Anchor directly from a known counter/absolute-time pair.
    #[must_use]
    pub fn set_relative_time(rel_time: u64, time: IrigTime) -> Self {
        TimeRef {
            ref_rel: rel_time,
            ref_time: time,
        }
    }

    /// Scan forward from the current position for a Time packet and anchor
    /// on it, then restore the stream position. The scan gives up once the
    /// relative time counter has advanced `limit_secs` past the first
    /// header seen (`0` scans the whole stream), or at end of stream.
    ///
    /// With `require_external_sync` only Time packets whose clock source
    /// is external are accepted.
    ///
    /// # Errors
    /// [`Error::TimeNotFound`] if no acceptable Time packet is found within
    /// the limit. The position is restored in that case too.
    pub fn sync_time<R>(
        reader: &mut Ch10Reader<R>,
        require_external_sync: bool,
        limit_secs: u32,
    ) -> Result<Self>
    where
        R: Read + Seek,
    {
        let saved = reader.get_pos();
        let result = Self::scan_for_time(reader, require_external_sync, limit_secs);
        reader.set_pos(saved)?;
        result
    }

    fn scan_for_time<R>(
        reader: &mut Ch10Reader<R>,
        require_external_sync: bool,
        limit_secs: u32,
    ) -> Result<Self>
    where
        R: Read + Seek,
    {
        let mut limit_rel: Option<u64> = None;
        loop {
            let header = match reader.read_next_header() {
                Ok(Some(header)) => *header,
                Ok(None) => return Err(Error::TimeNotFound),
                // corrupt packets do not end the scan
                Err(Error::HeaderChecksum { .. }) => continue,
                Err(err) => return Err(err),
            };
            if limit_secs > 0 {
                let limit = *limit_rel
                    .get_or_insert(header.rel_time() + u64::from(limit_secs) * RTC_TICKS_PER_SEC);
                if header.rel_time() > limit {
                    return Err(Error::TimeNotFound);
                }
            }
            if header.data_type != DataType::IRIG_TIME {
                continue;
            }
            let payload = reader.read_data()?;
            let time = match TimeF1::decode(payload) {
                Ok(time) => time,
                // a malformed time packet does not end the scan either
                Err(err) => {
                    debug!(
                        channel_id = header.channel_id,
                        %err,
                        "skipping undecodable time packet"
                    );
                    continue;
                }
            };
            if require_external_sync && !time.csdw.is_external() {
                debug!(
                    channel_id = header.channel_id,
                    source = time.csdw.source(),
                    "skipping time packet with internal clock source"
                );
                continue;
            }
            debug!(
                channel_id = header.channel_id,
                rel_time = header.rel_time(),
                time = %time.time,
                "time reference acquired"
            );
            return Ok(TimeRef {
                ref_rel: header.rel_time(),
                ref_time: time.time,
            });
        }
    }

    /// Re-anchor on the reader's current packet if it is a Time packet
    /// whose payload has been read; otherwise do nothing. Long recordings
    /// call this while walking to keep the anchor close and immune to
    /// counter drift.
    ///
    /// # Errors
    /// [`Error::InvalidData`] or [`Error::NotEnoughData`] if the current
    /// Time packet body does not decode.
    pub fn update_from_packet<R>(&mut self, reader: &Ch10Reader<R>) -> Result<()>
    where
        R: Read + Seek,
    {
        let Some(header) = reader.header() else {
            return Ok(());
        };
        if header.data_type != DataType::IRIG_TIME || reader.payload().is_empty() {
            return Ok(());
        }
        let time = TimeF1::decode(reader.payload())?;
        self.ref_rel = header.rel_time();
        self.ref_time = time.time;
        Ok(())
    }

    /// The anchored counter value.
    #[must_use]
    pub fn rel_time(&self) -> u64 {
        self.ref_rel
    }

    /// The anchored absolute time.
    #[must_use]
    pub fn time(&self) -> IrigTime {
        self.ref_time
    }

    /// Map a relative time counter value to absolute time by signed offset
    /// from the anchor. Values before the anchor map to earlier times.
    #[must_use]
    pub fn rel_to_irig(&self, rel: u64) -> IrigTime {
        // wrapping_sub keeps the math valid when rel < ref_rel
        let diff = rel.wrapping_sub(self.ref_rel) as i64;
        let mut secs = self.ref_time.secs + diff.div_euclid(RTC_TICKS_PER_SEC as i64);
        let mut fracs =
            i64::from(self.ref_time.fracs) + diff.rem_euclid(RTC_TICKS_PER_SEC as i64);
        while fracs < 0 {
            fracs += RTC_TICKS_PER_SEC as i64;
            secs -= 1;
        }
        while fracs >= RTC_TICKS_PER_SEC as i64 {
            fracs -= RTC_TICKS_PER_SEC as i64;
            secs += 1;
        }
        IrigTime {
            secs,
            fracs: fracs as u32,
            format: self.ref_time.format,
        }
    }

    /// Map a 6-byte header counter field to absolute time.
    #[must_use]
    pub fn rel6_to_irig(&self, rel: [u8; 6]) -> IrigTime {
        let r = u64::from_le_bytes([rel[0], rel[1], rel[2], rel[3], rel[4], rel[5], 0, 0]);
        self.rel_to_irig(r)
    }
}
