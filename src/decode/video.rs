//! Video Format 0 payload decoding.
//!
//! The packet body is a train of fixed 188-byte MPEG-2 transport stream
//! units, each optionally preceded by an 8-byte embedded time word. Unlike
//! the message formats there is no unit count; the train ends when fewer
//! bytes than a full unit remain.

use serde::{Deserialize, Serialize};

use super::{le_u32, le_u64};
use crate::{Error, Result};

/// MPEG-2 transport stream unit size.
pub const TS_UNIT_LEN: usize = 188;

/// Channel specific data word for Video Format 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsdwVideo {
    pub raw: u32,
}

impl CsdwVideo {
    /// True when the stream is in transmission byte order already.
    #[must_use]
    pub fn byte_aligned(&self) -> bool {
        self.raw & (1 << 23) != 0
    }

    #[must_use]
    pub fn payload_type(&self) -> u8 {
        ((self.raw >> 24) & 0xf) as u8
    }

    /// KLV metadata present in the stream.
    #[must_use]
    pub fn klv(&self) -> bool {
        self.raw & (1 << 28) != 0
    }

    /// SCR/RTC synchronized.
    #[must_use]
    pub fn srs(&self) -> bool {
        self.raw & (1 << 29) != 0
    }

    #[must_use]
    pub fn intra_packet_header(&self) -> bool {
        self.raw & (1 << 30) != 0
    }

    /// Each transport stream unit is preceded by an 8-byte time word.
    #[must_use]
    pub fn embedded_time(&self) -> bool {
        self.raw & (1 << 31) != 0
    }
}

/// One 188-byte transport stream unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoUnit {
    /// Embedded relative time counter value, when the channel carries one
    pub time: Option<u64>,
    /// Transport stream bytes in transmission order
    pub data: Vec<u8>,
}

/// Decode the channel specific word and return a lazy unit iterator.
///
/// Units from a channel that is not byte aligned have the bytes of each
/// 16-bit word swapped back into transmission order before they are
/// yielded.
///
/// # Errors
/// [`Error::NotEnoughData`] if the payload is shorter than the channel
/// specific word.
pub fn units(payload: &[u8]) -> Result<UnitIter<'_>> {
    let Some(raw) = le_u32(payload, 0) else {
        return Err(Error::NotEnoughData {
            actual: payload.len(),
            minimum: 4,
        });
    };
    let csdw = CsdwVideo { raw };
    Ok(UnitIter {
        csdw,
        payload,
        offset: 4,
    })
}

/// Lazy iterator over the transport stream units of one Video packet.
pub struct UnitIter<'a> {
    csdw: CsdwVideo,
    payload: &'a [u8],
    offset: usize,
}

impl UnitIter<'_> {
    #[must_use]
    pub fn csdw(&self) -> CsdwVideo {
        self.csdw
    }
}

impl Iterator for UnitIter<'_> {
    type Item = VideoUnit;

    fn next(&mut self) -> Option<Self::Item> {
        let time = if self.csdw.embedded_time() {
            let t = le_u64(self.payload, self.offset)?;
            self.offset += 8;
            Some(t)
        } else {
            None
        };
        let unit = self.payload.get(self.offset..self.offset + TS_UNIT_LEN)?;
        self.offset += TS_UNIT_LEN;

        let data = if self.csdw.byte_aligned() {
            unit.to_vec()
        } else {
            let mut swapped = unit.to_vec();
            for pair in swapped.chunks_exact_mut(2) {
                pair.swap(0, 1);
            }
            swapped
        };
        Some(VideoUnit { time, data })
    }
}
