//! Ethernet Format 0 payload decoding.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::{le_u32, le_u64, swap16};
use crate::{Error, Result};

/// Intra-packet header size: 8 byte time plus a packed 32-bit frame word.
const IPH_LEN: usize = 12;

/// Ethernet frame layout: destination MAC, source MAC, type/length.
const MAC_LEN: usize = 6;
const FRAME_HEADER_LEN: usize = 2 * MAC_LEN + 2;

/// Channel specific data word for Ethernet Format 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsdwEthernet {
    pub raw: u32,
}

impl CsdwEthernet {
    /// Number of frames in the packet body.
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.raw & 0xffff
    }

    /// Time tag bits field.
    #[must_use]
    pub fn ttb(&self) -> u8 {
        ((self.raw >> 25) & 0x7) as u8
    }

    #[must_use]
    pub fn format(&self) -> u8 {
        ((self.raw >> 28) & 0xf) as u8
    }
}

/// Six-byte MAC address, rendered `aa:bb:cc:dd:ee:ff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The address as a big-endian integer, handy as a compact map key.
    #[must_use]
    pub fn to_u64(self) -> u64 {
        let m = self.0;
        u64::from_be_bytes([0, 0, m[0], m[1], m[2], m[3], m[4], m[5]])
    }
}

impl Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// One captured Ethernet frame with its intra-packet header fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetFrame {
    /// Intra-packet relative time counter value
    pub time: u64,
    pub length_error: bool,
    pub data_crc_error: bool,
    pub frame_error: bool,
    pub frame_crc_error: bool,
    pub network_id: u8,
    pub speed: u8,
    pub content: u8,
    pub dst: MacAddr,
    pub src: MacAddr,
    /// EtherType or length field, already byte swapped to host meaning
    pub type_len: u16,
    /// Frame bytes after the 14-byte frame header
    pub data: Vec<u8>,
}

impl EthernetFrame {
    #[must_use]
    pub fn suspect(&self) -> bool {
        self.length_error || self.data_crc_error || self.frame_error || self.frame_crc_error
    }
}

/// Decode the channel specific word and return a lazy frame iterator.
///
/// # Errors
/// [`Error::NotEnoughData`] if the payload is shorter than the channel
/// specific word.
pub fn frames(payload: &[u8]) -> Result<FrameIter<'_>> {
    let Some(raw) = le_u32(payload, 0) else {
        return Err(Error::NotEnoughData {
            actual: payload.len(),
            minimum: 4,
        });
    };
    let csdw = CsdwEthernet { raw };
    Ok(FrameIter {
        csdw,
        payload,
        offset: 4,
        remaining: csdw.frame_count(),
        failed: false,
    })
}

/// Lazy iterator over the frames of one Ethernet packet.
pub struct FrameIter<'a> {
    csdw: CsdwEthernet,
    payload: &'a [u8],
    offset: usize,
    remaining: u32,
    failed: bool,
}

impl FrameIter<'_> {
    #[must_use]
    pub fn csdw(&self) -> CsdwEthernet {
        self.csdw
    }
}

impl Iterator for FrameIter<'_> {
    type Item = Result<EthernetFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        match decode_one(self.payload, self.offset) {
            Ok((frame, next_offset)) => {
                self.offset = next_offset;
                self.remaining -= 1;
                Some(Ok(frame))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn decode_one(payload: &[u8], offset: usize) -> Result<(EthernetFrame, usize)> {
    let short = || Error::InvalidData(format!(
        "ethernet packet body truncated at offset {offset}, {} bytes remain",
        payload.len().saturating_sub(offset)
    ));

    let time = le_u64(payload, offset).ok_or_else(short)?;
    let word = le_u32(payload, offset + 8).ok_or_else(short)?;
    let data_len = (word & 0x3fff) as usize;

    let frame_start = offset + IPH_LEN;
    let frame = payload
        .get(frame_start..frame_start + data_len)
        .ok_or_else(short)?;
    if frame.len() < FRAME_HEADER_LEN {
        return Err(Error::InvalidData(format!(
            "ethernet frame at offset {offset} is {} bytes, shorter than its header",
            frame.len()
        )));
    }

    let mut dst = [0u8; 6];
    let mut src = [0u8; 6];
    dst.copy_from_slice(&frame[..MAC_LEN]);
    src.copy_from_slice(&frame[MAC_LEN..2 * MAC_LEN]);
    // the type field is captured wire-order, opposite of the record's
    // little-endian framing
    let type_len = swap16(u16::from_le_bytes([frame[12], frame[13]]));

    let frame = EthernetFrame {
        time,
        length_error: word & 0x4000 != 0,
        data_crc_error: word & 0x8000 != 0,
        network_id: ((word >> 16) & 0xff) as u8,
        speed: ((word >> 24) & 0xf) as u8,
        content: ((word >> 28) & 0x3) as u8,
        frame_error: word & 0x4000_0000 != 0,
        frame_crc_error: word & 0x8000_0000 != 0,
        dst: MacAddr(dst),
        src: MacAddr(src),
        type_len,
        data: frame[FRAME_HEADER_LEN..].to_vec(),
    };
    // frames are padded to 16-bit boundaries
    let next = frame_start + data_len + (data_len & 1);
    Ok((frame, next))
}
