//! Payload decoders for the packet body formats.
//!
//! Each decoder consumes the payload bytes of one packet (as returned by
//! [`crate::packet::Ch10Reader::read_data`]) and exposes either the decoded
//! structure or a lazy iterator of intra-packet messages.

pub mod ethernet;
pub mod ms1553;
pub mod time_f1;
pub mod tmats;
pub mod video;

/// Swap the bytes of a 16-bit word. Its own inverse.
#[must_use]
pub(crate) fn swap16(word: u16) -> u16 {
    word.rotate_left(8)
}

/// Read a little-endian u16 at `offset`, or `None` if out of range.
pub(crate) fn le_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read a little-endian u32 at `offset`, or `None` if out of range.
pub(crate) fn le_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a little-endian u64 at `offset`, or `None` if out of range.
pub(crate) fn le_u64(buf: &[u8], offset: usize) -> Option<u64> {
    let bytes = buf.get(offset..offset + 8)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}
