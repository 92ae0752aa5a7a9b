//! Chapter 10 packet stream access.
//!
//! A Chapter 10 stream is a sequence of variable-length packets, each
//! starting with a fixed 24-byte little-endian primary header (optionally
//! followed by a 12-byte secondary header) and carrying a type-tagged
//! payload. [`Ch10Reader`] is a sequential cursor over such a stream.

mod summary;

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{Error, Result};

pub use summary::{ChannelSummary, Summary, TypeSummary};

pub type ChannelId = u16;

/// Packet sync pattern, first two bytes of every packet.
pub const SYNC: u16 = 0xEB25;

/// Payload data type codes from the Chapter 10 packet header.
///
/// The table is the full enumeration from the standard; codes not in the
/// table are carried as-is and render as `"Undefined"`, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType(pub u8);

impl DataType {
    pub const USER_DEFINED: DataType = DataType(0x00);
    pub const TMATS: DataType = DataType(0x01);
    pub const RECORDING_EVENT: DataType = DataType(0x02);
    pub const RECORDING_INDEX: DataType = DataType(0x03);
    pub const COMPUTER_4: DataType = DataType(0x04);
    pub const COMPUTER_5: DataType = DataType(0x05);
    pub const COMPUTER_6: DataType = DataType(0x06);
    pub const COMPUTER_7: DataType = DataType(0x07);
    pub const PCM_FMT_0: DataType = DataType(0x08);
    pub const PCM_FMT_1: DataType = DataType(0x09);
    pub const PCM_FMT_2: DataType = DataType(0x0a);
    pub const IRIG_TIME: DataType = DataType(0x11);
    pub const IRIG_NETWORK_TIME: DataType = DataType(0x12);
    pub const MIL1553_FMT_1: DataType = DataType(0x19);
    pub const MIL1553_16PP194: DataType = DataType(0x1a);
    pub const ANALOG: DataType = DataType(0x21);
    pub const DISCRETE: DataType = DataType(0x29);
    pub const MESSAGE: DataType = DataType(0x30);
    pub const ARINC429_FMT_0: DataType = DataType(0x38);
    pub const VIDEO_FMT_0: DataType = DataType(0x40);
    pub const VIDEO_FMT_1: DataType = DataType(0x41);
    pub const VIDEO_FMT_2: DataType = DataType(0x42);
    pub const VIDEO_FMT_3: DataType = DataType(0x43);
    pub const VIDEO_FMT_4: DataType = DataType(0x44);
    pub const IMAGE_FMT_0: DataType = DataType(0x48);
    pub const IMAGE_FMT_1: DataType = DataType(0x49);
    pub const IMAGE_FMT_2: DataType = DataType(0x4a);
    pub const UART_FMT_0: DataType = DataType(0x50);
    pub const IEEE1394_FMT_0: DataType = DataType(0x58);
    pub const IEEE1394_FMT_1: DataType = DataType(0x59);
    pub const PARALLEL_FMT_0: DataType = DataType(0x60);
    pub const ETHERNET_FMT_0: DataType = DataType(0x68);
    pub const ETHERNET_FMT_1: DataType = DataType(0x69);
    pub const TSPI_FMT_0: DataType = DataType(0x70);
    pub const TSPI_FMT_1: DataType = DataType(0x71);
    pub const TSPI_FMT_2: DataType = DataType(0x72);
    pub const CAN_BUS: DataType = DataType(0x78);
    pub const FIBRE_CHAN_FMT_0: DataType = DataType(0x79);
    pub const FIBRE_CHAN_FMT_1: DataType = DataType(0x7a);

    /// Human readable label for this type code.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::USER_DEFINED => "User Defined",
            Self::TMATS => "TMATS",
            Self::RECORDING_EVENT => "Event",
            Self::RECORDING_INDEX => "Index",
            Self::COMPUTER_4 => "Computer Generated 4",
            Self::COMPUTER_5 => "Computer Generated 5",
            Self::COMPUTER_6 => "Computer Generated 6",
            Self::COMPUTER_7 => "Computer Generated 7",
            Self::PCM_FMT_0 => "PCM Format 0",
            Self::PCM_FMT_1 => "PCM Format 1",
            Self::PCM_FMT_2 => "PCM Format 2",
            Self::IRIG_TIME => "Time",
            Self::IRIG_NETWORK_TIME => "Network Time",
            Self::MIL1553_FMT_1 => "1553",
            Self::MIL1553_16PP194 => "16PP194",
            Self::ANALOG => "Analog",
            Self::DISCRETE => "Discrete",
            Self::MESSAGE => "Message",
            Self::ARINC429_FMT_0 => "ARINC 429",
            Self::VIDEO_FMT_0 => "Video Format 0",
            Self::VIDEO_FMT_1 => "Video Format 1",
            Self::VIDEO_FMT_2 => "Video Format 2",
            Self::VIDEO_FMT_3 => "Video Format 3",
            Self::VIDEO_FMT_4 => "Video Format 4",
            Self::IMAGE_FMT_0 => "Image Format 0",
            Self::IMAGE_FMT_1 => "Image Format 1",
            Self::IMAGE_FMT_2 => "Image Format 2",
            Self::UART_FMT_0 => "UART",
            Self::IEEE1394_FMT_0 => "IEEE 1394 Format 0",
            Self::IEEE1394_FMT_1 => "IEEE 1394 Format 1",
            Self::PARALLEL_FMT_0 => "Parallel",
            Self::ETHERNET_FMT_0 => "Ethernet",
            Self::ETHERNET_FMT_1 => "Ethernet Format 1",
            Self::TSPI_FMT_0 => "TSPI Format 0",
            Self::TSPI_FMT_1 => "TSPI Format 1",
            Self::TSPI_FMT_2 => "TSPI Format 2",
            Self::CAN_BUS => "CAN Bus",
            Self::FIBRE_CHAN_FMT_0 => "Fibre Channel Format 0",
            Self::FIBRE_CHAN_FMT_1 => "Fibre Channel Format 1",
            _ => "Undefined",
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Stream open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    /// Open an existing file for reading
    Read,
    /// Create a new file or overwrite an existing file
    Overwrite,
    /// Append data to the end of an existing file
    Append,
    /// Open an existing file for reading in time order
    ReadInOrder,
    /// Open a network data stream; framing is identical to the file format
    ReadNetStream,
}

impl FileMode {
    fn readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadInOrder | Self::ReadNetStream)
    }
}

impl Display for FileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Optional secondary header carrying an absolute packet time.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct SecondaryHeader {
    pub time: [u32; 2],
    pub reserved: u16,
    pub checksum: u16,
}

/// Chapter 10 packet primary header.
///
/// Fixed 24 bytes, little-endian, 1-byte packed. The secondary header is
/// present only when [`PacketHeader::FLAG_SECONDARY`] is set in
/// `packet_flags`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub sync: u16,
    pub channel_id: ChannelId,
    pub packet_len: u32,
    pub data_len: u32,
    pub header_version: u8,
    pub sequence_number: u8,
    pub packet_flags: u8,
    pub data_type: DataType,
    /// 10 MHz relative time counter, 6 bytes little-endian
    pub ref_time: [u8; 6],
    pub checksum: u16,
    pub secondary: Option<SecondaryHeader>,
}

impl PacketHeader {
    /// Size of the primary header
    pub const LEN: usize = 24;
    /// Size of the optional secondary header
    pub const SECONDARY_LEN: usize = 12;
    /// `packet_flags` bit indicating a secondary header is present
    pub const FLAG_SECONDARY: u8 = 0x80;

    /// Decode a primary header from bytes. Returns `None` if there are not
    /// enough bytes. The secondary header, if flagged, is filled in by the
    /// reader from the bytes that follow.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        Some(PacketHeader {
            sync: u16::from_le_bytes([buf[0], buf[1]]),
            channel_id: u16::from_le_bytes([buf[2], buf[3]]),
            packet_len: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            data_len: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            header_version: buf[12],
            sequence_number: buf[13],
            packet_flags: buf[14],
            data_type: DataType(buf[15]),
            ref_time: [buf[16], buf[17], buf[18], buf[19], buf[20], buf[21]],
            checksum: u16::from_le_bytes([buf[22], buf[23]]),
            secondary: None,
        })
    }

    #[must_use]
    pub fn has_secondary(&self) -> bool {
        self.packet_flags & Self::FLAG_SECONDARY != 0
    }

    /// Total header length, including the secondary header when flagged.
    #[must_use]
    pub fn header_len(&self) -> usize {
        if self.has_secondary() {
            Self::LEN + Self::SECONDARY_LEN
        } else {
            Self::LEN
        }
    }

    /// The relative time counter as a 64-bit tick count (100 ns ticks).
    #[must_use]
    pub fn rel_time(&self) -> u64 {
        let t = self.ref_time;
        u64::from_le_bytes([t[0], t[1], t[2], t[3], t[4], t[5], 0, 0])
    }

    /// Checksum over a raw primary header: wrapping sum of its first 11
    /// little-endian 16-bit words.
    #[must_use]
    pub fn compute_checksum(raw: &[u8; Self::LEN]) -> u16 {
        raw[..Self::LEN - 2]
            .chunks_exact(2)
            .map(|w| u16::from_le_bytes([w[0], w[1]]))
            .fold(0u16, u16::wrapping_add)
    }

    /// Checksum over a raw secondary header: wrapping byte sum of its
    /// first 10 bytes.
    #[must_use]
    pub fn compute_secondary_checksum(raw: &[u8; Self::SECONDARY_LEN]) -> u16 {
        raw[..Self::SECONDARY_LEN - 2]
            .iter()
            .fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
    }
}

/// Sequential cursor over a Chapter 10 packet stream.
///
/// The reader owns a single current header and a single grow-only payload
/// buffer; both are overwritten in place on each advance. Decoders borrow
/// the payload for the duration of one packet, so a decode in flight
/// borrows the reader and header advances cannot interleave with it.
#[derive(Debug)]
pub struct Ch10Reader<R> {
    inner: R,
    mode: FileMode,
    header: Option<PacketHeader>,
    /// Offset of the current packet's first byte
    offset: u64,
    /// Offset where the next header read starts
    next_offset: u64,
    /// False after a corrupt header; the next read scans for sync
    synced: bool,
    /// Payload buffer, reused across packets, capacity never shrinks
    buf: Vec<u8>,
    data_len: usize,
}

impl Ch10Reader<File> {
    /// Open a Chapter 10 file.
    ///
    /// The write-oriented modes ([`FileMode::Overwrite`], [`FileMode::Append`])
    /// acquire the file but any read call against them fails with
    /// [`Error::WrongFileMode`]; this crate does not encode Chapter 10 data.
    ///
    /// # Errors
    /// [`Error::Io`] if the file cannot be acquired.
    pub fn open<P: AsRef<Path>>(path: P, mode: FileMode) -> Result<Self> {
        let file = match mode {
            FileMode::Read | FileMode::ReadInOrder | FileMode::ReadNetStream => {
                File::open(path)?
            }
            FileMode::Overwrite => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
            FileMode::Append => OpenOptions::new().write(true).append(true).open(path)?,
        };
        Ok(Self::with_mode(file, mode))
    }
}

impl<R> Ch10Reader<R>
where
    R: Read + Seek,
{
    /// Wrap any seekable byte source, e.g. an in-memory buffer or a
    /// buffered network capture. Framing is identical to the file format.
    pub fn from_reader(inner: R) -> Self {
        Self::with_mode(inner, FileMode::Read)
    }

    fn with_mode(inner: R, mode: FileMode) -> Self {
        Ch10Reader {
            inner,
            mode,
            header: None,
            offset: 0,
            next_offset: 0,
            synced: true,
            buf: Vec::new(),
            data_len: 0,
        }
    }

    /// Close the stream, returning the underlying source.
    pub fn close(self) -> R {
        self.inner
    }

    /// The current packet header, if one has been read.
    #[must_use]
    pub fn header(&self) -> Option<&PacketHeader> {
        self.header.as_ref()
    }

    /// The current packet's payload as filled by the last [`Self::read_data`].
    /// Empty until `read_data` is called for the current packet.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf[..self.data_len]
    }

    fn check_readable(&self) -> Result<()> {
        if self.mode.readable() {
            Ok(())
        } else {
            Err(Error::WrongFileMode(self.mode))
        }
    }

    fn stream_len(&mut self) -> Result<u64> {
        let len = self.inner.seek(SeekFrom::End(0))?;
        Ok(len)
    }

    /// Read the 24 (+12) header bytes at `offset`. `Ok(None)` on EOF.
    /// Does not validate sync or checksum.
    fn read_header_at(&mut self, offset: u64) -> Result<Option<(PacketHeader, [u8; PacketHeader::LEN])>> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut raw = [0u8; PacketHeader::LEN];
        if let Err(err) = self.inner.read_exact(&mut raw) {
            if err.kind() == ErrorKind::UnexpectedEof {
                return Ok(None);
            }
            return Err(err.into());
        }
        // decode cannot fail, we just read LEN bytes
        let mut header = PacketHeader::decode(&raw).unwrap();
        if header.has_secondary() {
            let mut sec = [0u8; PacketHeader::SECONDARY_LEN];
            if let Err(err) = self.inner.read_exact(&mut sec) {
                if err.kind() == ErrorKind::UnexpectedEof {
                    return Ok(None);
                }
                return Err(err.into());
            }
            let checksum = u16::from_le_bytes([sec[10], sec[11]]);
            let computed = PacketHeader::compute_secondary_checksum(&sec);
            if checksum != computed {
                warn!(
                    offset,
                    checksum, computed, "secondary header checksum mismatch"
                );
            }
            header.secondary = Some(SecondaryHeader {
                time: [
                    u32::from_le_bytes([sec[0], sec[1], sec[2], sec[3]]),
                    u32::from_le_bytes([sec[4], sec[5], sec[6], sec[7]]),
                ],
                reserved: u16::from_le_bytes([sec[8], sec[9]]),
                checksum,
            });
        }
        Ok(Some((header, raw)))
    }

    fn accept(&mut self, header: PacketHeader, offset: u64) -> Result<()> {
        if u64::from(header.packet_len) < (u64::from(header.data_len) + header.header_len() as u64)
        {
            self.synced = false;
            // resume scanning past this header, not at it
            self.next_offset = offset;
            return Err(Error::InvalidData(format!(
                "packet length {} too small for data length {} at offset {offset}",
                header.packet_len, header.data_len,
            )));
        }
        trace!(
            offset,
            channel_id = header.channel_id,
            data_type = %header.data_type,
            packet_len = header.packet_len,
            "packet header"
        );
        self.offset = offset;
        self.next_offset = offset + u64::from(header.packet_len);
        self.header = Some(header);
        self.data_len = 0;
        Ok(())
    }

    /// Scan forward from `from` in 4-byte steps for a header with a valid
    /// sync pattern and checksum. Packets are 4-byte aligned by filler, so
    /// a real header always sits on such a boundary.
    fn scan_forward(&mut self, from: u64) -> Result<Option<(PacketHeader, u64)>> {
        let mut pos = from.next_multiple_of(4);
        loop {
            match self.read_header_at(pos)? {
                None => return Ok(None),
                Some((header, raw)) => {
                    if header.sync == SYNC
                        && header.checksum == PacketHeader::compute_checksum(&raw)
                    {
                        debug!(offset = pos, "stream resynchronized");
                        return Ok(Some((header, pos)));
                    }
                }
            }
            pos += 4;
        }
    }

    /// Advance to and read the next packet header, overwriting the current
    /// one. Returns `Ok(None)` at end of stream.
    ///
    /// # Errors
    /// [`Error::HeaderChecksum`] on a corrupt header (recoverable, the next
    /// call scans forward for a valid one), [`Error::InvalidData`] if the
    /// packet length contradicts the data length, [`Error::Io`] otherwise.
    pub fn read_next_header(&mut self) -> Result<Option<&PacketHeader>> {
        self.check_readable()?;

        if !self.synced {
            let from = self.next_offset + 4;
            match self.scan_forward(from)? {
                None => return Ok(None),
                Some((header, pos)) => {
                    self.synced = true;
                    self.accept(header, pos)?;
                    return Ok(self.header.as_ref());
                }
            }
        }

        let pos = self.next_offset;
        match self.read_header_at(pos)? {
            None => Ok(None),
            Some((header, raw)) => {
                let computed = PacketHeader::compute_checksum(&raw);
                if header.sync != SYNC || header.checksum != computed {
                    debug!(offset = pos, "corrupt packet header, dropping sync");
                    self.synced = false;
                    return Err(Error::HeaderChecksum {
                        expected: header.checksum,
                        computed,
                    });
                }
                self.accept(header, pos)?;
                Ok(self.header.as_ref())
            }
        }
    }

    /// Retreat to and read the previous packet header by scanning backward
    /// in 4-byte steps for a valid sync pattern and checksum. Returns
    /// `Ok(None)` at the beginning of the stream.
    pub fn read_prev_header(&mut self) -> Result<Option<&PacketHeader>> {
        self.check_readable()?;

        let mut pos = self.offset;
        loop {
            if pos < 4 {
                return Ok(None);
            }
            pos -= 4;
            if let Some((header, raw)) = self.read_header_at(pos)? {
                if header.sync == SYNC && header.checksum == PacketHeader::compute_checksum(&raw)
                {
                    self.synced = true;
                    self.accept(header, pos)?;
                    return Ok(self.header.as_ref());
                }
            }
        }
    }

    /// Read the current packet's payload (`data_len` bytes) into the
    /// internal buffer, growing it if needed, and return a borrowed view.
    ///
    /// # Errors
    /// [`Error::InvalidData`] if no packet header has been read,
    /// [`Error::Io`] on a short read.
    pub fn read_data(&mut self) -> Result<&[u8]> {
        self.check_readable()?;
        let header = self
            .header
            .ok_or_else(|| Error::InvalidData("no current packet".to_string()))?;
        let want = header.data_len as usize;
        if self.buf.len() < want {
            self.buf.resize(want, 0);
        }
        self.inner
            .seek(SeekFrom::Start(self.offset + header.header_len() as u64))?;
        self.inner.read_exact(&mut self.buf[..want])?;
        self.data_len = want;
        Ok(&self.buf[..want])
    }

    /// Lazy iterator of packet headers, advancing the underlying cursor as
    /// it is consumed. A non-empty `channel_filter` silently skips headers
    /// whose channel id is not in the set; filtering never reads payload
    /// bytes. The sequence is finite and non-restartable.
    pub fn packet_headers<'a>(&'a mut self, channel_filter: &'a [ChannelId]) -> HeaderIter<'a, R> {
        HeaderIter {
            reader: self,
            filter: channel_filter,
        }
    }

    /// Position to the start of the stream; the next read returns the
    /// first packet.
    pub fn first(&mut self) -> Result<()> {
        self.check_readable()?;
        self.header = None;
        self.offset = 0;
        self.next_offset = 0;
        self.synced = true;
        self.data_len = 0;
        Ok(())
    }

    /// Position to the last packet in the stream; the next read returns it.
    /// `Ok(None)` if the stream contains no valid packet.
    pub fn last(&mut self) -> Result<Option<u64>> {
        self.check_readable()?;
        let len = self.stream_len()?;
        let mut pos = (len.saturating_sub(PacketHeader::LEN as u64)) & !3;
        loop {
            if let Some((header, raw)) = self.read_header_at(pos)? {
                if header.sync == SYNC && header.checksum == PacketHeader::compute_checksum(&raw)
                {
                    self.header = None;
                    self.offset = pos;
                    self.next_offset = pos;
                    self.synced = true;
                    self.data_len = 0;
                    return Ok(Some(pos));
                }
            }
            if pos < 4 {
                return Ok(None);
            }
            pos -= 4;
        }
    }

    /// Byte offset at which the next header read will start.
    #[must_use]
    pub fn get_pos(&self) -> u64 {
        self.next_offset
    }

    /// Position the cursor at an absolute byte offset. The offset should
    /// be the start of a packet; the next read starts there.
    ///
    /// # Errors
    /// [`Error::Seek`] if `offset` is past the end of the stream.
    pub fn set_pos(&mut self, offset: u64) -> Result<()> {
        self.check_readable()?;
        let len = self.stream_len()?;
        if offset > len {
            return Err(Error::Seek { offset, len });
        }
        self.header = None;
        self.offset = offset;
        self.next_offset = offset;
        self.synced = true;
        self.data_len = 0;
        Ok(())
    }
}

/// Iterator returned by [`Ch10Reader::packet_headers`].
pub struct HeaderIter<'a, R> {
    reader: &'a mut Ch10Reader<R>,
    filter: &'a [ChannelId],
}

impl<R> Iterator for HeaderIter<'_, R>
where
    R: Read + Seek,
{
    type Item = Result<PacketHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_next_header() {
                Ok(Some(header)) => {
                    if self.filter.is_empty() || self.filter.contains(&header.channel_id) {
                        return Some(Ok(*header));
                    }
                }
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn encode_header(
        channel_id: u16,
        data_type: DataType,
        data_len: u32,
        ref_time: u64,
    ) -> Vec<u8> {
        let mut raw = vec![0u8; PacketHeader::LEN];
        raw[0..2].copy_from_slice(&SYNC.to_le_bytes());
        raw[2..4].copy_from_slice(&channel_id.to_le_bytes());
        let packet_len = PacketHeader::LEN as u32 + data_len;
        raw[4..8].copy_from_slice(&packet_len.to_le_bytes());
        raw[8..12].copy_from_slice(&data_len.to_le_bytes());
        raw[12] = 0x06; // header version
        raw[15] = data_type.0;
        raw[16..22].copy_from_slice(&ref_time.to_le_bytes()[..6]);
        let mut fixed = [0u8; PacketHeader::LEN];
        fixed.copy_from_slice(&raw);
        let sum = PacketHeader::compute_checksum(&fixed);
        raw[22..24].copy_from_slice(&sum.to_le_bytes());
        raw
    }

    fn packet(channel_id: u16, data_type: DataType, payload: &[u8], ref_time: u64) -> Vec<u8> {
        let mut p = encode_header(channel_id, data_type, payload.len() as u32, ref_time);
        p.extend_from_slice(payload);
        p
    }

    #[test]
    fn decode_header() {
        let raw = encode_header(12, DataType::MIL1553_FMT_1, 100, 0x1234_5678_9abc);
        let mut fixed = [0u8; PacketHeader::LEN];
        fixed.copy_from_slice(&raw);
        let header = PacketHeader::decode(&raw).unwrap();

        assert_eq!(header.sync, SYNC);
        assert_eq!(header.channel_id, 12);
        assert_eq!(header.packet_len, 124);
        assert_eq!(header.data_len, 100);
        assert_eq!(header.data_type, DataType::MIL1553_FMT_1);
        assert_eq!(header.rel_time(), 0x1234_5678_9abc);
        assert_eq!(header.checksum, PacketHeader::compute_checksum(&fixed));
        assert!(!header.has_secondary());
    }

    #[test]
    fn decode_header_from_captured_bytes() {
        let raw = hex::decode("25eb01001c00000004000000060000191027000000005c2b").unwrap();
        let header = PacketHeader::decode(&raw).unwrap();

        assert_eq!(header.sync, SYNC);
        assert_eq!(header.channel_id, 1);
        assert_eq!(header.packet_len, 28);
        assert_eq!(header.data_len, 4);
        assert_eq!(header.data_type, DataType::MIL1553_FMT_1);
        assert_eq!(header.rel_time(), 10_000);
        let fixed: [u8; PacketHeader::LEN] = raw.as_slice().try_into().unwrap();
        assert_eq!(header.checksum, PacketHeader::compute_checksum(&fixed));
    }

    #[test]
    fn decode_header_too_short() {
        assert!(PacketHeader::decode(&[0u8; 10]).is_none());
    }

    #[test]
    fn secondary_header_parsed() {
        let mut raw = encode_header(1, DataType::IRIG_TIME, 0, 0);
        raw[14] = PacketHeader::FLAG_SECONDARY;
        let packet_len = (PacketHeader::LEN + PacketHeader::SECONDARY_LEN) as u32;
        raw[4..8].copy_from_slice(&packet_len.to_le_bytes());
        let mut fixed = [0u8; PacketHeader::LEN];
        fixed.copy_from_slice(&raw);
        let sum = PacketHeader::compute_checksum(&fixed);
        raw[22..24].copy_from_slice(&sum.to_le_bytes());

        let mut sec = [0u8; PacketHeader::SECONDARY_LEN];
        sec[0..4].copy_from_slice(&0x1111_2222u32.to_le_bytes());
        let ssum = PacketHeader::compute_secondary_checksum(&sec);
        sec[10..12].copy_from_slice(&ssum.to_le_bytes());
        raw.extend_from_slice(&sec);

        let mut reader = Ch10Reader::from_reader(Cursor::new(raw));
        let header = *reader.read_next_header().unwrap().unwrap();
        assert!(header.has_secondary());
        assert_eq!(header.header_len(), 36);
        let sec = header.secondary.unwrap();
        assert_eq!(sec.time[0], 0x1111_2222);
        assert_eq!(sec.checksum, ssum);
    }

    #[test]
    fn read_three_packets_in_order() {
        let mut dat = packet(1, DataType::IRIG_TIME, &[0u8; 12], 100);
        dat.extend(packet(2, DataType::MIL1553_FMT_1, &[0u8; 8], 200));
        dat.extend(packet(3, DataType::ETHERNET_FMT_0, &[0u8; 4], 300));
        let mut reader = Ch10Reader::from_reader(Cursor::new(dat));

        let channels: Vec<u16> = reader
            .packet_headers(&[])
            .map(|h| h.unwrap().channel_id)
            .collect();
        assert_eq!(channels, vec![1, 2, 3]);
    }

    #[test]
    fn channel_filter_skips_without_reading_payload() {
        let mut dat = packet(1, DataType::IRIG_TIME, &[0u8; 12], 100);
        dat.extend(packet(2, DataType::MIL1553_FMT_1, &[0u8; 8], 200));
        dat.extend(packet(1, DataType::IRIG_TIME, &[0u8; 12], 300));
        let mut reader = Ch10Reader::from_reader(Cursor::new(dat));

        let channels: Vec<u16> = reader
            .packet_headers(&[1])
            .map(|h| h.unwrap().channel_id)
            .collect();
        assert_eq!(channels, vec![1, 1]);
    }

    #[test]
    fn read_data_returns_payload() {
        let payload = [0xde, 0xad, 0xbe, 0xef];
        let dat = packet(9, DataType::USER_DEFINED, &payload, 0);
        let mut reader = Ch10Reader::from_reader(Cursor::new(dat));

        reader.read_next_header().unwrap().unwrap();
        assert_eq!(reader.read_data().unwrap(), &payload);
    }

    #[test]
    fn checksum_error_is_recoverable() {
        let mut dat = packet(1, DataType::IRIG_TIME, &[0u8; 12], 100);
        dat[22] ^= 0xff; // corrupt first packet checksum
        dat.extend(packet(2, DataType::MIL1553_FMT_1, &[0u8; 8], 200));
        let mut reader = Ch10Reader::from_reader(Cursor::new(dat));

        assert!(matches!(
            reader.read_next_header(),
            Err(Error::HeaderChecksum { .. })
        ));
        // next read scans forward to the second packet
        let header = *reader.read_next_header().unwrap().unwrap();
        assert_eq!(header.channel_id, 2);
    }

    #[test]
    fn inconsistent_length_is_recoverable() {
        // valid checksum, but packet_len contradicts data_len
        let mut p1 = encode_header(1, DataType::IRIG_TIME, 12, 100);
        p1[4..8].copy_from_slice(&8u32.to_le_bytes());
        let mut fixed = [0u8; PacketHeader::LEN];
        fixed.copy_from_slice(&p1);
        let sum = PacketHeader::compute_checksum(&fixed);
        p1[22..24].copy_from_slice(&sum.to_le_bytes());
        p1.extend_from_slice(&[0u8; 12]);

        let mut dat = p1;
        dat.extend(packet(2, DataType::MIL1553_FMT_1, &[0u8; 8], 200));
        let mut reader = Ch10Reader::from_reader(Cursor::new(dat));

        assert!(matches!(
            reader.read_next_header(),
            Err(Error::InvalidData(_))
        ));
        let header = *reader.read_next_header().unwrap().unwrap();
        assert_eq!(header.channel_id, 2);
    }

    #[test]
    fn prev_header_retreats() {
        let mut dat = packet(1, DataType::IRIG_TIME, &[0u8; 12], 100);
        dat.extend(packet(2, DataType::MIL1553_FMT_1, &[0u8; 8], 200));
        let mut reader = Ch10Reader::from_reader(Cursor::new(dat));

        reader.read_next_header().unwrap().unwrap();
        let second = *reader.read_next_header().unwrap().unwrap();
        assert_eq!(second.channel_id, 2);

        let first = *reader.read_prev_header().unwrap().unwrap();
        assert_eq!(first.channel_id, 1);
        // already at the first packet
        assert!(reader.read_prev_header().unwrap().is_none());
    }

    #[test]
    fn set_pos_out_of_range() {
        let dat = packet(1, DataType::IRIG_TIME, &[0u8; 12], 100);
        let len = dat.len() as u64;
        let mut reader = Ch10Reader::from_reader(Cursor::new(dat));
        assert!(matches!(
            reader.set_pos(len + 1),
            Err(Error::Seek { .. })
        ));
        reader.set_pos(0).unwrap();
    }

    #[test]
    fn last_positions_at_final_packet() {
        let mut dat = packet(1, DataType::IRIG_TIME, &[0u8; 12], 100);
        let second_at = dat.len() as u64;
        dat.extend(packet(2, DataType::MIL1553_FMT_1, &[0u8; 8], 200));
        let mut reader = Ch10Reader::from_reader(Cursor::new(dat));

        assert_eq!(reader.last().unwrap(), Some(second_at));
        let header = *reader.read_next_header().unwrap().unwrap();
        assert_eq!(header.channel_id, 2);
    }

    #[test]
    fn wrong_file_mode() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join("out.ch10");
        let mut reader = Ch10Reader::open(&path, FileMode::Overwrite).unwrap();
        assert!(matches!(
            reader.read_next_header(),
            Err(Error::WrongFileMode(FileMode::Overwrite))
        ));
    }

    #[test]
    fn undefined_data_type_label() {
        assert_eq!(DataType(0xee).name(), "Undefined");
        assert_eq!(DataType::TMATS.name(), "TMATS");
    }
}
