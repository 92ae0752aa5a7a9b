//! MIL-STD-1553 Format 1 payload decoding.
//!
//! The payload opens with a channel specific data word giving the message
//! count, then one intra-packet header plus message words per message.
//! Messages are yielded lazily; a truncated payload ends iteration with an
//! error after the complete messages have been yielded.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{le_u16, le_u32, le_u64};
use crate::{Error, Result};

/// Intra-packet header size: 8 byte time, 2 byte block status, 2 gap bytes,
/// 2 byte message length.
const IPH_LEN: usize = 14;

/// Upper bound on a plausible message count; anything larger is corrupt.
const MAX_MSG_COUNT: u32 = 100_000;

/// Channel specific data word for 1553 Format 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Csdw1553 {
    pub raw: u32,
}

impl Csdw1553 {
    /// Number of messages in the packet body.
    #[must_use]
    pub fn msg_count(&self) -> u32 {
        self.raw & 0x00ff_ffff
    }

    /// Time tag bits field.
    #[must_use]
    pub fn ttb(&self) -> u8 {
        ((self.raw >> 30) & 0x3) as u8
    }
}

/// A 1553 command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandWord(pub u16);

impl CommandWord {
    /// Data word count; the encoded zero means 32.
    #[must_use]
    pub fn word_count(&self) -> u16 {
        let wc = self.0 & 0x1f;
        if wc == 0 {
            32
        } else {
            wc
        }
    }

    #[must_use]
    pub fn subaddress(&self) -> u16 {
        (self.0 >> 5) & 0x1f
    }

    /// Transmit/receive bit; true for RT-to-BC transmit.
    #[must_use]
    pub fn is_transmit(&self) -> bool {
        self.0 & 0x0400 != 0
    }

    #[must_use]
    pub fn rt_address(&self) -> u16 {
        (self.0 >> 11) & 0x1f
    }
}

impl Display for CommandWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}-{}-{:02}-{:02}",
            self.rt_address(),
            if self.is_transmit() { 'T' } else { 'R' },
            self.subaddress(),
            self.word_count(),
        )
    }
}

/// A 1553 status word, as returned by a remote terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusWord(pub u16);

impl StatusWord {
    #[must_use]
    pub fn rt_address(&self) -> u16 {
        (self.0 >> 11) & 0x1f
    }

    #[must_use]
    pub fn message_error(&self) -> bool {
        self.0 & 0x0400 != 0
    }

    #[must_use]
    pub fn service_request(&self) -> bool {
        self.0 & 0x0100 != 0
    }

    #[must_use]
    pub fn broadcast_received(&self) -> bool {
        self.0 & 0x0010 != 0
    }

    #[must_use]
    pub fn busy(&self) -> bool {
        self.0 & 0x0008 != 0
    }

    #[must_use]
    pub fn subsystem_flag(&self) -> bool {
        self.0 & 0x0004 != 0
    }

    #[must_use]
    pub fn terminal_flag(&self) -> bool {
        self.0 & 0x0001 != 0
    }
}

/// Block status word bit masks.
pub mod block_status {
    pub const WORD_ERROR: u16 = 0x0008;
    pub const SYNC_ERROR: u16 = 0x0010;
    pub const WORD_CNT_ERROR: u16 = 0x0020;
    pub const RESP_TIMEOUT: u16 = 0x0200;
    pub const FORMAT_ERROR: u16 = 0x0400;
    pub const RT2RT: u16 = 0x0800;
    pub const MSG_ERROR: u16 = 0x1000;
    pub const BUS_B: u16 = 0x2000;
}

/// One decoded 1553 message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Msg1553 {
    /// Intra-packet relative time counter value
    pub time: u64,
    pub block_status: u16,
    pub gap1: u8,
    pub gap2: u8,
    pub cmd1: CommandWord,
    /// Second command word, RT to RT transfers only
    pub cmd2: Option<CommandWord>,
    pub stat1: Option<StatusWord>,
    /// Transmitting RT status, RT to RT transfers only
    pub stat2: Option<StatusWord>,
    pub data: Vec<u16>,
}

impl Msg1553 {
    #[must_use]
    pub fn is_rt2rt(&self) -> bool {
        self.block_status & block_status::RT2RT != 0
    }

    /// True when the message carried an error indication. The data words
    /// are still decoded; callers decide whether to keep them.
    #[must_use]
    pub fn suspect(&self) -> bool {
        self.block_status
            & (block_status::WORD_ERROR
                | block_status::SYNC_ERROR
                | block_status::WORD_CNT_ERROR
                | block_status::RESP_TIMEOUT
                | block_status::FORMAT_ERROR
                | block_status::MSG_ERROR)
            != 0
    }

    /// Bus identifier, `'A'` or `'B'`.
    #[must_use]
    pub fn bus(&self) -> char {
        if self.block_status & block_status::BUS_B != 0 {
            'B'
        } else {
            'A'
        }
    }

    /// Word count declared by the governing command word. For RT to RT
    /// transfers that is the second (transmit) command word.
    #[must_use]
    pub fn word_count(&self) -> u16 {
        self.cmd2.unwrap_or(self.cmd1).word_count()
    }
}

/// Decode the channel specific word and return a lazy message iterator.
///
/// # Errors
/// [`Error::NotEnoughData`] if the payload is shorter than the channel
/// specific word, [`Error::InvalidData`] if the declared message count is
/// beyond any plausible packet.
pub fn messages(payload: &[u8]) -> Result<MsgIter<'_>> {
    let Some(raw) = le_u32(payload, 0) else {
        return Err(Error::NotEnoughData {
            actual: payload.len(),
            minimum: 4,
        });
    };
    let csdw = Csdw1553 { raw };
    if csdw.msg_count() > MAX_MSG_COUNT {
        return Err(Error::InvalidData(format!(
            "implausible 1553 message count {}",
            csdw.msg_count()
        )));
    }
    Ok(MsgIter {
        csdw,
        payload,
        offset: 4,
        remaining: csdw.msg_count(),
        failed: false,
    })
}

/// Lazy iterator over the messages of one 1553 packet.
pub struct MsgIter<'a> {
    csdw: Csdw1553,
    payload: &'a [u8],
    offset: usize,
    remaining: u32,
    failed: bool,
}

impl MsgIter<'_> {
    #[must_use]
    pub fn csdw(&self) -> Csdw1553 {
        self.csdw
    }
}

impl Iterator for MsgIter<'_> {
    type Item = Result<Msg1553>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        match decode_one(self.payload, self.offset) {
            Ok((msg, next_offset)) => {
                self.offset = next_offset;
                self.remaining -= 1;
                Some(Ok(msg))
            }
            Err(err) => {
                // packet body ran out before the declared count was met
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn decode_one(payload: &[u8], offset: usize) -> Result<(Msg1553, usize)> {
    let short = || Error::InvalidData(format!(
        "1553 packet body truncated at offset {offset}, {} bytes remain",
        payload.len().saturating_sub(offset)
    ));

    let time = le_u64(payload, offset).ok_or_else(short)?;
    let status = le_u16(payload, offset + 8).ok_or_else(short)?;
    let gap1 = *payload.get(offset + 10).ok_or_else(short)?;
    let gap2 = *payload.get(offset + 11).ok_or_else(short)?;
    let msg_len = le_u16(payload, offset + 12).ok_or_else(short)? as usize;

    let body_start = offset + IPH_LEN;
    let body = payload.get(body_start..body_start + msg_len).ok_or_else(short)?;
    let words: Vec<u16> = body
        .chunks_exact(2)
        .map(|w| u16::from_le_bytes([w[0], w[1]]))
        .collect();
    if words.is_empty() {
        return Err(Error::InvalidData(format!(
            "1553 message at offset {offset} has no command word"
        )));
    }
    if msg_len % 2 != 0 {
        warn!(offset, msg_len, "odd 1553 message length, trailing byte ignored");
    }

    let cmd1 = CommandWord(words[0]);
    let rt2rt = status & block_status::RT2RT != 0;
    let n = words.len();
    let msg = if rt2rt {
        // cmd1 cmd2 stat2 data... stat1
        Msg1553 {
            time,
            block_status: status,
            gap1,
            gap2,
            cmd1,
            cmd2: words.get(1).copied().map(CommandWord),
            stat2: words.get(2).copied().map(StatusWord),
            stat1: if n > 3 { Some(StatusWord(words[n - 1])) } else { None },
            data: words.get(3..n.saturating_sub(1)).unwrap_or(&[]).to_vec(),
        }
    } else if cmd1.is_transmit() {
        // cmd1 stat1 data...
        Msg1553 {
            time,
            block_status: status,
            gap1,
            gap2,
            cmd1,
            cmd2: None,
            stat2: None,
            stat1: words.get(1).copied().map(StatusWord),
            data: words.get(2..).unwrap_or(&[]).to_vec(),
        }
    } else {
        // cmd1 data... stat1
        Msg1553 {
            time,
            block_status: status,
            gap1,
            gap2,
            cmd1,
            cmd2: None,
            stat2: None,
            stat1: if n > 1 { Some(StatusWord(words[n - 1])) } else { None },
            data: words.get(1..n.saturating_sub(1)).unwrap_or(&[]).to_vec(),
        }
    };

    Ok((msg, body_start + msg_len))
}
