//! Flat row export of 1553 traffic.
//!
//! Each message flattens to a variable length array of 16-bit words with a
//! fixed 11-word prefix, suitable for columnar storage or tabular analysis
//! tooling. The layout is self-inverse: [`Row1553::decode`] reverses
//! [`Row1553::encode`].

use std::io::{Read, Seek};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::decode::ms1553::{self, CommandWord, Msg1553};
use crate::packet::{Ch10Reader, ChannelId, DataType};
use crate::time::{DateFormat, IrigTime, TimeRef};
use crate::{Error, Result};

/// Fixed words before the data words in an encoded row.
pub const ROW_PREFIX_WORDS: usize = 11;

fn format_code(format: DateFormat) -> u16 {
    match format {
        DateFormat::DayOfYear => 0,
        DateFormat::DayMonthYear => 1,
    }
}

/// One 1553 message with its absolute timestamp, ready for tabular export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row1553 {
    pub time: IrigTime,
    pub channel_id: ChannelId,
    pub block_status: u16,
    pub cmd1: u16,
    pub stat1: u16,
    /// Zero unless the message was an RT to RT transfer
    pub cmd2: u16,
    pub stat2: u16,
    pub data: Vec<u16>,
}

impl Row1553 {
    #[must_use]
    pub fn from_msg(time: IrigTime, channel_id: ChannelId, msg: &Msg1553) -> Self {
        Row1553 {
            time,
            channel_id,
            block_status: msg.block_status,
            cmd1: msg.cmd1.0,
            stat1: msg.stat1.map_or(0, |s| s.0),
            cmd2: msg.cmd2.map_or(0, |c| c.0),
            stat2: msg.stat2.map_or(0, |s| s.0),
            data: msg.data.clone(),
        }
    }

    #[must_use]
    pub fn command(&self) -> CommandWord {
        CommandWord(self.cmd1)
    }

    /// Flatten to words: seconds and microseconds split high/low, then
    /// date format code, channel, block status, the four command and
    /// status words, then the data words.
    #[must_use]
    pub fn encode(&self) -> Vec<u16> {
        let secs = self.time.secs as u32;
        let micros = self.time.micros();
        let mut words = Vec::with_capacity(ROW_PREFIX_WORDS + self.data.len());
        words.push((secs >> 16) as u16);
        words.push(secs as u16);
        words.push((micros >> 16) as u16);
        words.push(micros as u16);
        words.push(format_code(self.time.format));
        words.push(self.channel_id);
        words.push(self.block_status);
        words.push(self.cmd1);
        words.push(self.stat1);
        words.push(self.cmd2);
        words.push(self.stat2);
        words.extend_from_slice(&self.data);
        words
    }

    /// Rebuild a row from its encoded words.
    ///
    /// # Errors
    /// [`Error::NotEnoughData`] if fewer than the fixed prefix words are
    /// present, [`Error::InvalidData`] on an unknown date format code.
    pub fn decode(words: &[u16]) -> Result<Self> {
        if words.len() < ROW_PREFIX_WORDS {
            return Err(Error::NotEnoughData {
                actual: words.len(),
                minimum: ROW_PREFIX_WORDS,
            });
        }
        let secs = (u32::from(words[0]) << 16) | u32::from(words[1]);
        let micros = (u32::from(words[2]) << 16) | u32::from(words[3]);
        let format = match words[4] {
            0 => DateFormat::DayOfYear,
            1 => DateFormat::DayMonthYear,
            other => {
                return Err(Error::InvalidData(format!(
                    "unknown date format code {other}"
                )))
            }
        };
        Ok(Row1553 {
            time: IrigTime::new(i64::from(secs), micros * 10, format),
            channel_id: words[5],
            block_status: words[6],
            cmd1: words[7],
            stat1: words[8],
            cmd2: words[9],
            stat2: words[10],
            data: words[11..].to_vec(),
        })
    }
}

/// Walk a stream from its current position and export every 1553 message
/// as a timestamped row. A non-empty `channel_filter` restricts export to
/// those channels. Packets with corrupt headers or undecodable bodies are
/// skipped with a warning; messages decoded before a truncation are kept.
///
/// # Errors
/// Any unrecoverable read error.
pub fn export_1553<R>(
    reader: &mut Ch10Reader<R>,
    time_ref: &TimeRef,
    channel_filter: &[ChannelId],
) -> Result<Vec<Row1553>>
where
    R: Read + Seek,
{
    let mut rows = Vec::new();
    loop {
        let header = match reader.read_next_header() {
            Ok(Some(header)) => *header,
            Ok(None) => break,
            Err(Error::HeaderChecksum { .. }) => continue,
            Err(err) => return Err(err),
        };
        if header.data_type != DataType::MIL1553_FMT_1 {
            continue;
        }
        if !channel_filter.is_empty() && !channel_filter.contains(&header.channel_id) {
            continue;
        }
        let payload = reader.read_data()?;
        let msgs = match ms1553::messages(payload) {
            Ok(msgs) => msgs,
            Err(err) => {
                warn!(channel_id = header.channel_id, %err, "skipping bad 1553 packet");
                continue;
            }
        };
        for msg in msgs {
            match msg {
                Ok(msg) => {
                    let time = time_ref.rel_to_irig(msg.time);
                    rows.push(Row1553::from_msg(time, header.channel_id, &msg));
                }
                // keep what decoded and move on to the next packet
                Err(err) => {
                    warn!(channel_id = header.channel_id, %err, "truncated 1553 packet");
                    break;
                }
            }
        }
    }
    debug!(rows = rows.len(), "1553 export complete");
    Ok(rows)
}
