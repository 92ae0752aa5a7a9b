use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{ChannelId, DataType, PacketHeader};

/// Per data-type rollup within one channel.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSummary {
    pub packet_count: u64,
    pub data_byte_count: u64,
}

/// Rollup of all packets seen on one channel.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSummary {
    pub packet_count: u64,
    pub data_byte_count: u64,
    /// First and last relative-time counter values seen, in stream order
    pub first_rel_time: Option<u64>,
    pub last_rel_time: Option<u64>,
    pub types: HashMap<u8, TypeSummary>,
}

/// Stream-wide packet accumulator.
///
/// Feed every header to [`Summary::add`] while walking a stream, then
/// serialize or inspect. Serializes to JSON via serde.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub packet_count: u64,
    pub data_byte_count: u64,
    pub channels: HashMap<ChannelId, ChannelSummary>,
}

impl Summary {
    pub fn add(&mut self, header: &PacketHeader) {
        self.packet_count += 1;
        self.data_byte_count += u64::from(header.data_len);

        let chan = self.channels.entry(header.channel_id).or_default();
        chan.packet_count += 1;
        chan.data_byte_count += u64::from(header.data_len);
        if chan.first_rel_time.is_none() {
            chan.first_rel_time = Some(header.rel_time());
        }
        chan.last_rel_time = Some(header.rel_time());

        let typ = chan.types.entry(header.data_type.0).or_default();
        typ.packet_count += 1;
        typ.data_byte_count += u64::from(header.data_len);
    }

    /// Channels carrying packets of the given data type, sorted.
    #[must_use]
    pub fn channels_of_type(&self, data_type: DataType) -> Vec<ChannelId> {
        let mut out: Vec<ChannelId> = self
            .channels
            .iter()
            .filter(|(_, c)| c.types.contains_key(&data_type.0))
            .map(|(&id, _)| id)
            .collect();
        out.sort_unstable();
        out
    }
}
