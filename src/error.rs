use crate::packet::FileMode;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// IO error reading or seeking the underlying stream
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Not enough bytes")]
    NotEnoughData {
        /// Number of bytes we got
        actual: usize,
        /// Minimum number of expected bytes
        minimum: usize,
    },

    /// Primary header checksum mismatch.
    ///
    /// Recoverable. The reader drops to an unsynced state and the next
    /// read scans forward for a valid header, so callers may skip the
    /// offending packet and keep going.
    #[error("header checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    HeaderChecksum { expected: u16, computed: u16 },

    /// Packet or message contents inconsistent with their own headers.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Operation not valid for the mode the stream was opened with.
    #[error("wrong file mode: {0}")]
    WrongFileMode(FileMode),

    /// Seek target outside the stream bounds.
    #[error("seek out of range: offset {offset}, stream length {len}")]
    Seek { offset: u64, len: u64 },

    /// No qualifying time packet found, or a relative-to-absolute
    /// conversion was attempted before a reference was established.
    #[error("time not found")]
    TimeNotFound,
}

pub type Result<T> = std::result::Result<T, Error>;
