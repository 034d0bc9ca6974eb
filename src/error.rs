use thiserror::Error;

/// Reasons a received datagram is not a valid frame. None of these is ever surfaced to the
///  application as a payload: the datagram is treated as if it had never arrived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: {len} bytes, header alone is {header_len}")]
    TooShort { len: usize, header_len: usize },

    #[error("bad magic {actual:#06x}, expected {expected:#06x}")]
    BadMagic { expected: u16, actual: u16 },

    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u16),

    #[error("length mismatch: header declares {declared} payload bytes, frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("checksum mismatch: header has {expected:08x}, payload hashes to {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("payload of {0} bytes does not fit a 32 bit length field")]
    PayloadTooLarge(usize),
}

/// Failure of the acknowledged send path for a whole message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// `chunk_index` is zero-based; the message reports it as such so it can be correlated
    ///  with the chunk header on the wire.
    #[error("chunk {chunk_index} of {chunk_total} was not acknowledged after {attempts} attempts")]
    RetriesExhausted {
        chunk_index: u32,
        chunk_total: u32,
        attempts: u32,
    },

    #[error("message of {0} bytes needs more chunks than a chunk header can count")]
    TooManyChunks(usize),

    #[error("message of {len} bytes exceeds the maximum message size of {max_message_size}")]
    MessageTooLarge { len: usize, max_message_size: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    #[error("chunk index {chunk_index} is out of range for a total of {chunk_total}")]
    IndexOutOfRange { chunk_index: u32, chunk_total: u32 },

    #[error("chunk reports a total of {chunk_total} chunks, messages may have at most {max_chunks}")]
    MessageTooLarge { chunk_total: u32, max_chunks: usize },

    #[error("chunk reports a total of {actual} chunks, session was started with {expected}")]
    TotalMismatch { expected: u32, actual: u32 },

    #[error("no reassembly session for sequence {0}")]
    SessionNotFound(u64),

    #[error("reassembly session for sequence {0} expired before it was complete")]
    SessionExpired(u64),
}
