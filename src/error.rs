//! Error types for the codec.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors surfaced by the bitstream codec.
///
/// All variants are non-exceptional return values; the codec never panics
/// on malformed or exhausted input, and never retries internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A write ran out of buffer capacity. Samples committed before this
    /// point remain valid.
    #[error("buffer full: not enough capacity for {requested} bits ({available} available)")]
    BufferFull { requested: u32, available: u64 },

    /// A read ran out of unconsumed bits.
    #[error("buffer empty: not enough bits to read {requested} bits ({available} available)")]
    BufferEmpty { requested: u32, available: u64 },

    /// The multi-series header's major/minor version does not match this
    /// implementation.
    #[error("version mismatch: stream is v{}.{}, this codec reads v{}.{}", found.0, found.1, expected.0, expected.1)]
    VersionMismatch { expected: (u8, u8), found: (u8, u8) },

    /// The multi-series header failed a structural check (e.g. non-zero
    /// padding bytes).
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A row was appended whose value count did not match the channel
    /// count declared in the header.
    #[error("row shape mismatch: stream has {expected} channels, row has {actual}")]
    RowShapeMismatch { expected: usize, actual: usize },

    /// A configuration value was rejected at construction time.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A stream's bits didn't look like valid encoded data, e.g. the first
    /// sample's marker was not the full-timestamp escape. Distinct from
    /// `BufferEmpty`: there were enough bits, they just weren't the right
    /// ones (reading an unwritten, zero-filled region is the common case).
    #[error("corrupt stream: {0}")]
    CorruptStream(String),
}

impl CodecError {
    /// True for errors that simply mean "the session is over" rather than
    /// "the data or config is wrong".
    pub fn is_end_of_stream(&self) -> bool {
        matches!(
            self,
            CodecError::BufferFull { .. } | CodecError::BufferEmpty { .. }
        )
    }
}
