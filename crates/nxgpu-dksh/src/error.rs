use thiserror::Error;

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, DkshError>;

/// Errors produced while decoding `DKSH` container bytes.
///
/// Container input is treated as untrusted; every variant here corresponds to
/// a structural problem in the bytes, never to a panic.
#[derive(Debug, Error)]
pub enum DkshError {
    /// The buffer ended before a required structure.
    #[error("truncated {what}: need {need} bytes, got {got}")]
    Truncated {
        /// The structure that was being decoded.
        what: &'static str,
        /// Bytes required to decode it.
        need: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// The magic word does not spell `DKSH`.
    #[error("bad magic {found:#010x}, expected {expected:#010x}")]
    BadMagic {
        /// The magic word found in the buffer.
        found: u32,
        /// The magic word the format requires.
        expected: u32,
    },

    /// The header declares a size this parser does not understand.
    #[error("unsupported header size {0} (expected 24)")]
    UnsupportedHeaderSize(u32),

    /// A declared offset or size points outside the container.
    #[error("{what} out of bounds: offset={offset} len={len} available={available}")]
    OutOfBounds {
        /// The structure whose range is invalid.
        what: &'static str,
        /// Declared start offset.
        offset: usize,
        /// Declared length in bytes.
        len: usize,
        /// Bytes actually available for the range.
        available: usize,
    },

    /// A program descriptor carries a stage tag the format does not define.
    #[error("unknown shader stage tag {0}")]
    UnknownStage(u32),

    /// Integer overflow while combining declared offsets and sizes.
    #[error("integer overflow while computing container offsets")]
    OffsetOverflow,
}
