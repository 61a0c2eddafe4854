use thiserror::Error;

/// Errors produced by the RAW decoding engine.
///
/// Every variant renders with a stable message prefix, and the numeric
/// [`ErrorKind`] is available via [`DecodeError::kind`], so callers can
/// classify entries of an image error log without string matching.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte range ended before a required number of bytes. Depending
    /// on context this is fatal (no full row available) or downgraded to
    /// a warning with a reduced row count.
    #[error("Image truncated ({0})")]
    Truncated(String),

    /// Degenerate geometry or inconsistent offsets.
    #[error("Invalid decode parameter: {0}")]
    InvalidParameter(String),

    /// A configuration the decoder cannot represent, e.g. more than 16
    /// bits per sample into a 16-bit buffer.
    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(String),

    /// Underlying byte-range access failed.
    #[error("RAW decoder: IO error: {0}")]
    Io(String),

    /// An internal invariant was violated.
    #[error("Internal decoder error: {0}")]
    Internal(String),
}

/// Numeric classification of a [`DecodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    Truncated = 1,
    InvalidParameter = 2,
    UnsupportedBitDepth = 3,
    Io = 4,
    Internal = 5,
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Truncated(_) => ErrorKind::Truncated,
            DecodeError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            DecodeError::UnsupportedBitDepth(_) => ErrorKind::UnsupportedBitDepth,
            DecodeError::Io(_) => ErrorKind::Io,
            DecodeError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
