//! Error types for webpview operations.

use core::fmt;
use enough::StopReason;
use whereat::At;

/// Result type for webpview operations.
pub type Result<T> = core::result::Result<T, At<Error>>;

/// Error type for webpview operations.
///
/// None of these cross the host callback boundary: the session absorbs them
/// into a permanent "no image" state. They surface only from the codec and
/// from the export helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid input parameters (dimensions, buffer size, etc.)
    InvalidInput(String),
    /// Decoding failed
    DecodeFailed(DecodingError),
    /// Image or stream exceeds the configured decode limits
    LimitExceeded(String),
    /// Invalid WebP data
    InvalidWebP,
    /// Re-encoding for export failed
    EncodeFailed(String),
    /// The operation was cancelled through its stop token
    Stopped(StopReason),
    /// No decoded image is available yet
    NoImage,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::DecodeFailed(e) => write!(f, "decode failed: {}", e),
            Error::LimitExceeded(msg) => write!(f, "limit exceeded: {}", msg),
            Error::InvalidWebP => write!(f, "invalid WebP data"),
            Error::EncodeFailed(msg) => write!(f, "encode failed: {}", msg),
            Error::Stopped(reason) => write!(f, "stopped: {:?}", reason),
            Error::NoImage => write!(f, "no decoded image"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StopReason> for Error {
    fn from(reason: StopReason) -> Self {
        Error::Stopped(reason)
    }
}

/// Decoding error codes from libwebp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DecodingError {
    /// No error
    Ok = 0,
    /// Memory allocation error
    OutOfMemory = 1,
    /// Invalid parameter
    InvalidParam = 2,
    /// Bitstream error
    BitstreamError = 3,
    /// Unsupported feature
    UnsupportedFeature = 4,
    /// Suspended (need more data)
    Suspended = 5,
    /// User abort
    UserAbort = 6,
    /// Not enough data
    NotEnoughData = 7,
}

impl From<i32> for DecodingError {
    fn from(code: i32) -> Self {
        match code {
            0 => DecodingError::Ok,
            1 => DecodingError::OutOfMemory,
            2 => DecodingError::InvalidParam,
            3 => DecodingError::BitstreamError,
            4 => DecodingError::UnsupportedFeature,
            5 => DecodingError::Suspended,
            6 => DecodingError::UserAbort,
            _ => DecodingError::NotEnoughData,
        }
    }
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DecodingError::Ok => "ok",
            DecodingError::OutOfMemory => "out of memory",
            DecodingError::InvalidParam => "invalid param",
            DecodingError::BitstreamError => "bitstream error",
            DecodingError::UnsupportedFeature => "unsupported feature",
            DecodingError::Suspended => "suspended",
            DecodingError::UserAbort => "user abort",
            DecodingError::NotEnoughData => "not enough data",
        };
        write!(f, "{}", msg)
    }
}
