//! Public error taxonomy for parsing and playback.
//!
//! Each validation failure is a distinct variant so callers can tell *why* a
//! file was rejected without string matching. Sink implementations report
//! failures as `anyhow::Error`; the player wraps them with the failing
//! operation.

use std::io;

use thiserror::Error;

/// Container header rejection reasons.
///
/// All parse failures are terminal for the file: the caller should skip it
/// and move on, never retry the same bytes.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The first four bytes are not the "RIFF" tag.
    #[error("not a RIFF container (found {found:?})")]
    NotOuterContainer { found: [u8; 4] },

    /// The container type field is not "WAVE".
    #[error("not a WAVE container (found {found:?})")]
    NotContainerType { found: [u8; 4] },

    /// The format chunk id is not "fmt".
    #[error("format chunk missing (found {found:?})")]
    FormatChunkMissing { found: [u8; 4] },

    /// The stream ended while scanning chunks for the data chunk.
    #[error("data chunk not found before end of stream")]
    DataChunkNotFound,

    /// Format tag other than 1 (uncompressed linear PCM).
    #[error("unsupported format tag {tag} (only uncompressed PCM, tag 1)")]
    UnsupportedFormatTag { tag: u16 },

    /// Format chunk size other than 16.
    #[error("invalid format chunk size {size} (must be 16)")]
    InvalidFormatChunkSize { size: u32 },

    /// Channel count other than mono or stereo.
    #[error("invalid channel count {channels} (only mono or stereo permitted)")]
    InvalidChannelCount { channels: u16 },

    /// Sample rate above the 48 kHz output ceiling.
    #[error("sample rate {rate} Hz exceeds the 48000 Hz ceiling")]
    SampleRateTooHigh { rate: u32 },

    /// Bits per sample other than 8 or 16.
    #[error("unsupported bit depth {bits} (only 8 or 16 bits per sample permitted)")]
    UnsupportedBitDepth { bits: u16 },

    /// The underlying stream failed (not a format violation).
    #[error("stream read failed")]
    StreamReadFailed(#[source] io::Error),
}

/// Playback failures. All are terminal for the current call; no partial
/// retry is attempted since output timing is already disrupted.
#[derive(Debug, Error)]
pub enum PlayError {
    /// Reading payload bytes from the stream failed.
    #[error("stream read failed")]
    StreamReadFailed(#[source] io::Error),

    /// The sink rejected or failed a write.
    #[error("sink write failed: {cause:#}")]
    SinkWriteFailed { cause: anyhow::Error },

    /// The sink could not be configured for the header's sample rate.
    #[error("sink configure failed: {cause:#}")]
    SinkConfigureFailed { cause: anyhow::Error },
}
