//! WAV container header parsing.
//!
//! Reads the fixed RIFF/WAVE prefix, skips any non-data chunks (LIST, fact,
//! cue and friends may appear before the data chunk), validates the format
//! fields against what the output path supports, and leaves the stream
//! cursor at the first payload byte.

use std::io::{self, Read};

use crate::error::ParseError;

const RIFF_ID: [u8; 4] = *b"RIFF";
const WAVE_ID: [u8; 4] = *b"WAVE";
const FMT_ID: [u8; 3] = *b"fmt";
const DATA_ID: [u8; 4] = *b"data";

/// Hard ceiling imposed by the fixed-function output path, not by the
/// container format itself.
pub const MAX_SAMPLE_RATE_HZ: u32 = 48_000;

/// Required declared size of the format chunk for plain PCM.
const FMT_CHUNK_SIZE: u32 = 16;

/// Fixed prefix: RIFF descriptor + format chunk + first chunk descriptor.
const PREFIX_LEN: usize = 44;

/// Validated WAV header. All fields are populated together or the whole
/// header is rejected; there is no partially valid state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerHeader {
    /// PCM format tag; always 1 after a successful parse.
    pub format_tag: u16,
    /// 1 (mono) or 2 (stereo).
    pub channel_count: u16,
    /// Sample rate in Hz, at most [`MAX_SAMPLE_RATE_HZ`].
    pub sample_rate: u32,
    /// 8 or 16.
    pub bits_per_sample: u16,
    /// Declared size of the sample data region in bytes.
    pub payload_byte_length: u32,
}

impl ContainerHeader {
    /// Bytes per interleaved sample frame.
    pub fn block_align(&self) -> usize {
        self.channel_count as usize * (self.bits_per_sample as usize / 8)
    }
}

/// One chunk descriptor as read while scanning: 4-byte id + LE size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub id: [u8; 4],
    pub size: u32,
}

impl ChunkDescriptor {
    fn from_bytes(bytes: [u8; 8]) -> Self {
        Self {
            id: [bytes[0], bytes[1], bytes[2], bytes[3]],
            size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    fn is_data(&self) -> bool {
        self.id == DATA_ID
    }
}

/// Parse a WAV header from `stream`.
///
/// On success the cursor sits exactly at the first payload byte; read the
/// next `payload_byte_length` bytes to get the raw samples. After a failure
/// the cursor position is unspecified and the stream must be treated as
/// unusable.
pub fn parse<R: Read + ?Sized>(stream: &mut R) -> Result<ContainerHeader, ParseError> {
    let mut prefix = [0u8; PREFIX_LEN];
    stream
        .read_exact(&mut prefix)
        .map_err(ParseError::StreamReadFailed)?;

    let riff = field4(&prefix, 0);
    let wave = field4(&prefix, 8);
    let fmt_id = field4(&prefix, 12);
    let fmt_size = u32::from_le_bytes([prefix[16], prefix[17], prefix[18], prefix[19]]);
    let format_tag = u16::from_le_bytes([prefix[20], prefix[21]]);
    let channel_count = u16::from_le_bytes([prefix[22], prefix[23]]);
    let sample_rate = u32::from_le_bytes([prefix[24], prefix[25], prefix[26], prefix[27]]);
    // Byte rate (28..32) and block align (32..34) are informational only.
    let bits_per_sample = u16::from_le_bytes([prefix[34], prefix[35]]);

    if riff != RIFF_ID {
        return Err(ParseError::NotOuterContainer { found: riff });
    }
    if wave != WAVE_ID {
        return Err(ParseError::NotContainerType { found: wave });
    }
    // Only the first three bytes are significant ("fmt " carries a space).
    if fmt_id[..3] != FMT_ID {
        return Err(ParseError::FormatChunkMissing { found: fmt_id });
    }

    // Chunk order is not fixed in this container format: metadata chunks may
    // sit between the format chunk and the data chunk. Skip by declared size
    // until the data chunk turns up.
    let mut chunk = ChunkDescriptor::from_bytes([
        prefix[36], prefix[37], prefix[38], prefix[39], prefix[40], prefix[41], prefix[42],
        prefix[43],
    ]);
    while !chunk.is_data() {
        tracing::debug!(
            id = %String::from_utf8_lossy(&chunk.id),
            size = chunk.size,
            "skipping WAV chunk"
        );
        skip_bytes(stream, u64::from(chunk.size))?;
        chunk = read_descriptor(stream)?;
    }

    if format_tag != 1 {
        return Err(ParseError::UnsupportedFormatTag { tag: format_tag });
    }
    if fmt_size != FMT_CHUNK_SIZE {
        return Err(ParseError::InvalidFormatChunkSize { size: fmt_size });
    }
    if channel_count != 1 && channel_count != 2 {
        return Err(ParseError::InvalidChannelCount {
            channels: channel_count,
        });
    }
    if sample_rate > MAX_SAMPLE_RATE_HZ {
        return Err(ParseError::SampleRateTooHigh { rate: sample_rate });
    }
    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(ParseError::UnsupportedBitDepth {
            bits: bits_per_sample,
        });
    }

    Ok(ContainerHeader {
        format_tag,
        channel_count,
        sample_rate,
        bits_per_sample,
        payload_byte_length: chunk.size,
    })
}

fn field4(prefix: &[u8], at: usize) -> [u8; 4] {
    [prefix[at], prefix[at + 1], prefix[at + 2], prefix[at + 3]]
}

/// Advance the stream past a skippable chunk's contents.
///
/// Running out of bytes here means the declared chunk sizes walked past the
/// end of the stream without a data chunk.
fn skip_bytes<R: Read + ?Sized>(stream: &mut R, nr_bytes: u64) -> Result<(), ParseError> {
    match io::copy(&mut stream.take(nr_bytes), &mut io::sink()) {
        Ok(copied) if copied == nr_bytes => Ok(()),
        Ok(_) => Err(ParseError::DataChunkNotFound),
        Err(e) => Err(ParseError::StreamReadFailed(e)),
    }
}

fn read_descriptor<R: Read + ?Sized>(stream: &mut R) -> Result<ChunkDescriptor, ParseError> {
    let mut bytes = [0u8; 8];
    match stream.read_exact(&mut bytes) {
        Ok(()) => Ok(ChunkDescriptor::from_bytes(bytes)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ParseError::DataChunkNotFound),
        Err(e) => Err(ParseError::StreamReadFailed(e)),
    }
}
