//! Streaming playback engine.
//!
//! Drives the read-buffer/write-sink loop for one payload: zero the reused
//! buffer, fill it from the stream, write exactly the bytes read, stop on a
//! short or empty read, then append silence per the configured padding
//! policy. One parameterized loop replaces the family of hand-tuned
//! variants that differ only in padding behavior.

use std::io::{self, Read};

use crate::config::PlayerConfig;
use crate::container::ContainerHeader;
use crate::error::PlayError;
use crate::silence::SilenceBuffer;
use crate::sink::PcmSink;

/// How much trailing silence to write once the payload is exhausted.
///
/// Output pipelines buffer ahead of the hardware; ending a stream exactly at
/// the last sample leaves that buffered tail to be chopped off or followed
/// by a click. Which policy sounds clean depends on the sink's buffering
/// depth, so the choice stays with the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaddingPolicy {
    /// No trailing write.
    None,
    /// One full silence-buffer write.
    FullSingle,
    /// Two full silence-buffer writes.
    FullDouble,
    /// Top the final short chunk up to one full silence buffer:
    /// `silence_len - last_chunk_bytes` zeros.
    ComplementSingle,
    /// [`PaddingPolicy::ComplementSingle`] followed by one full
    /// silence-buffer write.
    ComplementThenFull,
}

impl PaddingPolicy {
    /// Lengths of the individual padding writes for this policy, given the
    /// silence buffer size and the size of the final short chunk (0 when the
    /// payload ended exactly on a buffer boundary). Zero-length writes are
    /// elided.
    fn write_lengths(self, silence_len: usize, last_chunk_bytes: usize) -> Vec<usize> {
        let complement = silence_len.saturating_sub(last_chunk_bytes);
        let lengths: Vec<usize> = match self {
            PaddingPolicy::None => vec![],
            PaddingPolicy::FullSingle => vec![silence_len],
            PaddingPolicy::FullDouble => vec![silence_len, silence_len],
            PaddingPolicy::ComplementSingle => vec![complement],
            PaddingPolicy::ComplementThenFull => vec![complement, silence_len],
        };
        lengths.into_iter().filter(|&n| n > 0).collect()
    }
}

/// Diagnostics from one completed playback call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayReport {
    /// Payload bytes read and written to the sink.
    pub bytes_played: u64,
    /// Zero bytes appended by the padding policy.
    pub padding_bytes_written: u64,
    /// Writes of a completely filled read buffer.
    pub full_writes: u32,
    /// Writes of a final, shorter chunk (0 or 1).
    pub short_writes: u32,
    /// Size of the final short chunk; 0 if the payload ended on a buffer
    /// boundary.
    pub last_chunk_bytes: usize,
}

/// Per-call state, owned exclusively by one `play` invocation.
struct PlaybackSession {
    read_buffer: Vec<u8>,
    bytes_consumed_total: u64,
    last_chunk_bytes: usize,
    full_writes: u32,
    short_writes: u32,
}

impl PlaybackSession {
    fn new(read_buffer_bytes: usize) -> Self {
        Self {
            read_buffer: vec![0u8; read_buffer_bytes.max(1)],
            bytes_consumed_total: 0,
            last_chunk_bytes: 0,
            full_writes: 0,
            short_writes: 0,
        }
    }
}

/// Stream `header.payload_byte_length` bytes from `stream` to `sink`, then
/// apply `policy` using `silence` as the zero source.
///
/// The sink is configured for the header's sample rate before the first
/// write. Reads never run past the declared payload length, so trailing
/// chunks after the data chunk are not played as audio. Any read or write
/// failure aborts immediately; the caller owns closing the stream on every
/// exit path.
pub fn play<R, S>(
    stream: &mut R,
    header: &ContainerHeader,
    sink: &mut S,
    policy: PaddingPolicy,
    silence: &SilenceBuffer,
    config: &PlayerConfig,
) -> Result<PlayReport, PlayError>
where
    R: Read,
    S: PcmSink + ?Sized,
{
    sink.configure(header.sample_rate)
        .map_err(|cause| PlayError::SinkConfigureFailed { cause })?;

    let mut session = PlaybackSession::new(config.read_buffer_bytes);
    let capacity = session.read_buffer.len();
    let mut payload = stream.take(u64::from(header.payload_byte_length));

    tracing::debug!(
        rate_hz = header.sample_rate,
        payload_bytes = header.payload_byte_length,
        buffer_bytes = capacity,
        "playback start"
    );

    loop {
        // A short final read must not carry trailing bytes from an earlier,
        // longer read into the sink, so the zero-fill is unconditional.
        session.read_buffer.fill(0);

        let nr_bytes = read_full(&mut payload, &mut session.read_buffer)
            .map_err(PlayError::StreamReadFailed)?;
        if nr_bytes == 0 {
            break;
        }

        write_all(sink, &session.read_buffer[..nr_bytes], config.write_timeout)?;
        session.bytes_consumed_total += nr_bytes as u64;

        if nr_bytes < capacity {
            session.last_chunk_bytes = nr_bytes;
            session.short_writes += 1;
            tracing::debug!(nr_bytes_read = nr_bytes, "last chunk read, ceasing payload reads");
            break;
        }
        session.full_writes += 1;
    }

    let mut padding_bytes_written = 0u64;
    for length in policy.write_lengths(silence.len(), session.last_chunk_bytes) {
        write_all(sink, &silence.as_bytes()[..length], config.write_timeout)?;
        padding_bytes_written += length as u64;
    }

    Ok(PlayReport {
        bytes_played: session.bytes_consumed_total,
        padding_bytes_written,
        full_writes: session.full_writes,
        short_writes: session.short_writes,
        last_chunk_bytes: session.last_chunk_bytes,
    })
}

/// Fill `buf` as far as the stream allows, `fread`-style: a return shorter
/// than the buffer means the stream is exhausted, not that a retry is due.
fn read_full<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn write_all<S: PcmSink + ?Sized>(
    sink: &mut S,
    mut bytes: &[u8],
    timeout: Option<std::time::Duration>,
) -> Result<(), PlayError> {
    while !bytes.is_empty() {
        let written = sink
            .write(bytes, timeout)
            .map_err(|cause| PlayError::SinkWriteFailed { cause })?;
        if written == 0 {
            return Err(PlayError::SinkWriteFailed {
                cause: anyhow::anyhow!("sink accepted no bytes"),
            });
        }
        bytes = &bytes[written..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    /// Sink that records every accepted write.
    #[derive(Default)]
    struct RecordingSink {
        configured_rate: Option<u32>,
        writes: Vec<Vec<u8>>,
        fail_configure: bool,
        fail_writes: bool,
    }

    impl PcmSink for RecordingSink {
        fn configure(&mut self, sample_rate: u32) -> anyhow::Result<()> {
            if self.fail_configure {
                anyhow::bail!("device gone");
            }
            self.configured_rate = Some(sample_rate);
            Ok(())
        }

        fn write(&mut self, bytes: &[u8], _timeout: Option<Duration>) -> anyhow::Result<usize> {
            if self.fail_writes {
                anyhow::bail!("device gone");
            }
            self.writes.push(bytes.to_vec());
            Ok(bytes.len())
        }
    }

    fn header(payload_len: u32) -> ContainerHeader {
        ContainerHeader {
            format_tag: 1,
            channel_count: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            payload_byte_length: payload_len,
        }
    }

    fn config(buffer: usize) -> PlayerConfig {
        PlayerConfig {
            read_buffer_bytes: buffer,
            write_timeout: None,
        }
    }

    #[test]
    fn exact_multiple_payload_is_all_full_writes() {
        let payload: Vec<u8> = (0..24u8).collect();
        let mut sink = RecordingSink::default();
        let silence = SilenceBuffer::new(8);

        let report = play(
            &mut Cursor::new(payload.clone()),
            &header(24),
            &mut sink,
            PaddingPolicy::None,
            &silence,
            &config(8),
        )
        .unwrap();

        assert_eq!(report.full_writes, 3);
        assert_eq!(report.short_writes, 0);
        assert_eq!(report.last_chunk_bytes, 0);
        assert_eq!(report.bytes_played, 24);
        assert_eq!(report.padding_bytes_written, 0);
        assert_eq!(sink.writes.len(), 3);
        assert_eq!(sink.writes.concat(), payload);
        assert_eq!(sink.configured_rate, Some(16_000));
    }

    #[test]
    fn short_final_write_carries_only_bytes_read() {
        let payload: Vec<u8> = (1..=20u8).collect();
        let mut sink = RecordingSink::default();
        let silence = SilenceBuffer::new(8);

        let report = play(
            &mut Cursor::new(payload.clone()),
            &header(20),
            &mut sink,
            PaddingPolicy::None,
            &silence,
            &config(8),
        )
        .unwrap();

        assert_eq!(report.full_writes, 2);
        assert_eq!(report.short_writes, 1);
        assert_eq!(report.last_chunk_bytes, 4);
        assert_eq!(sink.writes.len(), 3);
        assert_eq!(sink.writes[2], payload[16..]);
    }

    #[test]
    fn reads_stop_at_declared_payload_length() {
        // Trailing garbage after the declared payload must never be played.
        let mut bytes: Vec<u8> = (0..10u8).collect();
        bytes.extend_from_slice(&[0xAA; 32]);
        let mut sink = RecordingSink::default();
        let silence = SilenceBuffer::new(8);

        let report = play(
            &mut Cursor::new(bytes),
            &header(10),
            &mut sink,
            PaddingPolicy::None,
            &silence,
            &config(8),
        )
        .unwrap();

        assert_eq!(report.bytes_played, 10);
        assert_eq!(sink.writes.concat(), (0..10u8).collect::<Vec<u8>>());
    }

    #[test]
    fn complement_single_tops_up_last_chunk() {
        // 8000-byte payload, 8096-byte buffer and silence: one read of 8000,
        // one write of 8000, one padding write of 96 zeros.
        let payload = vec![1u8; 8000];
        let mut sink = RecordingSink::default();
        let silence = SilenceBuffer::new(8096);

        let report = play(
            &mut Cursor::new(payload),
            &header(8000),
            &mut sink,
            PaddingPolicy::ComplementSingle,
            &silence,
            &config(8096),
        )
        .unwrap();

        assert_eq!(sink.writes.len(), 2);
        assert_eq!(sink.writes[0].len(), 8000);
        assert_eq!(sink.writes[1].len(), 96);
        assert!(sink.writes[1].iter().all(|&b| b == 0));
        assert_eq!(report.padding_bytes_written, 96);
    }

    #[test]
    fn full_double_writes_two_silence_buffers() {
        let mut sink = RecordingSink::default();
        let silence = SilenceBuffer::new(64);

        let report = play(
            &mut Cursor::new(vec![7u8; 10]),
            &header(10),
            &mut sink,
            PaddingPolicy::FullDouble,
            &silence,
            &config(16),
        )
        .unwrap();

        assert_eq!(report.padding_bytes_written, 128);
        assert_eq!(sink.writes.len(), 3);
        assert_eq!(sink.writes[1].len(), 64);
        assert_eq!(sink.writes[2].len(), 64);
        assert!(sink.writes[1..].iter().flatten().all(|&b| b == 0));
    }

    #[test]
    fn complement_then_full_pads_complement_plus_buffer() {
        let mut sink = RecordingSink::default();
        let silence = SilenceBuffer::new(32);

        let report = play(
            &mut Cursor::new(vec![7u8; 20]),
            &header(20),
            &mut sink,
            PaddingPolicy::ComplementThenFull,
            &silence,
            &config(32),
        )
        .unwrap();

        // 32 - 20 = 12 complement, then one full 32-byte buffer.
        assert_eq!(report.padding_bytes_written, 44);
        assert_eq!(sink.writes[1].len(), 12);
        assert_eq!(sink.writes[2].len(), 32);
    }

    #[test]
    fn zero_length_payload_writes_padding_only() {
        let mut sink = RecordingSink::default();
        let silence = SilenceBuffer::new(16);

        let report = play(
            &mut Cursor::new(Vec::new()),
            &header(0),
            &mut sink,
            PaddingPolicy::FullSingle,
            &silence,
            &config(8),
        )
        .unwrap();

        assert_eq!(report.bytes_played, 0);
        assert_eq!(report.full_writes, 0);
        assert_eq!(report.short_writes, 0);
        assert_eq!(report.padding_bytes_written, 16);
        assert_eq!(sink.writes.len(), 1);
    }

    #[test]
    fn none_policy_writes_no_padding() {
        let mut sink = RecordingSink::default();
        let silence = SilenceBuffer::new(16);

        let report = play(
            &mut Cursor::new(vec![1u8; 8]),
            &header(8),
            &mut sink,
            PaddingPolicy::None,
            &silence,
            &config(8),
        )
        .unwrap();

        assert_eq!(report.padding_bytes_written, 0);
        assert_eq!(sink.writes.len(), 1);
    }

    #[test]
    fn payload_ending_on_boundary_gets_full_complement() {
        // The loop exits on the empty follow-up read, so the "last chunk"
        // is zero bytes and the complement is one whole silence buffer.
        let mut sink = RecordingSink::default();
        let silence = SilenceBuffer::new(16);

        let report = play(
            &mut Cursor::new(vec![1u8; 16]),
            &header(16),
            &mut sink,
            PaddingPolicy::ComplementSingle,
            &silence,
            &config(16),
        )
        .unwrap();

        assert_eq!(report.last_chunk_bytes, 0);
        assert_eq!(report.padding_bytes_written, 16);
    }

    #[test]
    fn configure_failure_surfaces_before_any_read() {
        let mut sink = RecordingSink {
            fail_configure: true,
            ..Default::default()
        };
        let silence = SilenceBuffer::new(16);

        let err = play(
            &mut Cursor::new(vec![1u8; 8]),
            &header(8),
            &mut sink,
            PaddingPolicy::None,
            &silence,
            &config(8),
        )
        .unwrap_err();

        assert!(matches!(err, PlayError::SinkConfigureFailed { .. }));
        assert!(sink.writes.is_empty());
    }

    #[test]
    fn write_failure_aborts_loop() {
        let mut sink = RecordingSink {
            fail_writes: true,
            ..Default::default()
        };
        let silence = SilenceBuffer::new(16);

        let err = play(
            &mut Cursor::new(vec![1u8; 8]),
            &header(8),
            &mut sink,
            PaddingPolicy::None,
            &silence,
            &config(8),
        )
        .unwrap_err();

        assert!(matches!(err, PlayError::SinkWriteFailed { .. }));
    }

    #[test]
    fn read_failure_surfaces_underlying_cause() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk detached"))
            }
        }

        let mut sink = RecordingSink::default();
        let silence = SilenceBuffer::new(16);

        let err = play(
            &mut FailingReader,
            &header(8),
            &mut sink,
            PaddingPolicy::None,
            &silence,
            &config(8),
        )
        .unwrap_err();

        assert!(matches!(err, PlayError::StreamReadFailed(_)));
    }

    #[test]
    fn write_lengths_per_policy() {
        assert!(PaddingPolicy::None.write_lengths(100, 40).is_empty());
        assert_eq!(PaddingPolicy::FullSingle.write_lengths(100, 40), vec![100]);
        assert_eq!(
            PaddingPolicy::FullDouble.write_lengths(100, 40),
            vec![100, 100]
        );
        assert_eq!(
            PaddingPolicy::ComplementSingle.write_lengths(100, 40),
            vec![60]
        );
        assert_eq!(
            PaddingPolicy::ComplementThenFull.write_lengths(100, 40),
            vec![60, 100]
        );
        // A last chunk that already fills the buffer elides the complement.
        assert_eq!(
            PaddingPolicy::ComplementThenFull.write_lengths(100, 100),
            vec![100]
        );
    }
}
