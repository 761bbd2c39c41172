//! The blocking PCM byte sink consumed by the player.

use std::time::Duration;

use anyhow::Result;

use crate::silence::SilenceBuffer;

/// Destination for fixed-rate PCM bytes.
///
/// Writes block until the hardware (or its queue) has accepted the bytes;
/// backpressure is inherent rather than polled. Implementations report
/// failures as `anyhow::Error` and the player attaches the failing
/// operation.
pub trait PcmSink {
    /// Prepare the sink for a stream at `sample_rate` Hz. Must be called
    /// before the first write of a stream; the player does this from the
    /// parsed header.
    fn configure(&mut self, sample_rate: u32) -> Result<()>;

    /// Write `bytes`, blocking until at least some are accepted. Returns the
    /// number of bytes taken. `timeout` bounds the wait; `None` waits
    /// indefinitely.
    fn write(&mut self, bytes: &[u8], timeout: Option<Duration>) -> Result<usize>;

    /// Write `nr_bytes` of zeros, reusing [`SilenceBuffer::global`] as the
    /// source.
    fn flush_silence(&mut self, nr_bytes: usize, timeout: Option<Duration>) -> Result<()> {
        let silence = SilenceBuffer::global();
        let mut remaining = nr_bytes;
        while remaining > 0 {
            let chunk = remaining.min(silence.len());
            let written = self.write(&silence.as_bytes()[..chunk], timeout)?;
            if written == 0 {
                anyhow::bail!("sink accepted no bytes");
            }
            remaining -= written;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSink {
        bytes: Vec<u8>,
    }

    impl PcmSink for CountingSink {
        fn configure(&mut self, _sample_rate: u32) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, bytes: &[u8], _timeout: Option<Duration>) -> Result<usize> {
            // Accept at most 100 bytes per call to exercise the loop.
            let take = bytes.len().min(100);
            self.bytes.extend_from_slice(&bytes[..take]);
            Ok(take)
        }
    }

    #[test]
    fn flush_silence_writes_exactly_requested_zeros() {
        let mut sink = CountingSink { bytes: Vec::new() };
        sink.flush_silence(250, None).unwrap();
        assert_eq!(sink.bytes.len(), 250);
        assert!(sink.bytes.iter().all(|&b| b == 0));
    }
}
