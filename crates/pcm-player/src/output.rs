//! CPAL-backed PCM sink.
//!
//! [`CpalSink`] gives the player the blocking, backpressured write semantics
//! of a hardware DMA queue: `write` pushes raw PCM bytes into a bounded
//! [`ByteQueue`] and blocks while it is full; the CPAL output callback
//! drains the queue without blocking, decodes 8-bit unsigned / 16-bit LE
//! samples to `f32`, maps mono/stereo onto the device channel count, and
//! converts to the device sample format. Underruns are filled with silence.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::container::ContainerHeader;
use crate::device;
use crate::sink::PcmSink;

/// Sample layout of the bytes written to the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    /// 1 (mono) or 2 (stereo).
    pub channels: u16,
    /// 8 (unsigned) or 16 (signed little-endian).
    pub bits_per_sample: u16,
}

impl PcmFormat {
    pub fn from_header(header: &ContainerHeader) -> Self {
        Self {
            channels: header.channel_count,
            bits_per_sample: header.bits_per_sample,
        }
    }

    /// Bytes per interleaved sample frame.
    pub fn block_align(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }
}

/// Tuning for the queue between `write` and the output callback.
#[derive(Clone, Debug)]
pub struct SinkConfig {
    /// Target queue depth in seconds of audio; this is the backpressure
    /// point for `write`.
    pub buffer_seconds: f32,
    /// Max bytes pulled from the queue per callback refill.
    pub refill_max_bytes: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            buffer_seconds: 2.0,
            refill_max_bytes: 16_384,
        }
    }
}

/// Thread-safe bounded queue of raw PCM bytes.
///
/// Single producer (the playback call), single consumer (the CPAL callback).
/// Bounded by `max_buffered_bytes` to cap memory and latency; a `done` flag
/// lives under the same mutex so close/wait interactions cannot race.
pub struct ByteQueue {
    inner: Mutex<QueueInner>,
    cv: Condvar,
    max_buffered_bytes: usize,
}

struct QueueInner {
    queue: VecDeque<u8>,
    done: bool,
}

impl ByteQueue {
    pub fn new(max_buffered_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                queue: VecDeque::new(),
                done: false,
            }),
            cv: Condvar::new(),
            max_buffered_bytes: max_buffered_bytes.max(1),
        }
    }

    /// Current buffered bytes (best-effort snapshot).
    pub fn len(&self) -> usize {
        let g = self.inner.lock().unwrap();
        g.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the queue closed and wake all waiters. Idempotent. Blocked
    /// pushes return early; the consumer may still drain buffered bytes.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.done = true;
        drop(g);
        self.cv.notify_all();
    }

    pub fn is_done(&self) -> bool {
        let g = self.inner.lock().unwrap();
        g.done
    }

    /// Push bytes, blocking while the queue is full.
    ///
    /// Returns the number of bytes accepted: all of them, or fewer if the
    /// deadline expires mid-write. Errors if the queue is closed, or if the
    /// deadline expires before any byte is accepted.
    pub fn push_blocking(&self, bytes: &[u8], timeout: Option<Duration>) -> Result<usize> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut offset = 0;

        while offset < bytes.len() {
            let mut g = self.inner.lock().unwrap();

            while g.queue.len() >= self.max_buffered_bytes && !g.done {
                match deadline {
                    None => g = self.cv.wait(g).unwrap(),
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            if offset > 0 {
                                return Ok(offset);
                            }
                            return Err(anyhow!("sink write timed out"));
                        }
                        let (ng, _) = self.cv.wait_timeout(g, deadline - now).unwrap();
                        g = ng;
                    }
                }
            }
            if g.done {
                return Err(anyhow!("sink queue closed"));
            }

            let mut pushed_any = false;
            while offset < bytes.len() && g.queue.len() < self.max_buffered_bytes {
                g.queue.push_back(bytes[offset]);
                offset += 1;
                pushed_any = true;
            }

            drop(g);
            if pushed_any {
                self.cv.notify_all();
            }
        }

        Ok(offset)
    }

    /// Append up to `max_bytes` onto `out` without blocking. Returns the
    /// number of bytes taken. Safe to call from the output callback.
    pub fn pop_nonblocking(&self, max_bytes: usize, out: &mut Vec<u8>) -> usize {
        let mut g = self.inner.lock().unwrap();
        let take = g.queue.len().min(max_bytes);
        if take == 0 {
            return 0;
        }
        out.reserve(take);
        for _ in 0..take {
            out.push(g.queue.pop_front().unwrap_or(0));
        }
        drop(g);
        self.cv.notify_all();
        take
    }

    /// Block until the consumer has drained every buffered byte.
    pub fn wait_until_empty(&self) {
        let mut g = self.inner.lock().unwrap();
        while !g.queue.is_empty() {
            g = self.cv.wait(g).unwrap();
        }
    }
}

/// Compute the queue capacity in bytes for a `(rate, block_align, seconds)`
/// target. Non-finite or non-positive seconds fall back to a safe default.
fn calc_max_buffered_bytes(rate_hz: u32, block_align: usize, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        2.0
    };

    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(block_align).max(block_align * 64)
}

struct ActiveStream {
    queue: Arc<ByteQueue>,
    // Held so the device stream keeps running; dropped to stop output.
    _stream: cpal::Stream,
    sample_rate: u32,
}

/// [`PcmSink`] implementation over a CPAL output device.
pub struct CpalSink<'d> {
    cpal_device: &'d cpal::Device,
    format: PcmFormat,
    opts: SinkConfig,
    active: Option<ActiveStream>,
}

impl<'d> CpalSink<'d> {
    /// Create a sink for `format` on `cpal_device`. No stream exists until
    /// [`PcmSink::configure`] supplies the sample rate.
    pub fn new(cpal_device: &'d cpal::Device, format: PcmFormat, opts: SinkConfig) -> Self {
        Self {
            cpal_device,
            format,
            opts,
            active: None,
        }
    }

    /// Close the queue and block until the callback has drained it, so the
    /// tail of the stream is not cut off when the sink is dropped. The sink
    /// cannot be written to afterwards.
    pub fn drain(&mut self) {
        if let Some(active) = &self.active {
            active.queue.close();
            active.queue.wait_until_empty();
            // The device ring buffer still holds the last callback's worth
            // of audio; give it time to play out.
            std::thread::sleep(Duration::from_millis(100));
        }
        self.active = None;
    }
}

impl PcmSink for CpalSink<'_> {
    fn configure(&mut self, sample_rate: u32) -> Result<()> {
        if let Some(active) = &self.active {
            if active.sample_rate == sample_rate {
                return Ok(());
            }
        }
        self.active = None;

        let supported = device::pick_output_config(self.cpal_device, sample_rate)?;
        let mut stream_config: cpal::StreamConfig = supported.clone().into();
        if let Some(buf) = device::pick_buffer_size(&supported) {
            stream_config.buffer_size = buf;
        }
        if stream_config.sample_rate != sample_rate {
            tracing::warn!(
                requested_hz = sample_rate,
                actual_hz = stream_config.sample_rate,
                "device cannot run at the stream rate; playback will be pitch-shifted"
            );
        }

        let capacity =
            calc_max_buffered_bytes(sample_rate, self.format.block_align(), self.opts.buffer_seconds);
        let queue = Arc::new(ByteQueue::new(capacity));

        let stream = build_output_stream(
            self.cpal_device,
            &stream_config,
            supported.sample_format(),
            self.format,
            &queue,
            self.opts.refill_max_bytes,
        )?;
        stream.play()?;
        tracing::info!(
            rate_hz = stream_config.sample_rate,
            channels = stream_config.channels,
            queue_bytes = capacity,
            "output stream started"
        );

        self.active = Some(ActiveStream {
            queue,
            _stream: stream,
            sample_rate,
        });
        Ok(())
    }

    fn write(&mut self, bytes: &[u8], timeout: Option<Duration>) -> Result<usize> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| anyhow!("sink not configured"))?;
        active.queue.push_blocking(bytes, timeout)
    }
}

/// Build a CPAL output stream that drains `queue`, dispatched on the device
/// sample format.
fn build_output_stream(
    cpal_device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    format: PcmFormat,
    queue: &Arc<ByteQueue>,
    refill_max_bytes: usize,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(cpal_device, config, format, queue, refill_max_bytes),
        cpal::SampleFormat::I16 => build_stream::<i16>(cpal_device, config, format, queue, refill_max_bytes),
        cpal::SampleFormat::I32 => build_stream::<i32>(cpal_device, config, format, queue, refill_max_bytes),
        cpal::SampleFormat::U16 => build_stream::<u16>(cpal_device, config, format, queue, refill_max_bytes),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    cpal_device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: PcmFormat,
    queue: &Arc<ByteQueue>,
    refill_max_bytes: usize,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let block = format.block_align();
    let refill_max_bytes = refill_max_bytes.max(block);
    let queue = queue.clone();

    // Callback-local staging buffer: whole source frames are decoded from
    // here; a partial frame at the end of `src` waits for the next refill.
    let mut src: Vec<u8> = Vec::new();
    let mut pos: usize = 0;

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = cpal_device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let frames = data.len() / channels_out;
            for frame in 0..frames {
                if pos + block > src.len() {
                    src.drain(..pos);
                    pos = 0;
                    queue.pop_nonblocking(refill_max_bytes, &mut src);
                    if src.len() < block {
                        // Underrun or end of stream: fill the rest with silence.
                        for idx in (frame * channels_out)..data.len() {
                            data[idx] = <T as cpal::Sample>::from_sample::<f32>(0.0);
                        }
                        break;
                    }
                }
                let frame_bytes = &src[pos..pos + block];
                for ch in 0..channels_out {
                    let sample = map_channel(frame_bytes, format, ch, channels_out);
                    data[frame * channels_out + ch] =
                        <T as cpal::Sample>::from_sample::<f32>(sample);
                }
                pos += block;
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Decode one source channel sample from an interleaved frame.
///
/// 8-bit WAV samples are unsigned with a 128 midpoint; 16-bit are signed
/// little-endian.
fn decode_sample(frame_bytes: &[u8], format: PcmFormat, src_ch: usize) -> f32 {
    match format.bits_per_sample {
        8 => (f32::from(frame_bytes[src_ch]) - 128.0) / 128.0,
        _ => {
            let i = src_ch * 2;
            f32::from(i16::from_le_bytes([frame_bytes[i], frame_bytes[i + 1]])) / 32_768.0
        }
    }
}

/// Map a source frame onto output channel `dst_ch`.
///
/// Mono is duplicated to every output channel; stereo to mono averages L/R;
/// extra output channels beyond stereo receive the right channel.
fn map_channel(frame_bytes: &[u8], format: PcmFormat, dst_ch: usize, dst_channels: usize) -> f32 {
    match (format.channels, dst_channels) {
        (1, _) => decode_sample(frame_bytes, format, 0),
        (2, 1) => {
            0.5 * (decode_sample(frame_bytes, format, 0) + decode_sample(frame_bytes, format, 1))
        }
        (2, _) => decode_sample(frame_bytes, format, dst_ch.min(1)),
        _ => 0.0,
    }
}
