//! wav-play — stream WAV files from disk to an output device.
//!
//! ## Pipeline
//! 1. **Parse**: validate the RIFF/WAVE header and locate the data chunk.
//! 2. **Stream**: read the payload through a fixed-size buffer and write it
//!    to a blocking CPAL-backed sink at the file's sample rate.
//! 3. **Pad**: append trailing silence per the selected policy so playback
//!    ends without a click or a chopped final sample.
//!
//! A file that fails to parse or play is logged and skipped; the remaining
//! files still play.

mod cli;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::DeviceTrait;
use pcm_player::config::PlayerConfig;
use pcm_player::output::{CpalSink, PcmFormat, SinkConfig};
use pcm_player::silence::SilenceBuffer;
use pcm_player::{container, device, player};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let host = cpal::default_host();
    if args.list_devices {
        device::list_devices(&host)?;
        return Ok(());
    }

    let output = device::pick_device(&host, args.device.as_deref())?;
    tracing::info!(device = %output.description()?, "output device");

    for (i, path) in args.files.iter().enumerate() {
        if i > 0 && args.gap_ms > 0 {
            std::thread::sleep(Duration::from_millis(args.gap_ms));
        }
        if let Err(e) = play_one(&output, &args, path) {
            tracing::warn!(path = %path.display(), "skipping file: {e:#}");
        }
    }

    Ok(())
}

/// Play a single file to completion. The file handle is released on every
/// exit path when the reader drops.
fn play_one(output: &cpal::Device, args: &cli::Args, path: &Path) -> Result<()> {
    let start = Instant::now();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let header = container::parse(&mut reader)?;
    tracing::info!(
        channels = header.channel_count,
        rate_hz = header.sample_rate,
        bits = header.bits_per_sample,
        payload_bytes = header.payload_byte_length,
        "wav header"
    );

    let mut sink = CpalSink::new(
        output,
        PcmFormat::from_header(&header),
        SinkConfig {
            buffer_seconds: args.buffer_seconds,
            ..SinkConfig::default()
        },
    );

    let report = player::play(
        &mut reader,
        &header,
        &mut sink,
        args.padding.into(),
        SilenceBuffer::global(),
        &PlayerConfig {
            read_buffer_bytes: args.buffer_bytes,
            write_timeout: args.write_timeout_ms.map(Duration::from_millis),
        },
    )?;
    sink.drain();

    tracing::info!(
        path = %path.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        bytes_played = report.bytes_played,
        padding_bytes = report.padding_bytes_written,
        last_chunk_bytes = report.last_chunk_bytes,
        "playback finished"
    );
    Ok(())
}
