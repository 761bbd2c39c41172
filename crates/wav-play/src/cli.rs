use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use pcm_player::player::PaddingPolicy;

#[derive(Parser, Debug)]
#[command(name = "wav-play", version)]
pub struct Args {
    /// WAV files to play, in order
    #[arg(required_unless_present = "list_devices")]
    pub files: Vec<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Read buffer size in bytes
    #[arg(long, default_value_t = 8096)]
    pub buffer_bytes: usize,

    /// Sink queue target in seconds (backpressure point for writes)
    #[arg(long, default_value_t = 2.0)]
    pub buffer_seconds: f32,

    /// End-of-stream padding policy
    #[arg(long, value_enum, default_value_t = Padding::FullDouble)]
    pub padding: Padding,

    /// Max milliseconds to wait per sink write (default: wait indefinitely)
    #[arg(long)]
    pub write_timeout_ms: Option<u64>,

    /// Pause between files in milliseconds
    #[arg(long, default_value_t = 0)]
    pub gap_ms: u64,
}

/// CLI spelling of the padding policies.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding {
    /// No trailing silence
    None,
    /// One full silence buffer
    FullSingle,
    /// Two full silence buffers
    FullDouble,
    /// Top the last chunk up to one silence buffer
    ComplementSingle,
    /// Complement, then one full silence buffer
    ComplementThenFull,
}

impl From<Padding> for PaddingPolicy {
    fn from(value: Padding) -> Self {
        match value {
            Padding::None => PaddingPolicy::None,
            Padding::FullSingle => PaddingPolicy::FullSingle,
            Padding::FullDouble => PaddingPolicy::FullDouble,
            Padding::ComplementSingle => PaddingPolicy::ComplementSingle,
            Padding::ComplementThenFull => PaddingPolicy::ComplementThenFull,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_files_and_policy() {
        let args = Args::try_parse_from([
            "wav-play",
            "--padding",
            "complement-single",
            "--gap-ms",
            "3000",
            "a.wav",
            "b.wav",
        ])
        .unwrap();
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.padding, Padding::ComplementSingle);
        assert_eq!(args.gap_ms, 3000);
        assert_eq!(
            PaddingPolicy::from(args.padding),
            PaddingPolicy::ComplementSingle
        );
    }

    #[test]
    fn list_devices_needs_no_files() {
        let args = Args::try_parse_from(["wav-play", "--list-devices"]).unwrap();
        assert!(args.list_devices);
        assert!(args.files.is_empty());
    }

    #[test]
    fn files_are_required_otherwise() {
        assert!(Args::try_parse_from(["wav-play"]).is_err());
    }
}
