//! Streaming WAV playback: container parsing, a buffered read/write engine
//! with an end-of-stream padding policy, and a CPAL-backed blocking sink.

pub mod config;
pub mod container;
pub mod device;
pub mod error;
pub mod output;
pub mod player;
pub mod silence;
pub mod sink;
