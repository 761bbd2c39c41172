//! Shared zero-filled padding buffer.
//!
//! Allocated once, never mutated, shared by every playback call. The player
//! borrows it for end-of-stream padding writes; sinks may borrow it for
//! `flush_silence`.

use std::sync::OnceLock;

/// Default silence buffer size in bytes.
pub const SILENCE_SIZE: usize = 8096;

/// Immutable all-zero byte buffer.
pub struct SilenceBuffer {
    bytes: Box<[u8]>,
}

impl SilenceBuffer {
    /// Allocate a zero-filled buffer of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len].into_boxed_slice(),
        }
    }

    /// Process-wide instance of [`SILENCE_SIZE`] bytes, created on first use
    /// and alive until shutdown.
    pub fn global() -> &'static SilenceBuffer {
        static GLOBAL: OnceLock<SilenceBuffer> = OnceLock::new();
        GLOBAL.get_or_init(|| SilenceBuffer::new(SILENCE_SIZE))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
