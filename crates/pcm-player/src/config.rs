use std::time::Duration;

/// Streaming tuning parameters for one playback call.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Read buffer capacity in bytes. Reused across iterations and zeroed
    /// before each fill.
    pub read_buffer_bytes: usize,
    /// Maximum wait per sink write. `None` waits as long as necessary;
    /// losing samples is worse than blocking.
    pub write_timeout: Option<Duration>,
}

impl Default for PlayerConfig {
    /// Defaults matching the silence buffer size, so a complement-style
    /// padding write tops the final chunk up to one full buffer.
    fn default() -> Self {
        Self {
            read_buffer_bytes: crate::silence::SILENCE_SIZE,
            write_timeout: None,
        }
    }
}
