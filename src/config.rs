//! Boot-time server configuration
//!
//! Every field here is fixed for the lifetime of the process: tuning it
//! changes validator bounds and flush policy, but it is never read per
//! request (spec §6 "Configuration").

use std::net::SocketAddr;
use std::time::Duration;

/// Sample format carried on the wire: 16 kHz, mono, 32-bit float, no header.
pub const SAMPLE_RATE: u32 = 16_000;
pub const CHANNELS: u32 = 1;
pub const BYTES_PER_SAMPLE: u32 = 4;
pub const FRAME_SIZE: u32 = CHANNELS * BYTES_PER_SAMPLE;
pub const BYTES_PER_SECOND: u32 = SAMPLE_RATE * FRAME_SIZE;

/// Server-wide configuration, assembled once at boot and shared by `Arc`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the transport binds to.
    pub bind_addr: SocketAddr,
    /// Hard ceiling on a single session buffer (spec §3, default 30s).
    pub max_buffer_duration: Duration,
    /// Silence required to trigger a VAD-driven flush (spec §4.2, default 2.0s).
    pub silence_threshold: Duration,
    /// Minimum buffer size before silence is allowed to trigger a flush
    /// (spec §4.2, default 5.0s). Guards against under-conditioning the recognizer.
    pub min_buffer_duration: Duration,
    /// Fixed recognizer language (spec §4.3, default "ja").
    pub recognizer_language: String,
    /// GPU memory budget the resource supervisor enforces (megabytes).
    pub gpu_memory_budget_mb: u64,
    /// Directory session logs are written under; `None` disables file logging.
    pub log_dir: Option<std::path::PathBuf>,
    /// Log retention window (spec §6, default 30 days).
    pub log_retention: Duration,
}

impl ServerConfig {
    /// Maximum number of bytes a single chunk (or flushed buffer) may carry.
    pub fn max_buffer_bytes(&self) -> usize {
        (self.max_buffer_duration.as_secs_f64() * BYTES_PER_SECOND as f64) as usize
    }

    /// Minimum number of bytes a buffer must reach before silence can flush it.
    pub fn min_buffer_bytes(&self) -> usize {
        (self.min_buffer_duration.as_secs_f64() * BYTES_PER_SECOND as f64) as usize
    }

    /// Builds configuration from environment variables, falling back to the
    /// documented defaults for anything unset. Mirrors the `...Config::default()`
    /// + override idiom used throughout the capability modules.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(addr) = std::env::var("WERNICKE_BIND_ADDR") {
            if let Ok(parsed) = addr.parse() {
                cfg.bind_addr = parsed;
            }
        }
        if let Ok(secs) = std::env::var("WERNICKE_SILENCE_THRESHOLD_SECS") {
            if let Ok(v) = secs.parse::<f64>() {
                cfg.silence_threshold = Duration::from_secs_f64(v);
            }
        }
        if let Ok(secs) = std::env::var("WERNICKE_MIN_BUFFER_SECS") {
            if let Ok(v) = secs.parse::<f64>() {
                cfg.min_buffer_duration = Duration::from_secs_f64(v);
            }
        }
        if let Ok(lang) = std::env::var("WERNICKE_LANGUAGE") {
            cfg.recognizer_language = lang;
        }
        if let Ok(mb) = std::env::var("WERNICKE_GPU_MEMORY_BUDGET_MB") {
            if let Ok(v) = mb.parse() {
                cfg.gpu_memory_budget_mb = v;
            }
        }
        if let Ok(dir) = std::env::var("WERNICKE_LOG_DIR") {
            cfg.log_dir = Some(std::path::PathBuf::from(dir));
        }

        cfg
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8787".parse().expect("valid default bind addr"),
            max_buffer_duration: Duration::from_secs(30),
            silence_threshold: Duration::from_secs(2),
            min_buffer_duration: Duration::from_secs(5),
            recognizer_language: "ja".to_string(),
            gpu_memory_budget_mb: 4096,
            log_dir: None,
            log_retention: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_max_buffer_bytes_matches_spec_constant() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.max_buffer_bytes(), 1_920_000);
    }

    #[test]
    fn default_min_buffer_bytes_is_five_seconds() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.min_buffer_bytes(), 320_000);
    }
}
