//! `wernicke-server` binary: loads configuration, wires capabilities and
//! the resource supervisor, and serves the WebSocket + health endpoints.

use std::sync::Arc;
use std::time::SystemTime;

use wernicke_stream::capabilities::Capabilities;
use wernicke_stream::config::ServerConfig;
use wernicke_stream::session::SessionRegistry;
use wernicke_stream::transport::{router, ServerState};
use wernicke_stream::{ResourceSupervisor, TranscriptionPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    init_tracing(&config)?;

    if let Some(log_dir) = &config.log_dir {
        sweep_old_logs(log_dir, config.log_retention);
    }

    // Model load failures are fatal at boot (spec §4.3/§7): a real
    // `whisper`/`silero-vad` wire-up would call `WhisperRecognizer::load`
    // / `SileroVad::load` here and bail out with `?` on error before the
    // listener ever binds. The default build runs entirely on the mock
    // capabilities, which cannot fail to load.
    let capabilities = Capabilities::mock();
    let resource_supervisor = Arc::new(ResourceSupervisor::new(config.gpu_memory_budget_mb));
    let config = Arc::new(config);
    let pipeline = Arc::new(TranscriptionPipeline::new(
        capabilities,
        resource_supervisor,
        config.recognizer_language.clone(),
    ));
    let registry = SessionRegistry::new();

    let state = ServerState {
        config: config.clone(),
        pipeline,
        registry,
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn init_tracing(config: &ServerConfig) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            set_owner_only_permissions(dir);
            let file_appender = tracing_appender::rolling::daily(dir, "wernicke.log");
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            // Leaked deliberately: the guard must outlive the process to
            // flush buffered log lines, and this binary never exits early.
            std::mem::forget(guard);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    Ok(())
}

#[cfg(unix)]
fn set_owner_only_permissions(dir: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = std::fs::metadata(dir) {
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o700);
        let _ = std::fs::set_permissions(dir, permissions);
    }
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_dir: &std::path::Path) {}

/// Removes log files older than `retention` from `log_dir` (SPEC_FULL §10,
/// grounded on `original_source`'s `utils/log_retention.py`).
fn sweep_old_logs(log_dir: &std::path::Path, retention: std::time::Duration) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };

    let cutoff = SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if modified < cutoff {
            if let Err(error) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), %error, "failed to remove expired log file");
            } else {
                tracing::debug!(path = %path.display(), "removed expired log file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &std::path::Path, age: std::time::Duration) {
        let file = std::fs::File::create(path).unwrap();
        let modified = SystemTime::now().checked_sub(age).unwrap();
        file.set_modified(modified).unwrap();
    }

    #[test]
    fn sweep_removes_only_files_older_than_retention() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("wernicke.log.2020-01-01");
        let fresh = dir.path().join("wernicke.log.2026-07-28");
        touch(&stale, std::time::Duration::from_secs(60 * 60 * 24 * 30));
        touch(&fresh, std::time::Duration::from_secs(1));

        sweep_old_logs(dir.path(), std::time::Duration::from_secs(60 * 60 * 24 * 7));

        assert!(!stale.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn sweep_on_missing_dir_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        sweep_old_logs(&missing, std::time::Duration::from_secs(1));
    }
}
