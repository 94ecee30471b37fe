use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::{BuilderError, Result};
use crate::session::SESSION_DIR;

const LOG_ENV: &str = "CODEPLAY_LOG";
const MAX_SESSION_LOGS: usize = 10;

/// Prepares `<project>/.codeplay/logs/latest.log` for a new session.
///
/// - Creates `.codeplay/logs/` if it doesn't exist
/// - Rotates `latest.log` → `session-{timestamp}.log`
/// - Cleans up old sessions (keeps max 10)
///
/// Returns `None` if the directory can't be created; logging then goes to
/// stderr only.
pub async fn prepare_session_log(project_dir: &Path) -> Option<PathBuf> {
    let logs_dir = project_dir.join(SESSION_DIR).join("logs");

    if tokio::fs::create_dir_all(&logs_dir).await.is_err() {
        return None;
    }

    let latest = logs_dir.join("latest.log");

    if tokio::fs::try_exists(&latest).await.unwrap_or(false) {
        let rotated = logs_dir.join(format!("session-{}.log", unix_timestamp()));
        let _ = tokio::fs::rename(&latest, &rotated).await;
    }

    cleanup_old_sessions(&logs_dir).await;

    Some(latest)
}

/// Installs the global tracing subscriber: stderr (text or JSON) plus an
/// optional plain-text session file.
///
/// `CODEPLAY_LOG` takes precedence over `level`.
pub fn init_logging(level: &str, format: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| BuilderError::Custom(format!("Invalid log filter: {e}")))?;

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let json = format == "json";
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| BuilderError::Custom(format!("Logging already initialized: {e}")))
}

/// Get current Unix timestamp in seconds.
pub(crate) fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Keep only the 10 most recent `session-*.log` files.
async fn cleanup_old_sessions(logs_dir: &Path) {
    let mut entries = match tokio::fs::read_dir(logs_dir).await {
        Ok(rd) => rd,
        Err(_) => return,
    };

    let mut session_files: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with("session-") && name_str.ends_with(".log") {
            session_files.push(entry.path());
        }
    }

    // Sort by name (timestamp is embedded, so lexicographic = chronological)
    session_files.sort();

    let excess = session_files.len().saturating_sub(MAX_SESSION_LOGS);
    for oldest in &session_files[..excess] {
        let _ = tokio::fs::remove_file(oldest).await;
    }
}
