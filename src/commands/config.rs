use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BuilderError, Result};
use crate::tree::ConflictPolicy;
use crate::util::expand_tilde;

const BACKEND_URL_ENV: &str = "CODEPLAY_BACKEND_URL";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    pub name: String,
    pub path: String,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeplayConfig {
    pub version: u32,
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
    #[serde(default)]
    pub archive_directory_entries: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_project: Option<String>,
}

fn default_backend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_archive_name() -> String {
    "project-files.zip".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_response_bytes() -> u64 {
    8 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for CodeplayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            backend_url: default_backend_url(),
            conflict_policy: ConflictPolicy::default(),
            archive_name: default_archive_name(),
            archive_directory_entries: false,
            request_timeout_secs: default_request_timeout_secs(),
            max_response_bytes: default_max_response_bytes(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            projects: vec![],
            last_active_project: None,
        }
    }
}

impl CodeplayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Environment overrides win over the file.
    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend_url = url.trim().to_string();
            }
        }
        self
    }
}

/// Default location: `~/.codeplay/config.json`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".codeplay").join("config.json"))
}

/// Reads the config file, `None` if it is missing or unreadable.
pub fn read_config(path: &Path) -> Option<CodeplayConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring unreadable config: {e}");
            None
        }
    }
}

/// Loads the effective config: file (explicit or default path), then
/// defaults, then environment overrides.
pub fn load_config(path: Option<&Path>) -> CodeplayConfig {
    let path = path.map(Path::to_path_buf).or_else(config_path);
    path.as_deref()
        .and_then(read_config)
        .unwrap_or_default()
        .apply_env()
}

/// Records a project in the config file, upserting by path.
pub fn save_project(path: Option<&Path>, project: ProjectEntry) -> Result<CodeplayConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(config_path)
        .ok_or_else(|| BuilderError::Custom("Cannot find home directory".into()))?;

    let mut config = read_config(&path).unwrap_or_default();

    // Expand tilde so paths are always absolute
    let mut project = project;
    project.path = expand_tilde(&project.path);

    if let Some(existing) = config.projects.iter_mut().find(|p| p.path == project.path) {
        existing.name = project.name.clone();
    } else {
        config.projects.push(project.clone());
    }
    config.last_active_project = Some(project.path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = read_config(&dir.path().join("nope.json")).unwrap_or_default();
        assert_eq!(config.backend_url, "http://localhost:3000");
        assert_eq!(config.conflict_policy, ConflictPolicy::Coerce);
        assert_eq!(config.archive_name, "project-files.zip");
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"version": 1, "conflictPolicy": "reject", "archiveName": "site.zip"}"#)
            .unwrap();

        let config = read_config(&path).unwrap();
        assert_eq!(config.conflict_policy, ConflictPolicy::Reject);
        assert_eq!(config.archive_name, "site.zip");
        assert_eq!(config.log_format, "text");
    }

    #[test]
    fn env_overrides_backend_url() {
        std::env::set_var(BACKEND_URL_ENV, "http://backend.test:8080/");
        let config = CodeplayConfig::default().apply_env();
        std::env::remove_var(BACKEND_URL_ENV);
        assert_eq!(config.backend_url, "http://backend.test:8080/");
    }

    #[test]
    fn save_project_upserts_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let entry = |name: &str| ProjectEntry {
            name: name.into(),
            path: "/tmp/todo".into(),
            created_at: "1700000000".into(),
        };

        save_project(Some(&path), entry("todo")).unwrap();
        let config = save_project(Some(&path), entry("todo v2")).unwrap();

        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.projects[0].name, "todo v2");
        assert_eq!(config.last_active_project.as_deref(), Some("/tmp/todo"));
        assert_eq!(read_config(&path).unwrap(), config);
    }
}
