//! Persistent configuration model and file-backed manager.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use url::Url;

/// Environment variable overriding the configured GitLab URL.
pub const GITLAB_URL_ENV: &str = "GITLAB_TIMER_URL";

/// Default number of merged tasks shown in the popup's recent list.
fn default_popup_recent_limit() -> usize {
    5
}

/// Application settings persisted on disk. The API token lives in the keyring, not here.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub gitlab_url: Option<String>,
    #[serde(default = "default_popup_recent_limit")]
    pub popup_recent_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gitlab_url: None,
            popup_recent_limit: default_popup_recent_limit(),
        }
    }
}

impl Config {
    /// Configured GitLab URL with the environment override applied.
    pub fn effective_gitlab_url(&self) -> Option<String> {
        std::env::var(GITLAB_URL_ENV)
            .ok()
            .and_then(|value| normalize_gitlab_url(&value).ok())
            .or_else(|| self.gitlab_url.clone())
    }
}

/// Manages loading and saving of configuration to a JSON file in the platform-specific
/// config directory.
#[derive(Clone, Debug)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Creates a manager bound to the platform-specific app config path.
    pub fn new() -> Result<Self, String> {
        let dirs = directories::ProjectDirs::from("com", "gitlab-timer", "gitlab-timer")
            .ok_or_else(|| "Could not determine config directory".to_string())?;
        Ok(Self {
            path: dirs.config_dir().join("config.json"),
        })
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Reads the settings file. Missing, unreadable and malformed files all yield defaults.
    pub fn load(&self) -> Config {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Config::default(),
            Err(err) => {
                warn!("Failed to read {}: {}", self.path.display(), err);
                return Config::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|err| {
            warn!("Ignoring malformed {}: {}", self.path.display(), err);
            Config::default()
        })
    }

    /// Persists config to disk, creating parent directories when needed.
    pub fn save(&self, config: &Config) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Validates a GitLab base URL and strips trailing slashes.
pub fn normalize_gitlab_url(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("GitLab URL must not be empty".to_string());
    }
    let parsed = Url::parse(trimmed).map_err(|err| format!("Invalid GitLab URL: {err}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err("GitLab URL must use http or https".to_string());
    }
    if parsed.host_str().is_none() {
        return Err("GitLab URL must include a host".to_string());
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Origin (`scheme://host[:port]`) of a URL, used to match pages against the configured instance.
pub fn url_origin(input: &str) -> Option<String> {
    let parsed = Url::parse(input.trim()).ok()?;
    match parsed.origin() {
        origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}
