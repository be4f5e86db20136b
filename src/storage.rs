//! File-backed local store holding the timer record and task lists.

use crate::bridge::{Issue, RecentTask};
use crate::timer::TimerState;
use fs2::FileExt;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

pub const STORE_IN_USE_MESSAGE: &str =
    "Timer state is owned by another gitlab-timer session. Run the command there or stop it first.";

/// Everything the coordinator persists between runs, keyed the way views read it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalData {
    pub timer_state: TimerState,
    pub recent_tasks: Vec<RecentTask>,
    pub favorites: Vec<Issue>,
}

/// Loads and saves `LocalData` as a JSON document in the platform data directory.
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Creates a store bound to the platform-specific data path.
    pub fn new() -> Result<Self, String> {
        let dirs = directories::ProjectDirs::from("com", "gitlab-timer", "gitlab-timer")
            .ok_or_else(|| "Could not determine data directory".to_string())?;
        Ok(Self::at(dirs.data_dir().join("local.json")))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Loads persisted data, falling back to empty data on read/parse errors.
    pub fn load(&self) -> LocalData {
        if !self.path.exists() {
            return LocalData::default();
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                warn!("Failed to read local store: {}", err);
                return LocalData::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|err| {
            warn!("Local store is corrupt, starting empty: {}", err);
            LocalData::default()
        })
    }

    /// Writes data atomically, creating parent directories when needed.
    pub fn save(&self, data: &LocalData) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("Failed to create data directory: {err}"))?;
        }
        let content = serde_json::to_string_pretty(data)
            .map_err(|err| format!("Failed to serialize local store: {err}"))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content)
            .map_err(|err| format!("Failed to write local store: {err}"))?;
        fs::rename(&staging, &self.path)
            .map_err(|err| format!("Failed to replace local store: {err}"))
    }
}

/// Exclusive claim on a `LocalStore`, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
}

impl LocalStore {
    /// Claims the store for the caller. Fails while another owner, in this or
    /// any other process, holds the claim.
    pub fn lock(&self) -> Result<StoreLock, String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("Failed to create data directory: {err}"))?;
        }
        let lock_path = self.path.with_extension("lock");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|err| format!("Failed to open {}: {err}", lock_path.display()))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(StoreLock { _file: file }),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(STORE_IN_USE_MESSAGE.to_string())
            }
            Err(err) => Err(format!("Failed to lock {}: {err}", lock_path.display())),
        }
    }
}

#[cfg(test)]
pub(crate) fn unique_path(name: &str) -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("gitlab-timer-tests-{name}-{nanos}/local.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleanup(path: &PathBuf) {
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn load_missing_file_returns_empty_data() {
        let store = LocalStore::at(unique_path("missing"));
        assert_eq!(store.load(), LocalData::default());
    }

    #[test]
    fn save_then_load_preserves_running_timer_and_lists() {
        let path = unique_path("persist");
        let store = LocalStore::at(path.clone());
        let issue = Issue::new("Fix login", "7", "42");
        let data = LocalData {
            timer_state: TimerState {
                is_running: true,
                issue: Some(issue.clone()),
                start_time: Some(1_000),
            },
            recent_tasks: vec![RecentTask {
                issue: issue.clone(),
                last_tracked: 1_000,
                last_time_spent: 0,
            }],
            favorites: vec![issue],
        };

        store.save(&data).expect("save should succeed");
        assert_eq!(store.load(), data);

        let raw = fs::read_to_string(&path).expect("read back");
        assert!(raw.contains("\"timerState\""));
        assert!(raw.contains("\"recentTasks\""));

        cleanup(&path);
    }

    #[test]
    fn lock_admits_one_owner_at_a_time() {
        let path = unique_path("lock");
        let store = LocalStore::at(path.clone());

        let held = store.lock().expect("first lock");
        assert_eq!(
            LocalStore::at(path.clone()).lock().map(|_| ()),
            Err(STORE_IN_USE_MESSAGE.to_string())
        );

        drop(held);
        assert!(store.lock().is_ok());
        cleanup(&path);
    }

    #[test]
    fn corrupt_file_falls_back_to_empty_data() {
        let path = unique_path("corrupt");
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(&path, "{not json").expect("write");

        assert_eq!(LocalStore::at(path.clone()).load(), LocalData::default());
        cleanup(&path);
    }

    #[test]
    fn missing_keys_default_individually() {
        let path = unique_path("partial");
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(&path, r#"{"favorites":[{"title":"T","id":"1","projectId":"2"}]}"#)
            .expect("write");

        let data = LocalStore::at(path.clone()).load();
        assert_eq!(data.favorites.len(), 1);
        assert!(!data.timer_state.is_running);
        assert!(data.recent_tasks.is_empty());
        cleanup(&path);
    }
}
