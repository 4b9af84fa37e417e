//! Usage: Local onboarding flag persisted next to the settings file.

use crate::shared::error::AppResult;
use crate::shared::time::now_unix_seconds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const FLAG_FILE: &str = "onboarded.json";
const FLAG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct OnboardFlag {
    schema_version: u32,
    onboarded: bool,
    marked_at_unix: i64,
}

impl Default for OnboardFlag {
    fn default() -> Self {
        Self {
            schema_version: FLAG_SCHEMA_VERSION,
            onboarded: false,
            marked_at_unix: 0,
        }
    }
}

/// File-backed record of whether this install has already completed onboarding.
#[derive(Debug, Clone)]
pub struct OnboardFlagStore {
    path: PathBuf,
}

impl OnboardFlagStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(FLAG_FILE),
        }
    }

    /// Returns `None` when no flag has ever been written or the file is unreadable.
    pub fn read(&self) -> Option<bool> {
        if !self.path.exists() {
            return None;
        }
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "failed to read onboard flag: {err}");
                return None;
            }
        };
        match serde_json::from_str::<OnboardFlag>(&content) {
            Ok(flag) => Some(flag.onboarded),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "failed to parse onboard flag: {err}");
                None
            }
        }
    }

    pub fn mark_onboarded(&self) -> AppResult<()> {
        let flag = OnboardFlag {
            schema_version: FLAG_SCHEMA_VERSION,
            onboarded: true,
            marked_at_unix: now_unix_seconds(),
        };
        let content = serde_json::to_vec_pretty(&flag)
            .map_err(|e| format!("failed to serialize onboard flag: {e}"))?;

        let tmp_path = self.path.with_file_name("onboarded.json.tmp");
        std::fs::write(&tmp_path, content)
            .map_err(|e| format!("failed to write temp onboard flag: {e}"))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| format!("failed to finalize onboard flag: {e}"))?;
        Ok(())
    }

    pub fn clear(&self) -> AppResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| format!("failed to remove onboard flag: {e}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_returns_none_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = OnboardFlagStore::new(dir.path());
        assert_eq!(store.read(), None);
    }

    #[test]
    fn mark_then_read_returns_true() {
        let dir = tempfile::tempdir().unwrap();
        let store = OnboardFlagStore::new(dir.path());
        store.mark_onboarded().unwrap();
        assert_eq!(store.read(), Some(true));
    }

    #[test]
    fn clear_removes_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = OnboardFlagStore::new(dir.path());
        store.mark_onboarded().unwrap();
        store.clear().unwrap();
        assert_eq!(store.read(), None);
        // clearing twice is a no-op
        store.clear().unwrap();
    }

    #[test]
    fn read_returns_none_on_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = OnboardFlagStore::new(dir.path());
        std::fs::write(dir.path().join("onboarded.json"), "{ not json").unwrap();
        assert_eq!(store.read(), None);
    }
}
