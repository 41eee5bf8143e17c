use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{Playlist, QueueSnapshot};

pub const QUEUE_FILE: &str = "queue.json";
pub const PLAYLISTS_FILE: &str = "playlists.json";
/// Combined store written by earlier releases; holds playlists under a
/// wrapping `state` object.
pub const LEGACY_STORE_FILE: &str = "legacy-store.json";

/// Flat-file JSON persistence, one file per concern. Writes are whole-file
/// and last-write-wins; reads treat missing or corrupt files as "no data".
pub struct Storage {
    dir: PathBuf,
}

/// Outcome of the one-time legacy migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: bool,
}

#[derive(Deserialize)]
struct LegacyStore {
    state: LegacyState,
}

#[derive(Deserialize)]
struct LegacyState {
    #[serde(default)]
    playlists: Vec<Playlist>,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory {:?}", self.dir))?;
        let json = serde_json::to_string_pretty(value).context("Failed to serialize")?;
        let path = self.file_path(name);
        fs::write(&path, json).with_context(|| format!("Failed to write {path:?}"))?;
        log::debug!("wrote {name}");
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.file_path(name);
        if !path.exists() {
            return None;
        }
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Failed to read {name}: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring corrupt {name}: {e}");
                None
            }
        }
    }

    pub fn save_queue(&self, snapshot: &QueueSnapshot) -> Result<()> {
        self.write_json(QUEUE_FILE, snapshot)
    }

    pub fn load_queue(&self) -> Option<QueueSnapshot> {
        self.read_json(QUEUE_FILE)
    }

    pub fn save_playlists(&self, playlists: &[Playlist]) -> Result<()> {
        self.write_json(PLAYLISTS_FILE, &playlists)
    }

    pub fn load_playlists(&self) -> Option<Vec<Playlist>> {
        self.read_json(PLAYLISTS_FILE)
    }

    /// One-time migration out of the legacy combined store: extract its
    /// playlists into `playlists.json` and delete the legacy blob, but only
    /// when the blob has data and `playlists.json` does not exist yet.
    pub fn migrate(&self) -> MigrationReport {
        if self.file_path(PLAYLISTS_FILE).exists() {
            return MigrationReport { migrated: false };
        }
        let Some(legacy) = self.read_json::<LegacyStore>(LEGACY_STORE_FILE) else {
            return MigrationReport { migrated: false };
        };
        if legacy.state.playlists.is_empty() {
            return MigrationReport { migrated: false };
        }
        let count = legacy.state.playlists.len();
        if let Err(e) = self.write_json(PLAYLISTS_FILE, &legacy.state.playlists) {
            log::error!("Migration failed, keeping legacy store: {e:#}");
            return MigrationReport { migrated: false };
        }
        if let Err(e) = fs::remove_file(self.file_path(LEGACY_STORE_FILE)) {
            log::warn!("Migrated but could not remove legacy store: {e}");
        }
        log::info!("Migrated {count} playlist(s) from the legacy store");
        MigrationReport { migrated: true }
    }
}
