use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::storage::Storage;
use crate::types::{Playlist, Song};

/// How "load playlist to queue" treats the existing queue contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Append,
    Replace,
}

/// User-created playlists, CRUD'd independently of the queue. Mutations are
/// mirrored into `playlists.json` the same fire-and-forget way the queue
/// persists itself.
pub struct PlaylistStore {
    playlists: Vec<Playlist>,
    storage: Option<Arc<Storage>>,
    persist: bool,
}

impl PlaylistStore {
    pub fn new() -> Self {
        Self {
            playlists: Vec::new(),
            storage: None,
            persist: false,
        }
    }

    /// Load persisted playlists (if any) and persist every mutation.
    pub fn with_storage(storage: Arc<Storage>) -> Self {
        let playlists = storage.load_playlists().unwrap_or_default();
        log::info!("Loaded {} playlist(s)", playlists.len());
        Self {
            playlists,
            storage: Some(storage),
            persist: true,
        }
    }

    pub fn create(&mut self, name: &str) -> Playlist {
        let playlist = Playlist {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            songs: Vec::new(),
            created_at: Utc::now().timestamp_millis(),
        };
        log::info!("Created playlist \"{}\" ({})", playlist.name, playlist.id);
        self.playlists.push(playlist.clone());
        self.persist_all();
        playlist
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.playlists.len();
        self.playlists.retain(|p| p.id != id);
        let deleted = self.playlists.len() != before;
        if deleted {
            self.persist_all();
        }
        deleted
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        let Some(playlist) = self.playlists.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        playlist.name = name.to_string();
        self.persist_all();
        true
    }

    pub fn add_song(&mut self, id: &str, song: Song) -> bool {
        let Some(playlist) = self.playlists.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        playlist.songs.push(song);
        self.persist_all();
        true
    }

    /// Remove the song at `index`. Out-of-range is a no-op.
    pub fn remove_song(&mut self, id: &str, index: usize) -> bool {
        let Some(playlist) = self.playlists.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if index >= playlist.songs.len() {
            return false;
        }
        playlist.songs.remove(index);
        self.persist_all();
        true
    }

    pub fn get(&self, id: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    pub fn all(&self) -> &[Playlist] {
        &self.playlists
    }

    fn persist_all(&self) {
        if !self.persist {
            return;
        }
        let Some(storage) = self.storage.clone() else {
            return;
        };
        let playlists = self.playlists.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = storage.save_playlists(&playlists) {
                        log::error!("Failed to persist playlists: {e:#}");
                    }
                });
            }
            Err(_) => {
                if let Err(e) = storage.save_playlists(&playlists) {
                    log::error!("Failed to persist playlists: {e:#}");
                }
            }
        }
    }
}

impl Default for PlaylistStore {
    fn default() -> Self {
        Self::new()
    }
}
