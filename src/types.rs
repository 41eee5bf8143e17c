use serde::{Deserialize, Serialize};

/// A single queued video. Immutable once materialized from a search result
/// or a persisted playlist; replaced wholesale, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail: String,
    /// Length in seconds.
    pub duration: u64,
}

/// Playback state mirrored between the control and display windows.
/// Terminal-free: `Error` recovers through the next advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    Loading,
    Error,
}

/// Transient snapshot of the remote player, produced by the display side on
/// every player event and on explicit state requests. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateInfo {
    pub state: PlaybackState,
    pub current_time: f64,
    pub duration: f64,
    /// 0..=100
    pub volume: u8,
    pub is_muted: bool,
    pub video_id: Option<String>,
}

/// The persisted queue shape (`queue.json`). The in-memory authority is
/// `QueueStore`; this is what it serializes to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub current_song: Option<Song>,
    pub upcoming_songs: Vec<Song>,
    pub playback_state: PlaybackState,
}

/// A user-created playlist, CRUD'd independently of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub songs: Vec<Song>,
    /// Epoch milliseconds.
    pub created_at: i64,
}
