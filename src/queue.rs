use std::collections::VecDeque;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::storage::Storage;
use crate::types::{PlaybackState, QueueSnapshot, Song};

/// The authoritative playback queue, owned exclusively by the control side.
/// The display side never holds a copy; it only reports playback state back
/// through push messages.
pub struct QueueStore {
    current_song: Option<Song>,
    upcoming_songs: VecDeque<Song>,
    playback_state: PlaybackState,
    storage: Option<Arc<Storage>>,
    persist: bool,
}

impl QueueStore {
    /// In-memory only queue, no persistence.
    pub fn new() -> Self {
        Self {
            current_song: None,
            upcoming_songs: VecDeque::new(),
            playback_state: PlaybackState::Idle,
            storage: None,
            persist: false,
        }
    }

    /// Queue that mirrors every mutation into `queue.json`, fire-and-forget.
    pub fn with_storage(storage: Arc<Storage>) -> Self {
        Self {
            storage: Some(storage),
            persist: true,
            ..Self::new()
        }
    }

    /// Append to the end of the upcoming list.
    pub fn add_song(&mut self, song: Song) {
        log::debug!("queueing \"{}\" ({})", song.title, song.video_id);
        self.upcoming_songs.push_back(song);
        self.persist_snapshot();
    }

    /// Remove the upcoming song at `index`. Out-of-range is a no-op.
    pub fn remove_song(&mut self, index: usize) -> bool {
        if self.upcoming_songs.remove(index).is_some() {
            self.persist_snapshot();
            true
        } else {
            false
        }
    }

    /// Advance: dequeue the head into the current slot (state `Loading`), or
    /// go idle when nothing is left. Idempotent on an empty queue.
    pub fn next_song(&mut self) -> Option<Song> {
        let song = match self.upcoming_songs.pop_front() {
            Some(song) => {
                log::info!("advancing to \"{}\"", song.title);
                self.current_song = Some(song.clone());
                self.playback_state = PlaybackState::Loading;
                Some(song)
            }
            None => {
                self.current_song = None;
                self.playback_state = PlaybackState::Idle;
                None
            }
        };
        self.persist_snapshot();
        song
    }

    /// Start playback if idle: advances only when nothing is current and the
    /// queue is non-empty. Idempotent otherwise.
    pub fn play_queue(&mut self) -> Option<Song> {
        if self.current_song.is_none() && !self.upcoming_songs.is_empty() {
            self.next_song()
        } else {
            None
        }
    }

    /// Reset to empty and idle.
    pub fn clear_queue(&mut self) {
        self.current_song = None;
        self.upcoming_songs.clear();
        self.playback_state = PlaybackState::Idle;
        self.persist_snapshot();
    }

    /// Move the upcoming song at `from` to position `to`. A pure permutation
    /// of the upcoming list; the current song is untouched. Out-of-range is
    /// a no-op.
    pub fn reorder_queue(&mut self, from: usize, to: usize) -> bool {
        let len = self.upcoming_songs.len();
        if from >= len || to >= len {
            return false;
        }
        if from == to {
            return true;
        }
        if let Some(song) = self.upcoming_songs.remove(from) {
            self.upcoming_songs.insert(to, song);
            self.persist_snapshot();
            true
        } else {
            false
        }
    }

    /// Shuffle the upcoming list in place; the current song is untouched.
    pub fn shuffle_queue(&mut self) {
        self.upcoming_songs
            .make_contiguous()
            .shuffle(&mut rand::thread_rng());
        self.persist_snapshot();
    }

    /// Direct playback-state setter: the only way the state changes outside
    /// of `next_song`/`clear_queue`/`set_current_song`.
    pub fn set_playback_state(&mut self, state: PlaybackState) {
        if self.playback_state != state {
            log::debug!("playback state {:?} -> {:?}", self.playback_state, state);
            self.playback_state = state;
            self.persist_snapshot();
        }
    }

    /// Replace the current song without touching the upcoming list.
    pub fn set_current_song(&mut self, song: Option<Song>) {
        self.current_song = song;
        self.persist_snapshot();
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.current_song.as_ref()
    }

    pub fn upcoming_songs(&self) -> &VecDeque<Song> {
        &self.upcoming_songs
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback_state
    }

    pub fn len(&self) -> usize {
        self.upcoming_songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upcoming_songs.is_empty()
    }

    /// Serializable copy of the whole queue.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current_song: self.current_song.clone(),
            upcoming_songs: self.upcoming_songs.iter().cloned().collect(),
            playback_state: self.playback_state,
        }
    }

    /// Restore from a persisted snapshot. Does not write back.
    pub fn restore(&mut self, snapshot: QueueSnapshot) {
        self.current_song = snapshot.current_song;
        self.upcoming_songs = snapshot.upcoming_songs.into();
        self.playback_state = snapshot.playback_state;
    }

    /// Fire-and-forget write of the current snapshot. Failure is logged and
    /// never rolls back the in-memory state.
    fn persist_snapshot(&self) {
        if !self.persist {
            return;
        }
        let Some(storage) = self.storage.clone() else {
            return;
        };
        let snapshot = self.snapshot();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = storage.save_queue(&snapshot) {
                        log::error!("Failed to persist queue: {e:#}");
                    }
                });
            }
            // Outside a runtime (e.g. synchronous teardown) write inline.
            Err(_) => {
                if let Err(e) = storage.save_queue(&snapshot) {
                    log::error!("Failed to persist queue: {e:#}");
                }
            }
        }
    }
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str) -> Song {
        Song {
            video_id: id.to_string(),
            title: format!("Song {id}"),
            channel: "Test Channel".to_string(),
            thumbnail: format!("https://i.ytimg.com/vi/{id}/default.jpg"),
            duration: 180,
        }
    }

    #[test]
    fn add_preserves_insertion_order_and_next_pops_head() {
        let mut queue = QueueStore::new();
        queue.add_song(song("a"));
        queue.add_song(song("b"));
        queue.add_song(song("c"));

        let ids: Vec<_> = queue
            .upcoming_songs()
            .iter()
            .map(|s| s.video_id.clone())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);

        let first = queue.next_song().unwrap();
        assert_eq!(first.video_id, "a");
        assert_eq!(queue.current_song().unwrap().video_id, "a");
        assert_eq!(queue.playback_state(), PlaybackState::Loading);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn next_on_empty_queue_is_idempotent() {
        let mut queue = QueueStore::new();
        for _ in 0..3 {
            assert!(queue.next_song().is_none());
            assert!(queue.current_song().is_none());
            assert_eq!(queue.playback_state(), PlaybackState::Idle);
        }
    }

    #[test]
    fn remove_song_bounds_checked() {
        let mut queue = QueueStore::new();
        queue.add_song(song("a"));
        assert!(!queue.remove_song(5));
        assert_eq!(queue.len(), 1);
        assert!(queue.remove_song(0));
        assert!(queue.is_empty());
    }

    #[test]
    fn reorder_is_a_pure_permutation() {
        let mut queue = QueueStore::new();
        for id in ["a", "b", "c", "d"] {
            queue.add_song(song(id));
        }
        queue.next_song();

        assert!(queue.reorder_queue(0, 2));
        let ids: Vec<_> = queue
            .upcoming_songs()
            .iter()
            .map(|s| s.video_id.clone())
            .collect();
        assert_eq!(ids, ["c", "d", "b"]);
        assert_eq!(queue.current_song().unwrap().video_id, "a");

        assert!(!queue.reorder_queue(0, 9));
        assert!(queue.reorder_queue(1, 1));
    }

    #[test]
    fn shuffle_preserves_members_and_current_song() {
        let mut queue = QueueStore::new();
        for i in 0..20 {
            queue.add_song(song(&i.to_string()));
        }
        queue.next_song();

        let mut before: Vec<_> = queue
            .upcoming_songs()
            .iter()
            .map(|s| s.video_id.clone())
            .collect();
        queue.shuffle_queue();
        let mut after: Vec<_> = queue
            .upcoming_songs()
            .iter()
            .map(|s| s.video_id.clone())
            .collect();

        assert_eq!(queue.current_song().unwrap().video_id, "0");
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn play_queue_is_idempotent() {
        let mut queue = QueueStore::new();
        assert!(queue.play_queue().is_none());

        queue.add_song(song("a"));
        queue.add_song(song("b"));
        let started = queue.play_queue().unwrap();
        assert_eq!(started.video_id, "a");

        // Already playing: no further advance.
        assert!(queue.play_queue().is_none());
        assert_eq!(queue.current_song().unwrap().video_id, "a");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn clear_resets_to_idle() {
        let mut queue = QueueStore::new();
        queue.add_song(song("a"));
        queue.next_song();
        queue.set_playback_state(PlaybackState::Playing);

        queue.clear_queue();
        assert!(queue.current_song().is_none());
        assert!(queue.is_empty());
        assert_eq!(queue.playback_state(), PlaybackState::Idle);
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let mut queue = QueueStore::new();
        queue.add_song(song("a"));
        queue.add_song(song("b"));
        queue.next_song();
        queue.set_playback_state(PlaybackState::Playing);

        let snapshot = queue.snapshot();
        let mut restored = QueueStore::new();
        restored.restore(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
    }
}
