use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::messages::{CommandError, CommandSink, WindowResponse};
use crate::player::{HeadlessHandle, PlayerFactory};
use crate::playlists::{LoadMode, PlaylistStore};
use crate::proxy::{ProxyEvent, RemotePlayerProxy};
use crate::queue::QueueStore;
use crate::router::{MessageRouter, MonitorBounds};
use crate::storage::Storage;
use crate::types::{PlaybackState, Song};

pub type SharedQueue = Arc<Mutex<QueueStore>>;
pub type SharedPlaylists = Arc<Mutex<PlaylistStore>>;

/// Everything the composition root needs to wire the two windows together.
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Mirror queue and playlist mutations to disk.
    pub persist: bool,
    pub monitors: Vec<MonitorBounds>,
    pub player_factory: PlayerFactory,
}

impl AppConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            persist: true,
            monitors: vec![MonitorBounds::primary(1920, 1080)],
            player_factory: HeadlessHandle::new().factory(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("duet");
        Self::new(data_dir)
    }
}

/// Process-wide composition root. All services are explicitly constructed
/// and injected here; `shutdown` is the teardown hook.
pub struct App {
    storage: Arc<Storage>,
    queue: SharedQueue,
    playlists: SharedPlaylists,
    router: Arc<MessageRouter>,
    proxy: Arc<RemotePlayerProxy>,
    events_task: JoinHandle<()>,
}

impl App {
    /// Build the full control-side service graph. Must be called from
    /// within a tokio runtime (it spawns the push pump and the consumer
    /// event task).
    pub fn new(config: AppConfig) -> Result<Self> {
        log::info!("data directory: {:?}", config.data_dir);
        let storage = Arc::new(Storage::new(config.data_dir));

        let report = storage.migrate();
        if report.migrated {
            log::info!("legacy store migrated");
        }

        let mut queue_store = if config.persist {
            QueueStore::with_storage(storage.clone())
        } else {
            QueueStore::new()
        };
        if let Some(snapshot) = storage.load_queue() {
            log::info!(
                "restoring persisted queue ({} upcoming)",
                snapshot.upcoming_songs.len()
            );
            queue_store.restore(snapshot);
            // The remote player is not running yet; whatever state was
            // persisted, playback starts idle.
            queue_store.set_playback_state(PlaybackState::Idle);
        }
        let queue: SharedQueue = Arc::new(Mutex::new(queue_store));

        let playlists: SharedPlaylists = Arc::new(Mutex::new(if config.persist {
            PlaylistStore::with_storage(storage.clone())
        } else {
            PlaylistStore::new()
        }));

        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let router = Arc::new(MessageRouter::new(
            config.player_factory,
            config.monitors,
            push_tx,
        ));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let proxy = Arc::new(RemotePlayerProxy::new(
            router.clone() as Arc<dyn CommandSink>,
            push_rx,
            events_tx,
        ));

        let events_task = tokio::spawn(Self::consume_events(
            events_rx,
            queue.clone(),
            proxy.clone(),
        ));

        Ok(Self {
            storage,
            queue,
            playlists,
            router,
            proxy,
            events_task,
        })
    }

    /// React to display-side notifications: advance on ended, and advance
    /// past failed videos instead of waiting on an ended event a broken
    /// video will never fire. Only provider playback failures arrive here;
    /// command rejections stay in the proxy's `last_error`.
    async fn consume_events(
        mut events_rx: mpsc::UnboundedReceiver<ProxyEvent>,
        queue: SharedQueue,
        proxy: Arc<RemotePlayerProxy>,
    ) {
        while let Some(event) = events_rx.recv().await {
            match event {
                ProxyEvent::VideoEnded => {
                    Self::advance(&queue, &proxy);
                }
                ProxyEvent::PlayerError { command, error } => {
                    log::warn!(
                        "skipping current song after player error (command: {:?}): {error}",
                        command
                    );
                    queue.lock().set_playback_state(PlaybackState::Error);
                    Self::advance(&queue, &proxy);
                }
            }
        }
    }

    fn advance(queue: &SharedQueue, proxy: &Arc<RemotePlayerProxy>) {
        let next = queue.lock().next_song();
        match next {
            Some(song) => {
                if let Err(e) = proxy.play_video(Some(&song.video_id)) {
                    log::error!("Failed to start \"{}\": {e}", song.title);
                }
            }
            None => log::info!("queue finished"),
        }
    }

    pub fn queue(&self) -> SharedQueue {
        self.queue.clone()
    }

    pub fn playlists(&self) -> SharedPlaylists {
        self.playlists.clone()
    }

    pub fn storage(&self) -> Arc<Storage> {
        self.storage.clone()
    }

    pub fn proxy(&self) -> Arc<RemotePlayerProxy> {
        self.proxy.clone()
    }

    pub fn add_song(&self, song: Song) {
        self.queue.lock().add_song(song);
    }

    /// Start playback if idle: advances the queue and tells the display to
    /// load the new current song. Idempotent while something is playing.
    pub fn play_queue(&self) -> Result<(), CommandError> {
        let started = self.queue.lock().play_queue();
        match started {
            Some(song) => self.proxy.play_video(Some(&song.video_id)),
            None => Ok(()),
        }
    }

    /// Skip to the next song, regardless of what is currently playing.
    pub fn play_next(&self) -> Result<(), CommandError> {
        let next = self.queue.lock().next_song();
        match next {
            Some(song) => self.proxy.play_video(Some(&song.video_id)),
            None => {
                // Queue drained: silence the display if it is still up.
                if self.router.display_window_open() {
                    self.proxy.stop_video()
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Copy a playlist's songs into the queue.
    pub fn load_playlist_to_queue(&self, playlist_id: &str, mode: LoadMode) -> bool {
        let songs = match self.playlists.lock().get(playlist_id) {
            Some(playlist) => playlist.songs.clone(),
            None => return false,
        };
        let mut queue = self.queue.lock();
        if mode == LoadMode::Replace {
            queue.clear_queue();
        }
        for song in songs {
            queue.add_song(song);
        }
        true
    }

    pub fn open_display(&self) -> WindowResponse {
        self.router.open_display_window()
    }

    /// Close the display window and mark the remote surface unavailable, so
    /// subsequent commands fail fast instead of timing out.
    pub async fn close_display(&self) -> WindowResponse {
        let response = self.router.close_display_window().await;
        self.proxy.mark_display_closed().await;
        self.queue.lock().set_playback_state(PlaybackState::Idle);
        response
    }

    pub fn display_open(&self) -> bool {
        self.router.display_window_open()
    }

    /// Teardown hook: close the display window and stop the background
    /// tasks. Used on exit and by tests that need a clean slate.
    pub async fn shutdown(self) {
        let _ = self.router.close_display_window().await;
        self.proxy.mark_display_closed().await;
        self.events_task.abort();
        self.proxy.shutdown();
        log::info!("application shut down");
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
            thumbnail: String::new(),
            duration: 120,
        }
    }

    fn test_app(dir: &std::path::Path) -> App {
        let mut config = AppConfig::new(dir.to_path_buf());
        config.persist = false;
        App::new(config).unwrap()
    }

    #[tokio::test]
    async fn load_playlist_append_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let playlists = app.playlists();
        let playlist_id = {
            let mut playlists = playlists.lock();
            let p = playlists.create("Hits");
            playlists.add_song(&p.id, song("x"));
            playlists.add_song(&p.id, song("y"));
            p.id
        };

        app.add_song(song("a"));
        assert!(app.load_playlist_to_queue(&playlist_id, LoadMode::Append));
        assert_eq!(app.queue().lock().len(), 3);

        assert!(app.load_playlist_to_queue(&playlist_id, LoadMode::Replace));
        let ids: Vec<_> = app
            .queue()
            .lock()
            .upcoming_songs()
            .iter()
            .map(|s| s.video_id.clone())
            .collect();
        assert_eq!(ids, ["x", "y"]);

        assert!(!app.load_playlist_to_queue("missing", LoadMode::Append));
        app.shutdown().await;
    }

    #[tokio::test]
    async fn play_queue_without_display_fails_definitively() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        app.add_song(song("a"));
        let err = app.play_queue().unwrap_err();
        assert_eq!(err, CommandError::DisplayUnavailable);
        // The queue still advanced; opening the display and retrying works.
        assert_eq!(
            app.queue().lock().current_song().unwrap().video_id,
            "a"
        );
        app.shutdown().await;
    }
}
