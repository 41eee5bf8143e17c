use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::PlaybackState;

/// Events the embedded player fires at the display controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Ready,
    StateChange(ProviderState),
    /// Provider error code, see [`describe_provider_error`].
    Error(u32),
}

pub type EventSender = mpsc::UnboundedSender<PlayerEvent>;

/// Builds a player bound to the display controller's event channel. The
/// router calls this once per opened display window.
pub type PlayerFactory = Arc<dyn Fn(EventSender) -> Box<dyn VideoPlayer> + Send + Sync>;

/// Failure inside the embedded player. Caught at the command boundary and
/// reported as a push message, never propagated as a panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("Player not ready")]
    NotReady,
    #[error("No video loaded")]
    NoVideo,
    #[error("{0}")]
    Provider(String),
}

/// Raw playback states reported by the embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl ProviderState {
    /// Collapse provider codes into the shared playback-state enum.
    /// `Ended` maps to `Idle`; the distinct "video ended" signal is emitted
    /// separately by the display controller.
    pub fn to_playback_state(self) -> PlaybackState {
        match self {
            ProviderState::Playing => PlaybackState::Playing,
            ProviderState::Paused => PlaybackState::Paused,
            ProviderState::Buffering => PlaybackState::Loading,
            ProviderState::Unstarted | ProviderState::Ended | ProviderState::Cued => {
                PlaybackState::Idle
            }
        }
    }
}

/// Map a provider error code to a user-facing message.
pub fn describe_provider_error(code: u32) -> String {
    match code {
        2 => "Invalid video id".to_string(),
        5 => "HTML5 player error".to_string(),
        100 => "Video not found or private".to_string(),
        101 | 150 => "Video owner does not allow embedding".to_string(),
        other => format!("Unknown player error (code {other})"),
    }
}

/// The opaque third-party video embed, owned exclusively by the display-side
/// controller. Implementations report asynchronous activity through the
/// event channel handed to their factory.
pub trait VideoPlayer: Send {
    fn load_by_id(&mut self, video_id: &str) -> Result<(), PlayerError>;
    fn play(&mut self) -> Result<(), PlayerError>;
    fn pause(&mut self) -> Result<(), PlayerError>;
    fn stop(&mut self) -> Result<(), PlayerError>;
    fn seek_to(&mut self, seconds: f64) -> Result<(), PlayerError>;
    fn set_volume(&mut self, volume: u8) -> Result<(), PlayerError>;
    fn mute(&mut self) -> Result<(), PlayerError>;
    fn unmute(&mut self) -> Result<(), PlayerError>;

    fn state(&self) -> ProviderState;
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn volume(&self) -> u8;
    fn is_muted(&self) -> bool;
    fn video_id(&self) -> Option<String>;

    /// Tear the player down. No calls are made after this.
    fn destroy(&mut self);
}

/// Duration reported for every simulated video.
const SIMULATED_DURATION: f64 = 240.0;

#[derive(Debug)]
struct HeadlessInner {
    state: ProviderState,
    video_id: Option<String>,
    position: f64,
    duration: f64,
    volume: u8,
    muted: bool,
    fail_on_load: Option<u32>,
    events: Option<EventSender>,
    destroyed: bool,
}

impl Default for HeadlessInner {
    fn default() -> Self {
        Self {
            state: ProviderState::Unstarted,
            video_id: None,
            position: 0.0,
            duration: 0.0,
            volume: 100,
            muted: false,
            fail_on_load: None,
            events: None,
            destroyed: false,
        }
    }
}

impl HeadlessInner {
    fn emit(&self, event: PlayerEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// External handle to a [`HeadlessPlayer`]: builds the factory handed to the
/// router and drives the simulated video from outside the display window
/// (finish playback, inject provider errors).
#[derive(Clone, Default)]
pub struct HeadlessHandle {
    inner: Arc<Mutex<HeadlessInner>>,
}

impl HeadlessHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Player factory for the message router. Signals `Ready` immediately,
    /// the way a freshly mounted embed does once its iframe reports in.
    pub fn factory(&self) -> PlayerFactory {
        let inner = self.inner.clone();
        Arc::new(move |events: EventSender| {
            {
                let mut guard = inner.lock();
                guard.events = Some(events.clone());
                guard.destroyed = false;
            }
            let _ = events.send(PlayerEvent::Ready);
            Box::new(HeadlessPlayer {
                inner: inner.clone(),
            })
        })
    }

    /// Make every subsequent load report the given provider error code.
    pub fn set_load_failure(&self, code: Option<u32>) {
        self.inner.lock().fail_on_load = code;
    }

    /// Drive the current video to its end, firing the provider's `Ended`
    /// state change.
    pub fn finish(&self) {
        let mut guard = self.inner.lock();
        if guard.video_id.is_some() {
            guard.state = ProviderState::Ended;
            guard.position = guard.duration;
            guard.emit(PlayerEvent::StateChange(ProviderState::Ended));
        }
    }

    /// Inject a provider error event without touching playback state.
    pub fn emit_error(&self, code: u32) {
        self.inner.lock().emit(PlayerEvent::Error(code));
    }

    pub fn loaded_video(&self) -> Option<String> {
        self.inner.lock().video_id.clone()
    }

    pub fn volume(&self) -> u8 {
        self.inner.lock().volume
    }

    pub fn position(&self) -> f64 {
        self.inner.lock().position
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }
}

/// In-process stand-in for the embedded video player. Used by the headless
/// binary and by the end-to-end protocol tests; real deployments plug a
/// webview-backed implementation into the same trait.
pub struct HeadlessPlayer {
    inner: Arc<Mutex<HeadlessInner>>,
}

impl HeadlessPlayer {
    fn guard_alive(inner: &HeadlessInner) -> Result<(), PlayerError> {
        if inner.destroyed {
            Err(PlayerError::NotReady)
        } else {
            Ok(())
        }
    }
}

impl VideoPlayer for HeadlessPlayer {
    fn load_by_id(&mut self, video_id: &str) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        Self::guard_alive(&inner)?;
        inner.video_id = Some(video_id.to_string());
        if let Some(code) = inner.fail_on_load {
            // The real embed accepts the load call and fails asynchronously.
            inner.emit(PlayerEvent::Error(code));
            return Ok(());
        }
        inner.position = 0.0;
        inner.duration = SIMULATED_DURATION;
        inner.state = ProviderState::Buffering;
        inner.emit(PlayerEvent::StateChange(ProviderState::Buffering));
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        Self::guard_alive(&inner)?;
        if inner.video_id.is_none() {
            return Err(PlayerError::NoVideo);
        }
        inner.state = ProviderState::Playing;
        inner.emit(PlayerEvent::StateChange(ProviderState::Playing));
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        Self::guard_alive(&inner)?;
        inner.state = ProviderState::Paused;
        inner.emit(PlayerEvent::StateChange(ProviderState::Paused));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        Self::guard_alive(&inner)?;
        inner.state = ProviderState::Unstarted;
        inner.position = 0.0;
        inner.emit(PlayerEvent::StateChange(ProviderState::Unstarted));
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        Self::guard_alive(&inner)?;
        if inner.video_id.is_none() {
            return Err(PlayerError::NoVideo);
        }
        inner.position = seconds.clamp(0.0, inner.duration);
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        Self::guard_alive(&inner)?;
        inner.volume = volume.min(100);
        Ok(())
    }

    fn mute(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        Self::guard_alive(&inner)?;
        inner.muted = true;
        Ok(())
    }

    fn unmute(&mut self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        Self::guard_alive(&inner)?;
        inner.muted = false;
        Ok(())
    }

    fn state(&self) -> ProviderState {
        self.inner.lock().state
    }

    fn current_time(&self) -> f64 {
        self.inner.lock().position
    }

    fn duration(&self) -> f64 {
        self.inner.lock().duration
    }

    fn volume(&self) -> u8 {
        self.inner.lock().volume
    }

    fn is_muted(&self) -> bool {
        self.inner.lock().muted
    }

    fn video_id(&self) -> Option<String> {
        self.inner.lock().video_id.clone()
    }

    fn destroy(&mut self) {
        let mut inner = self.inner.lock();
        inner.destroyed = true;
        inner.events = None;
        inner.state = ProviderState::Unstarted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_state_mapping() {
        assert_eq!(
            ProviderState::Playing.to_playback_state(),
            PlaybackState::Playing
        );
        assert_eq!(
            ProviderState::Buffering.to_playback_state(),
            PlaybackState::Loading
        );
        assert_eq!(ProviderState::Ended.to_playback_state(), PlaybackState::Idle);
        assert_eq!(ProviderState::Cued.to_playback_state(), PlaybackState::Idle);
    }

    #[test]
    fn provider_error_messages() {
        assert_eq!(describe_provider_error(2), "Invalid video id");
        assert_eq!(describe_provider_error(100), "Video not found or private");
        assert_eq!(
            describe_provider_error(101),
            describe_provider_error(150)
        );
        assert!(describe_provider_error(42).contains("code 42"));
    }

    #[test]
    fn headless_player_lifecycle() {
        let handle = HeadlessHandle::new();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut player = (handle.factory())(events_tx);

        assert_eq!(events_rx.try_recv().unwrap(), PlayerEvent::Ready);

        player.load_by_id("abc123").unwrap();
        assert_eq!(
            events_rx.try_recv().unwrap(),
            PlayerEvent::StateChange(ProviderState::Buffering)
        );
        player.play().unwrap();
        assert_eq!(player.state(), ProviderState::Playing);

        player.seek_to(9000.0).unwrap();
        assert_eq!(player.current_time(), player.duration());

        handle.finish();
        assert_eq!(
            events_rx.try_recv().unwrap(),
            PlayerEvent::StateChange(ProviderState::Playing)
        );
        assert_eq!(
            events_rx.try_recv().unwrap(),
            PlayerEvent::StateChange(ProviderState::Ended)
        );

        player.destroy();
        assert!(handle.is_destroyed());
        assert_eq!(player.play(), Err(PlayerError::NotReady));
    }

    #[test]
    fn play_without_video_is_an_error() {
        let handle = HeadlessHandle::new();
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let mut player = (handle.factory())(events_tx);
        assert_eq!(player.play(), Err(PlayerError::NoVideo));
    }
}
