use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::messages::{CommandError, CommandSink, PlayerCommand, PlayerPush};
use crate::types::PlayerStateInfo;

/// Budget for a `get-player-state` round trip before falling back to the
/// cached snapshot.
pub const STATE_REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);

/// Notifications the proxy surfaces to its consumer (the composition root).
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyEvent {
    /// The remote video played to its end; the consumer auto-advances.
    VideoEnded,
    /// The remote player failed; `command` names the originating command
    /// when the display side knows it.
    PlayerError {
        command: Option<String>,
        error: String,
    },
}

type PendingMap = Arc<Mutex<HashMap<Uuid, oneshot::Sender<Option<PlayerStateInfo>>>>>;

/// Control-side stand-in for the player living in the display window.
/// Commands are validated locally, forwarded through the router, and always
/// resolve to a definitive outcome; failures land in `last_error` instead of
/// panicking across the boundary.
pub struct RemotePlayerProxy {
    sink: Arc<dyn CommandSink>,
    cached_state: Arc<Mutex<Option<PlayerStateInfo>>>,
    last_error: Arc<Mutex<Option<String>>>,
    pending: PendingMap,
    reset_tx: mpsc::UnboundedSender<oneshot::Sender<()>>,
    pump: JoinHandle<()>,
}

impl RemotePlayerProxy {
    /// `push_rx` is the display-to-control half of the pipe; `events_tx`
    /// carries ended/error notifications to the consumer. Spawns the push
    /// pump, so this must be called from within a tokio runtime.
    pub fn new(
        sink: Arc<dyn CommandSink>,
        push_rx: mpsc::UnboundedReceiver<PlayerPush>,
        events_tx: mpsc::UnboundedSender<ProxyEvent>,
    ) -> Self {
        let cached_state: Arc<Mutex<Option<PlayerStateInfo>>> = Arc::new(Mutex::new(None));
        let last_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (reset_tx, reset_rx) = mpsc::unbounded_channel();

        let pump = tokio::spawn(Self::pump(
            push_rx,
            reset_rx,
            cached_state.clone(),
            last_error.clone(),
            pending.clone(),
            events_tx,
        ));

        Self {
            sink,
            cached_state,
            last_error,
            pending,
            reset_tx,
            pump,
        }
    }

    /// Consume push messages from the display side: keep the state mirror
    /// fresh, settle pending state requests, surface ended/error signals.
    /// Reset fences arrive on a second channel polled only when the push
    /// channel is drained, so every push sent before a display close lands
    /// before the mirror is cleared.
    async fn pump(
        mut push_rx: mpsc::UnboundedReceiver<PlayerPush>,
        mut reset_rx: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
        cached_state: Arc<Mutex<Option<PlayerStateInfo>>>,
        last_error: Arc<Mutex<Option<String>>>,
        pending: PendingMap,
        events_tx: mpsc::UnboundedSender<ProxyEvent>,
    ) {
        let mut resets_open = true;
        loop {
            tokio::select! {
                biased;
                push = push_rx.recv() => match push {
                    Some(push) => Self::handle_push(
                        push,
                        &cached_state,
                        &last_error,
                        &pending,
                        &events_tx,
                    ),
                    None => break,
                },
                reset = reset_rx.recv(), if resets_open => match reset {
                    Some(ack) => {
                        *cached_state.lock() = None;
                        for (_, reply) in pending.lock().drain() {
                            let _ = reply.send(None);
                        }
                        let _ = ack.send(());
                    }
                    None => resets_open = false,
                },
            }
        }
        log::debug!("push pump stopped");
    }

    fn handle_push(
        push: PlayerPush,
        cached_state: &Mutex<Option<PlayerStateInfo>>,
        last_error: &Mutex<Option<String>>,
        pending: &PendingMap,
        events_tx: &mpsc::UnboundedSender<ProxyEvent>,
    ) {
        match push {
            PlayerPush::StateChanged(info) => {
                *cached_state.lock() = Some(info);
            }
            PlayerPush::VideoEnded => {
                log::info!("remote video ended");
                let _ = events_tx.send(ProxyEvent::VideoEnded);
            }
            // A rejection means the command was dropped, not that playback
            // failed. Recorded for the caller, never surfaced as an event:
            // the consumer must not skip the current song over it.
            PlayerPush::CommandRejected { command, error } => {
                log::warn!("display rejected {command}: {error}");
                *last_error.lock() = Some(error);
            }
            PlayerPush::PlayerError { command, error } => {
                log::error!("remote player error: {error}");
                *last_error.lock() = Some(error.clone());
                let _ = events_tx.send(ProxyEvent::PlayerError { command, error });
            }
            PlayerPush::StateResponse { request_id, state } => {
                match pending.lock().remove(&request_id) {
                    Some(reply) => {
                        let _ = reply.send(state);
                    }
                    // Late arrival after the timeout already fired.
                    None => log::debug!("dropping late state response {request_id}"),
                }
            }
        }
    }

    fn record_error(&self, error: impl Into<String>) {
        *self.last_error.lock() = Some(error.into());
    }

    /// Validate locally, then forward. Invalid input never crosses the
    /// window boundary.
    fn dispatch(&self, command: PlayerCommand) -> Result<(), CommandError> {
        if let Err(err) = command.validate() {
            log::warn!("rejecting {} locally: {err}", command.name());
            self.record_error(err.to_string());
            return Err(err.into());
        }
        match self.sink.send_command(command) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.record_error(err.to_string());
                Err(err)
            }
        }
    }

    pub fn play_video(&self, video_id: Option<&str>) -> Result<(), CommandError> {
        self.dispatch(PlayerCommand::PlayVideo(video_id.map(String::from)))
    }

    pub fn pause_video(&self) -> Result<(), CommandError> {
        self.dispatch(PlayerCommand::PauseVideo)
    }

    pub fn stop_video(&self) -> Result<(), CommandError> {
        self.dispatch(PlayerCommand::StopVideo)
    }

    pub fn seek_to(&self, seconds: f64) -> Result<(), CommandError> {
        self.dispatch(PlayerCommand::SeekTo(seconds))
    }

    pub fn set_volume(&self, volume: f64) -> Result<(), CommandError> {
        self.dispatch(PlayerCommand::SetVolume(volume))
    }

    pub fn mute(&self) -> Result<(), CommandError> {
        self.dispatch(PlayerCommand::Mute)
    }

    pub fn unmute(&self) -> Result<(), CommandError> {
        self.dispatch(PlayerCommand::Unmute)
    }

    /// Request a fresh snapshot from the display side, correlated by request
    /// id. Always resolves: on timeout or an unavailable display it falls
    /// back to the cached snapshot (which may be `None` before any state has
    /// ever been received), and the pending listener is cleared either way.
    pub async fn get_player_state(&self) -> Option<PlayerStateInfo> {
        let request_id = Uuid::new_v4();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(request_id, reply_tx);

        if let Err(err) = self
            .sink
            .send_command(PlayerCommand::GetPlayerState(request_id))
        {
            self.pending.lock().remove(&request_id);
            self.record_error(err.to_string());
            return self.cached_state.lock().clone();
        }

        match tokio::time::timeout(STATE_REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(state)) => {
                if let Some(info) = &state {
                    *self.cached_state.lock() = Some(info.clone());
                }
                state
            }
            // Timeout, or the pump resolved the sender side away. Stale
            // cached data beats a loud failure here.
            _ => {
                self.pending.lock().remove(&request_id);
                log::debug!("state request {request_id} timed out, serving cached state");
                self.cached_state.lock().clone()
            }
        }
    }

    /// Last known remote snapshot, updated from state pushes and state
    /// responses.
    pub fn cached_state(&self) -> Option<PlayerStateInfo> {
        self.cached_state.lock().clone()
    }

    /// Most recent failure surfaced to the caller, local or remote.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// The display surface went away: clear the mirror and settle anything
    /// still in flight so no caller is left hanging. Routed through the
    /// pump as a fence, so pushes the display sent before closing cannot
    /// repopulate the mirror afterward.
    pub async fn mark_display_closed(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.reset_tx.send(ack_tx).is_ok() && ack_rx.await.is_ok() {
            return;
        }
        // Pump already stopped; clear inline.
        *self.cached_state.lock() = None;
        for (_, reply) in self.pending.lock().drain() {
            let _ = reply.send(None);
        }
    }

    /// Stop the push pump. Part of the composition root's teardown hook.
    pub fn shutdown(&self) {
        self.pump.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlaybackState;

    /// Sink that records forwarded commands instead of delivering them.
    struct RecordingSink {
        sent: Mutex<Vec<PlayerCommand>>,
        available: bool,
    }

    impl RecordingSink {
        fn new(available: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                available,
            })
        }

        fn sent(&self) -> Vec<PlayerCommand> {
            self.sent.lock().clone()
        }
    }

    impl CommandSink for RecordingSink {
        fn send_command(&self, command: PlayerCommand) -> Result<(), CommandError> {
            if !self.available {
                return Err(CommandError::DisplayUnavailable);
            }
            self.sent.lock().push(command);
            Ok(())
        }
    }

    struct Fixture {
        proxy: Arc<RemotePlayerProxy>,
        sink: Arc<RecordingSink>,
        push_tx: mpsc::UnboundedSender<PlayerPush>,
        events_rx: mpsc::UnboundedReceiver<ProxyEvent>,
    }

    fn fixture(available: bool) -> Fixture {
        let sink = RecordingSink::new(available);
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let proxy = Arc::new(RemotePlayerProxy::new(
            sink.clone(),
            push_rx,
            events_tx,
        ));
        Fixture {
            proxy,
            sink,
            push_tx,
            events_rx,
        }
    }

    fn info(state: PlaybackState) -> PlayerStateInfo {
        PlayerStateInfo {
            state,
            current_time: 12.0,
            duration: 240.0,
            volume: 80,
            is_muted: false,
            video_id: Some("abc123".to_string()),
        }
    }

    #[tokio::test]
    async fn invalid_input_never_crosses_the_boundary() {
        let f = fixture(true);

        let err = f.proxy.set_volume(150.0).unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));
        assert_eq!(
            f.proxy.last_error().unwrap(),
            "Volume must be between 0 and 100"
        );

        let err = f.proxy.seek_to(-1.0).unwrap_err();
        assert_eq!(err.to_string(), "Seek time must be a non-negative number");

        // Nothing was forwarded to the sink for either rejection.
        assert!(f.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn commands_fail_fast_without_a_display() {
        let f = fixture(false);
        let err = f.proxy.seek_to(30.0).unwrap_err();
        assert_eq!(err, CommandError::DisplayUnavailable);
        assert_eq!(
            f.proxy.last_error().unwrap(),
            "Display window not available"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn state_request_timeout_serves_cached_state() {
        let f = fixture(true);

        // Nothing ever received: the timeout resolves to None.
        assert!(f.proxy.get_player_state().await.is_none());
        assert!(f.proxy.pending.lock().is_empty());

        // Prime the cache through a state push, then time out again.
        f.push_tx
            .send(PlayerPush::StateChanged(info(PlaybackState::Playing)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(f.proxy.cached_state(), Some(info(PlaybackState::Playing)));

        let got = f.proxy.get_player_state().await;
        assert_eq!(got, Some(info(PlaybackState::Playing)));
        // The listener was cleared on timeout; nothing accumulates.
        assert!(f.proxy.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn state_response_is_correlated_by_request_id() {
        let f = fixture(true);

        let proxy = f.proxy.clone();
        let request = tokio::spawn(async move { proxy.get_player_state().await });

        // Wait for the command to land in the sink, then answer it.
        let request_id = loop {
            if let Some(PlayerCommand::GetPlayerState(id)) = f.sink.sent().last().cloned() {
                break id;
            }
            tokio::task::yield_now().await;
        };

        // An unrelated response id must not settle the request.
        f.push_tx
            .send(PlayerPush::StateResponse {
                request_id: Uuid::new_v4(),
                state: Some(info(PlaybackState::Paused)),
            })
            .unwrap();
        f.push_tx
            .send(PlayerPush::StateResponse {
                request_id,
                state: Some(info(PlaybackState::Playing)),
            })
            .unwrap();

        let got = request.await.unwrap();
        assert_eq!(got, Some(info(PlaybackState::Playing)));
        assert_eq!(f.proxy.cached_state(), Some(info(PlaybackState::Playing)));
        assert!(f.proxy.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn pushes_surface_as_consumer_events() {
        let mut f = fixture(true);

        f.push_tx.send(PlayerPush::VideoEnded).unwrap();
        assert_eq!(f.events_rx.recv().await.unwrap(), ProxyEvent::VideoEnded);

        f.push_tx
            .send(PlayerPush::PlayerError {
                command: Some("play-video".to_string()),
                error: "Video not found or private".to_string(),
            })
            .unwrap();
        match f.events_rx.recv().await.unwrap() {
            ProxyEvent::PlayerError { command, error } => {
                assert_eq!(command.as_deref(), Some("play-video"));
                assert_eq!(error, "Video not found or private");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(
            f.proxy.last_error().unwrap(),
            "Video not found or private"
        );
    }

    #[tokio::test]
    async fn closing_the_display_settles_in_flight_requests() {
        let f = fixture(true);

        let proxy = f.proxy.clone();
        let request = tokio::spawn(async move { proxy.get_player_state().await });

        loop {
            if !f.sink.sent().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        f.proxy.mark_display_closed().await;
        assert_eq!(request.await.unwrap(), None);
        assert!(f.proxy.cached_state().is_none());
    }

    #[tokio::test]
    async fn rejections_are_recorded_but_are_not_playback_failures() {
        let mut f = fixture(true);

        f.push_tx
            .send(PlayerPush::CommandRejected {
                command: "play-video".to_string(),
                error: "Player not ready".to_string(),
            })
            .unwrap();

        while f.proxy.last_error().is_none() {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.proxy.last_error().unwrap(), "Player not ready");
        // No consumer event: a rejection must never trigger an auto-advance.
        assert!(f.events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_fences_pushes_already_queued() {
        let f = fixture(true);

        // A state push the pump has not processed yet must not repopulate
        // the mirror after the close clears it.
        f.push_tx
            .send(PlayerPush::StateChanged(info(PlaybackState::Playing)))
            .unwrap();
        f.proxy.mark_display_closed().await;
        assert!(f.proxy.cached_state().is_none());
    }
}
