use std::time::Duration;

use tokio::sync::mpsc;

use crate::messages::{PlayerCommand, PlayerPush};
use crate::player::{describe_provider_error, PlayerError, PlayerEvent, ProviderState, VideoPlayer};
use crate::types::{PlaybackState, PlayerStateInfo};

/// Delay between loading a video and issuing play, so the load can begin.
const LOAD_GRACE: Duration = Duration::from_millis(250);
/// Delay before re-emitting state after a seek, so the position settles.
const SEEK_SETTLE: Duration = Duration::from_millis(150);

/// Lifecycle of the display-side controller. `Destroyed` is the one true
/// terminal, reached on window teardown; `Error` is recoverable through the
/// next command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Uninitialized,
    Ready,
    Active,
    Paused,
    Loading,
    Error,
    Destroyed,
}

/// Display-side owner of the embedded player: translates incoming commands
/// into player calls and player events into outbound push messages. Runs
/// until its command channel closes (window closed), then destroys the
/// player.
pub struct DisplayController {
    player: Box<dyn VideoPlayer>,
    commands: mpsc::UnboundedReceiver<PlayerCommand>,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
    push: mpsc::UnboundedSender<PlayerPush>,
    phase: ControllerPhase,
    last_command: Option<&'static str>,
}

impl DisplayController {
    pub fn new(
        player: Box<dyn VideoPlayer>,
        commands: mpsc::UnboundedReceiver<PlayerCommand>,
        events: mpsc::UnboundedReceiver<PlayerEvent>,
        push: mpsc::UnboundedSender<PlayerPush>,
    ) -> Self {
        Self {
            player,
            commands,
            events,
            push,
            phase: ControllerPhase::Uninitialized,
            last_command: None,
        }
    }

    pub async fn run(mut self) {
        log::info!("display controller started");
        let mut events_open = true;
        loop {
            tokio::select! {
                // Player events first: a queued `ready` must be seen before
                // any command that raced it across the two channels.
                biased;
                event = self.events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event),
                    None => events_open = false,
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }
        self.player.destroy();
        self.phase = ControllerPhase::Destroyed;
        log::info!("display controller stopped");
    }

    fn send_push(&self, push: PlayerPush) {
        // The control side may be tearing down; a dropped push is fine.
        let _ = self.push.send(push);
    }

    /// A command could not be executed. Pushed as a rejection, never as a
    /// playback failure: the current video (if any) keeps playing and the
    /// control side must not skip it.
    fn reject_command(&self, command: &'static str, error: PlayerError) {
        log::warn!("{command} rejected: {error}");
        self.send_push(PlayerPush::CommandRejected {
            command: command.to_string(),
            error: error.to_string(),
        });
    }

    fn snapshot(&self) -> PlayerStateInfo {
        PlayerStateInfo {
            state: self.player.state().to_playback_state(),
            current_time: self.player.current_time(),
            duration: self.player.duration(),
            volume: self.player.volume(),
            is_muted: self.player.is_muted(),
            video_id: self.player.video_id(),
        }
    }

    async fn handle_command(&mut self, command: PlayerCommand) {
        let name = command.name();

        // State requests are always answered, even before the player is
        // ready; the proxy must never depend solely on its timeout.
        if let PlayerCommand::GetPlayerState(request_id) = command {
            let state = if self.phase == ControllerPhase::Uninitialized {
                None
            } else {
                Some(self.snapshot())
            };
            self.send_push(PlayerPush::StateResponse { request_id, state });
            return;
        }

        if self.phase == ControllerPhase::Uninitialized {
            log::warn!("rejecting {name}: player not ready");
            self.send_push(PlayerPush::CommandRejected {
                command: name.to_string(),
                error: "Player not ready".to_string(),
            });
            return;
        }

        self.last_command = Some(name);

        // Defense in depth: the proxy validated already, but nothing stops
        // another control surface from writing to the command channel.
        if let Err(err) = command.validate() {
            log::warn!("rejecting {name}: {err}");
            self.send_push(PlayerPush::CommandRejected {
                command: name.to_string(),
                error: err.to_string(),
            });
            return;
        }

        match command {
            PlayerCommand::PlayVideo(Some(video_id)) => {
                log::info!("loading video {video_id}");
                self.phase = ControllerPhase::Loading;
                if let Err(e) = self.player.load_by_id(&video_id) {
                    self.reject_command("play-video", e);
                    return;
                }
                tokio::time::sleep(LOAD_GRACE).await;
                if let Err(e) = self.player.play() {
                    self.reject_command("play-video", e);
                }
            }
            PlayerCommand::PlayVideo(None) => {
                if let Err(e) = self.player.play() {
                    self.reject_command("play-video", e);
                }
            }
            PlayerCommand::PauseVideo => {
                if let Err(e) = self.player.pause() {
                    self.reject_command("pause-video", e);
                }
            }
            PlayerCommand::StopVideo => {
                if let Err(e) = self.player.stop() {
                    self.reject_command("stop-video", e);
                }
            }
            PlayerCommand::SeekTo(seconds) => {
                if let Err(e) = self.player.seek_to(seconds) {
                    self.reject_command("seek-to", e);
                    return;
                }
                tokio::time::sleep(SEEK_SETTLE).await;
                self.send_push(PlayerPush::StateChanged(self.snapshot()));
            }
            PlayerCommand::SetVolume(volume) => {
                if let Err(e) = self.player.set_volume(volume.round() as u8) {
                    self.reject_command("set-volume", e);
                    return;
                }
                self.send_push(PlayerPush::StateChanged(self.snapshot()));
            }
            PlayerCommand::Mute => {
                if let Err(e) = self.player.mute() {
                    self.reject_command("mute", e);
                    return;
                }
                self.send_push(PlayerPush::StateChanged(self.snapshot()));
            }
            PlayerCommand::Unmute => {
                if let Err(e) = self.player.unmute() {
                    self.reject_command("unmute", e);
                    return;
                }
                self.send_push(PlayerPush::StateChanged(self.snapshot()));
            }
            PlayerCommand::GetPlayerState(_) => unreachable!("answered above"),
        }
    }

    fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Ready => {
                if self.phase == ControllerPhase::Uninitialized {
                    log::info!("player ready");
                    self.phase = ControllerPhase::Ready;
                    self.send_push(PlayerPush::StateChanged(self.snapshot()));
                }
            }
            PlayerEvent::StateChange(provider_state) => {
                let mapped = provider_state.to_playback_state();
                log::debug!("player state change: {provider_state:?} -> {mapped:?}");
                self.phase = match mapped {
                    PlaybackState::Playing => ControllerPhase::Active,
                    PlaybackState::Paused => ControllerPhase::Paused,
                    PlaybackState::Loading => ControllerPhase::Loading,
                    _ => ControllerPhase::Ready,
                };
                let mut info = self.snapshot();
                info.state = mapped;
                self.send_push(PlayerPush::StateChanged(info));
                if provider_state == ProviderState::Ended {
                    // Separate signal: the consumer auto-advances on "ended",
                    // not on every transition to idle.
                    self.send_push(PlayerPush::VideoEnded);
                }
            }
            PlayerEvent::Error(code) => {
                let error = describe_provider_error(code);
                log::error!("player error {code}: {error}");
                self.phase = ControllerPhase::Error;
                self.send_push(PlayerPush::PlayerError {
                    command: self.last_command.map(str::to_string),
                    error,
                });
            }
        }
    }
}
