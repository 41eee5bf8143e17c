use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::types::PlayerStateInfo;
use crate::validator::{
    validate_command_name, validate_seek, validate_volume, ValidationError,
};

/// Command channel, control -> display. Name + positional args on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// Load and play a video, or resume the current one when no id is given.
    PlayVideo(Option<String>),
    PauseVideo,
    StopVideo,
    SeekTo(f64),
    SetVolume(f64),
    Mute,
    Unmute,
    /// State request carrying its correlation id; the display side always
    /// answers it, with `None` when no usable player exists.
    GetPlayerState(Uuid),
}

impl PlayerCommand {
    /// Wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::PlayVideo(_) => "play-video",
            PlayerCommand::PauseVideo => "pause-video",
            PlayerCommand::StopVideo => "stop-video",
            PlayerCommand::SeekTo(_) => "seek-to",
            PlayerCommand::SetVolume(_) => "set-volume",
            PlayerCommand::Mute => "mute",
            PlayerCommand::Unmute => "unmute",
            PlayerCommand::GetPlayerState(_) => "get-player-state",
        }
    }

    /// Argument rules for this command. Run on the control side before the
    /// boundary and again on the display side.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            PlayerCommand::SeekTo(seconds) => validate_seek(*seconds),
            PlayerCommand::SetVolume(volume) => validate_volume(*volume),
            _ => Ok(()),
        }
    }

    /// Parse a named command with positional JSON arguments, enforcing the
    /// command whitelist and the per-command argument rules. This is the
    /// ingress for an embedding shell's IPC layer; in-process callers build
    /// typed commands directly.
    pub fn from_wire(name: &str, args: &[Value]) -> Result<Self, ValidationError> {
        validate_command_name(name)?;
        let command = match name {
            "play-video" => PlayerCommand::PlayVideo(
                args.first().and_then(Value::as_str).map(String::from),
            ),
            "pause-video" => PlayerCommand::PauseVideo,
            "stop-video" => PlayerCommand::StopVideo,
            "seek-to" => {
                let seconds = args
                    .first()
                    .and_then(Value::as_f64)
                    .ok_or(ValidationError::NegativeSeek)?;
                PlayerCommand::SeekTo(seconds)
            }
            "set-volume" => {
                let volume = args
                    .first()
                    .and_then(Value::as_f64)
                    .ok_or(ValidationError::VolumeOutOfRange)?;
                PlayerCommand::SetVolume(volume)
            }
            "mute" => PlayerCommand::Mute,
            "unmute" => PlayerCommand::Unmute,
            "get-player-state" => {
                let request_id = args
                    .first()
                    .and_then(Value::as_str)
                    .and_then(|raw| Uuid::parse_str(raw).ok())
                    .ok_or(ValidationError::MissingArgument {
                        command: "get-player-state",
                    })?;
                PlayerCommand::GetPlayerState(request_id)
            }
            _ => unreachable!("name already checked against the whitelist"),
        };
        command.validate()?;
        Ok(command)
    }
}

/// Push channels, display -> control. No request needed; the display side
/// emits these unprompted (except `StateResponse`, which answers a
/// `GetPlayerState` by correlation id).
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerPush {
    StateChanged(PlayerStateInfo),
    /// Distinct from the `Idle` state broadcast: the consumer reacts to
    /// "ended" (auto-advance) differently from "became idle".
    VideoEnded,
    /// A command was dropped display-side (player not ready, bad arguments,
    /// a refused player call). The current video is unaffected; the control
    /// side must not treat this as a playback failure.
    CommandRejected {
        command: String,
        error: String,
    },
    /// The provider reported a playback failure for the current video.
    PlayerError {
        command: Option<String>,
        error: String,
    },
    StateResponse {
        request_id: Uuid,
        state: Option<PlayerStateInfo>,
    },
}

/// Outcome of the two window lifecycle RPCs.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowResponse {
    pub success: bool,
    pub window_id: Option<u64>,
    pub error: Option<String>,
}

impl WindowResponse {
    pub fn ok(window_id: u64) -> Self {
        Self {
            success: true,
            window_id: Some(window_id),
            error: None,
        }
    }

    pub fn closed() -> Self {
        Self {
            success: true,
            window_id: None,
            error: None,
        }
    }
}

/// Definitive failure for a command that never reached the remote player.
/// These are values, not panics: nothing throws across the window boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Display window not available")]
    DisplayUnavailable,
}

/// The boundary a control-side caller hands commands to. The router is the
/// production implementation; tests substitute recording sinks.
pub trait CommandSink: Send + Sync {
    fn send_command(&self, command: PlayerCommand) -> Result<(), CommandError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_wire_parses_each_command() {
        let cmd = PlayerCommand::from_wire("play-video", &[json!("abc123")]).unwrap();
        assert_eq!(cmd, PlayerCommand::PlayVideo(Some("abc123".to_string())));
        assert_eq!(cmd.name(), "play-video");

        let cmd = PlayerCommand::from_wire("play-video", &[]).unwrap();
        assert_eq!(cmd, PlayerCommand::PlayVideo(None));

        let cmd = PlayerCommand::from_wire("seek-to", &[json!(42.5)]).unwrap();
        assert_eq!(cmd, PlayerCommand::SeekTo(42.5));

        let id = Uuid::new_v4();
        let cmd =
            PlayerCommand::from_wire("get-player-state", &[json!(id.to_string())]).unwrap();
        assert_eq!(cmd, PlayerCommand::GetPlayerState(id));
    }

    #[test]
    fn from_wire_rejects_unknown_names() {
        let err = PlayerCommand::from_wire("eject", &[]).unwrap_err();
        assert!(err.to_string().starts_with("Invalid command: eject"));
    }

    #[test]
    fn from_wire_enforces_argument_rules() {
        let err = PlayerCommand::from_wire("seek-to", &[json!(-3)]).unwrap_err();
        assert_eq!(err, ValidationError::NegativeSeek);

        // Non-numeric arguments fail the same rule as out-of-range ones.
        let err = PlayerCommand::from_wire("set-volume", &[json!("loud")]).unwrap_err();
        assert_eq!(err, ValidationError::VolumeOutOfRange);

        let err = PlayerCommand::from_wire("get-player-state", &[]).unwrap_err();
        assert!(matches!(err, ValidationError::MissingArgument { .. }));
    }
}
