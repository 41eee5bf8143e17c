use thiserror::Error;

/// The eight commands allowed across the window boundary.
pub const VALID_COMMANDS: [&str; 8] = [
    "play-video",
    "pause-video",
    "stop-video",
    "seek-to",
    "set-volume",
    "mute",
    "unmute",
    "get-player-state",
];

/// Rejection produced before a command is allowed to cross the window
/// boundary. Applied identically on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Seek time must be a non-negative number")]
    NegativeSeek,
    #[error("Volume must be between 0 and 100")]
    VolumeOutOfRange,
    #[error("Invalid command: {name}. Valid commands: {valid}")]
    UnknownCommand { name: String, valid: String },
    #[error("Command {command} is missing a required argument")]
    MissingArgument { command: &'static str },
}

/// Valid iff numeric and >= 0.
pub fn validate_seek(seconds: f64) -> Result<(), ValidationError> {
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NegativeSeek)
    }
}

/// Valid iff numeric and within [0, 100].
pub fn validate_volume(volume: f64) -> Result<(), ValidationError> {
    if volume.is_finite() && (0.0..=100.0).contains(&volume) {
        Ok(())
    } else {
        Err(ValidationError::VolumeOutOfRange)
    }
}

/// Valid iff `name` is one of the recognized command names.
pub fn validate_command_name(name: &str) -> Result<(), ValidationError> {
    if VALID_COMMANDS.contains(&name) {
        Ok(())
    } else {
        Err(ValidationError::UnknownCommand {
            name: name.to_string(),
            valid: VALID_COMMANDS.join(", "),
        })
    }
}
