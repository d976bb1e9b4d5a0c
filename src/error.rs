use thiserror::Error;

/// Errors surfaced by the queue core and turned into chat replies at the
/// command boundary. None of them is fatal to the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BotError {
    /// The input could not be turned into a playable track.
    #[error("Error playing audio: {0}")]
    Resolution(String),

    /// An uploaded attachment could not be downloaded or stored.
    #[error("Error playing file: {0}")]
    Upload(String),

    /// No voice channel is available for the operation.
    #[error("{0}")]
    Connection(String),

    /// The request itself is invalid (volume range, file type, full queue).
    #[error("{0}")]
    Validation(String),

    /// The transport failed to start or keep playing a track.
    #[error("Playback failed: {0}")]
    Playback(String),

    /// The guild player task is gone.
    #[error("Player for this server is unavailable")]
    Unavailable,
}

impl BotError {
    pub fn resolution(cause: impl Into<String>) -> Self {
        Self::Resolution(cause.into())
    }

    pub fn upload(cause: impl Into<String>) -> Self {
        Self::Upload(cause.into())
    }

    pub fn connection(cause: impl Into<String>) -> Self {
        Self::Connection(cause.into())
    }

    pub fn validation(cause: impl Into<String>) -> Self {
        Self::Validation(cause.into())
    }

    pub fn playback(cause: impl Into<String>) -> Self {
        Self::Playback(cause.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            BotError::validation("Volume must be between 0 and 100!").to_string(),
            "Volume must be between 0 and 100!"
        );
        assert_eq!(
            BotError::resolution("no results").to_string(),
            "Error playing audio: no results"
        );
        assert_eq!(
            BotError::upload("download failed with status 404 Not Found").to_string(),
            "Error playing file: download failed with status 404 Not Found"
        );
        assert_eq!(
            BotError::playback("decoder died").to_string(),
            "Playback failed: decoder died"
        );
    }
}
