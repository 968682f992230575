/// Failures while turning an inbound base64 payload into playable audio.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload of {0} bytes is not a whole number of 16-bit samples")]
    OddLength(usize),
    #[error("payload contains no audio frames")]
    Empty,
    #[error("channel count must be at least 1")]
    NoChannels,
}

/// Everything that can go wrong in a live call.
///
/// Only `PermissionDenied`, `Transport` and `MissingApiKey` end a session.
/// `Decode` is recovered per chunk.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("microphone unavailable: {0}")]
    PermissionDenied(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode audio chunk: {0}")]
    Decode(#[from] DecodeError),
    #[error("playback device error: {0}")]
    Playback(String),
    #[error("{0}")]
    InvalidProfile(String),
    #[error("no Gemini API key configured")]
    MissingApiKey,
}

impl SessionError {
    /// The single error string shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::PermissionDenied(reason) => format!(
                "Failed to start call: {}. Ensure microphone access is granted.",
                reason
            ),
            SessionError::Transport(_) => "Connection error with AI. Please try again.".to_string(),
            SessionError::Decode(_) => "Error processing AI audio.".to_string(),
            SessionError::Playback(reason) => format!("Audio playback failed: {}", reason),
            SessionError::InvalidProfile(reason) => reason.clone(),
            SessionError::MissingApiKey => {
                "No Gemini API key configured. Save one in the key file or set GEMINI_API_KEY."
                    .to_string()
            }
        }
    }
}
