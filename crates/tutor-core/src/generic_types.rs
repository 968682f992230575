use crate::pcm::PcmBlob;
use std::fmt;

/// Who said a piece of the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Assistant => "AI",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Provider-independent events delivered by a live transport, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// The session is configured and accepts input.
    Opened,
    /// Base64 PCM16 mono at 24 kHz.
    AudioChunk { data: String },
    TranscriptFragment { speaker: Speaker, text: String },
    TurnComplete,
    /// The user barged in; the model stopped its current answer.
    Interrupted,
    Closed { reason: Option<String> },
    TransportError(String),
}

/// What the session pushes to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Media(PcmBlob),
}

/// Everything a provider needs to open a live session.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSessionConfig {
    pub system_instruction: String,
    pub voice: String,
    pub response_audio: bool,
    pub transcribe_input: bool,
    pub transcribe_output: bool,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            system_instruction: String::new(),
            voice: "Zephyr".to_string(),
            response_audio: true,
            transcribe_input: true,
            transcribe_output: true,
        }
    }
}
