//! Provider- and device-independent core of the voice tutor: the call
//! controller, audio scheduling, transcripts and the three call modes.

pub mod audio_host;
pub mod error;
pub mod generic_types;
pub mod keystore;
pub mod pcm;
pub mod playback;
pub mod realtime_api;
pub mod session_state;
pub mod transcript;
pub mod variants;

pub use error::{DecodeError, SessionError};
pub use generic_types::{InboundEvent, LiveSessionConfig, OutboundMessage, Speaker};
pub use session_state::{
    CallCommand, ConnectionState, SessionController, SessionNotice, SessionSnapshot,
};
pub use variants::{CallKind, CallProfile, EditorSnapshot};
