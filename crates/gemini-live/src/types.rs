//! Wire types for the Gemini Live bidirectional streaming protocol.
//!
//! Outgoing frames are externally tagged (`{"setup": {...}}`,
//! `{"realtimeInput": {...}}`); incoming frames carry optional top-level
//! fields, any combination of which may be present in one message.

use serde::{Deserialize, Serialize};

// Outgoing messages

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
}

/// Session configuration, sent once as the first frame of a connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<AudioTranscriptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<AudioTranscriptionConfig>,
}

impl Setup {
    /// Creates a setup for `model`; the `models/` resource prefix is added when missing.
    pub fn new(model: &str) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        Self {
            model,
            generation_config: GenerationConfig::default(),
            system_instruction: None,
            input_audio_transcription: None,
            output_audio_transcription: None,
        }
    }

    pub fn with_response_modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.generation_config.response_modalities = modalities;
        self
    }

    pub fn with_voice(mut self, voice_name: &str) -> Self {
        self.generation_config.speech_config = Some(SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice_name.to_string(),
                },
            },
        });
        self
    }

    pub fn with_system_instruction(mut self, instruction: &str) -> Self {
        self.system_instruction = Some(Content {
            parts: vec![Part::text(instruction)],
        });
        self
    }

    pub fn with_input_transcription(mut self, enabled: bool) -> Self {
        self.input_audio_transcription = enabled.then_some(AudioTranscriptionConfig {});
        self
    }

    pub fn with_output_transcription(mut self, enabled: bool) -> Self {
        self.output_audio_transcription = enabled.then_some(AudioTranscriptionConfig {});
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Audio,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// Serializes to `{}`; presence alone enables transcription for that direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioTranscriptionConfig {}

/// Input streamed without waiting for an acknowledgment.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media_chunks: Vec<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl RealtimeInput {
    pub fn text(text: &str) -> Self {
        Self {
            media_chunks: vec![],
            text: Some(text.to_string()),
        }
    }

    pub fn media(blob: Blob) -> Self {
        Self {
            media_chunks: vec![blob],
            text: None,
        }
    }
}

// Shared content types

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }
}

/// Base64 payload tagged with its MIME type, e.g. `audio/pcm;rate=16000`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

// Incoming messages

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<SetupComplete>,
    pub server_content: Option<LiveServerContent>,
    pub usage_metadata: Option<UsageMetadata>,
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetupComplete {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveServerContent {
    pub model_turn: Option<Content>,
    pub turn_complete: Option<bool>,
    pub interrupted: Option<bool>,
    pub generation_complete: Option<bool>,
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<i64>,
    pub response_token_count: Option<i64>,
    pub total_token_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    pub time_left: Option<String>,
}

/// What the connection's reader task hands to the consumer.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Message(ServerMessage),
    Close { reason: Option<String> },
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_serializes_to_live_wire_shape() {
        let setup = Setup::new("gemini-2.5-flash-native-audio-preview-09-2025")
            .with_response_modalities(vec![Modality::Audio])
            .with_voice("Zephyr")
            .with_system_instruction("Be concise.")
            .with_input_transcription(true)
            .with_output_transcription(true);

        let value = serde_json::to_value(ClientMessage::Setup(setup)).unwrap();

        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/gemini-2.5-flash-native-audio-preview-09-2025",
                    "generationConfig": {
                        "responseModalities": ["AUDIO"],
                        "speechConfig": {
                            "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Zephyr" } }
                        }
                    },
                    "systemInstruction": { "parts": [{ "text": "Be concise." }] },
                    "inputAudioTranscription": {},
                    "outputAudioTranscription": {}
                }
            })
        );
    }

    #[test]
    fn test_setup_keeps_existing_model_prefix() {
        let setup = Setup::new("models/custom");
        assert_eq!(setup.model, "models/custom");
    }

    #[test]
    fn test_realtime_input_shapes() {
        let text = serde_json::to_value(ClientMessage::RealtimeInput(RealtimeInput::text("hi"))).unwrap();
        assert_eq!(text, json!({ "realtimeInput": { "text": "hi" } }));

        let media = serde_json::to_value(ClientMessage::RealtimeInput(RealtimeInput::media(Blob {
            mime_type: "audio/pcm;rate=16000".to_string(),
            data: "AAA=".to_string(),
        })))
        .unwrap();
        assert_eq!(
            media,
            json!({
                "realtimeInput": {
                    "mediaChunks": [{ "mimeType": "audio/pcm;rate=16000", "data": "AAA=" }]
                }
            })
        );
    }

    #[test]
    fn test_server_content_deserializes() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": { "parts": [{ "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAAA" } }] },
                "outputTranscription": { "text": "Hello" },
                "turnComplete": true
            }
        }"#;
        let message: ServerMessage = serde_json::from_str(raw).unwrap();
        let content = message.server_content.unwrap();

        let parts = content.model_turn.unwrap().parts;
        assert_eq!(parts[0].inline_data.as_ref().unwrap().data, "AAAA");
        assert_eq!(content.output_transcription.unwrap().text, "Hello");
        assert_eq!(content.turn_complete, Some(true));
        assert!(content.interrupted.is_none());
        assert!(message.setup_complete.is_none());
    }

    #[test]
    fn test_setup_complete_and_usage_deserialize() {
        let message: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        assert!(message.setup_complete.is_some());

        let message: ServerMessage = serde_json::from_str(
            r#"{"usageMetadata": {"promptTokenCount": 10, "responseTokenCount": 5, "totalTokenCount": 15}}"#,
        )
        .unwrap();
        let usage = message.usage_metadata.unwrap();
        assert_eq!(usage.total_token_count, Some(15));
    }
}
