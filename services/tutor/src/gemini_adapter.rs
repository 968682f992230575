use async_trait::async_trait;
use gemini_live::types::{Blob, Modality, ServerEvent, ServerMessage, Setup};
use gemini_live::{Client, ServerRx};
use std::sync::Arc;
use tokio::sync::mpsc;
use tutor_core::error::SessionError;
use tutor_core::generic_types::{InboundEvent, LiveSessionConfig, OutboundMessage, Speaker};
use tutor_core::keystore::ApiKeyStore;
use tutor_core::realtime_api::{LiveConnector, LiveLink, LiveTransport};

/// Opens Gemini Live sessions for the call controller.
pub struct GeminiConnector {
    keys: Arc<dyn ApiKeyStore>,
    base_url: String,
    model: String,
    capacity: usize,
}

impl GeminiConnector {
    pub fn new(keys: Arc<dyn ApiKeyStore>, base_url: &str, model: &str, capacity: usize) -> Self {
        Self {
            keys,
            base_url: base_url.to_string(),
            model: model.to_string(),
            capacity,
        }
    }
}

#[async_trait]
impl LiveConnector for GeminiConnector {
    async fn connect(&self, config: &LiveSessionConfig) -> Result<LiveLink, SessionError> {
        // The key is read per call so a newly saved key takes effect without a restart.
        let api_key = self.keys.load().ok_or(SessionError::MissingApiKey)?;
        let client_config = gemini_live::ConfigBuilder::new()
            .with_base_url(&self.base_url)
            .with_api_key(api_key)
            .with_model(&self.model)
            .build();

        let (client, server_rx) = gemini_live::connect_with_config(
            self.capacity,
            client_config,
            build_setup(&self.model, config),
        )
        .await
        .map_err(|e| SessionError::Transport(format!("{:#}", e)))?;

        let (tx, rx) = mpsc::channel(self.capacity);
        tokio::spawn(forward_events(server_rx, tx));

        Ok(LiveLink {
            transport: Box::new(GeminiTransport { client }),
            events: rx,
        })
    }
}

/// Sending half of a Gemini Live session.
pub struct GeminiTransport {
    client: Client,
}

impl LiveTransport for GeminiTransport {
    fn send(&self, message: OutboundMessage) -> Result<(), SessionError> {
        let result = match message {
            OutboundMessage::Text(text) => self.client.send_text(&text),
            OutboundMessage::Media(blob) => self.client.send_audio(Blob {
                mime_type: blob.mime_type,
                data: blob.data,
            }),
        };
        result.map_err(|e| SessionError::Transport(e.to_string()))
    }

    fn close(&mut self) {
        if !self.client.is_connected() {
            return;
        }
        match self.client.stats() {
            Ok(stats) => tracing::info!(
                "session usage: prompt={} response={} total={} tokens",
                stats.prompt_tokens(),
                stats.response_tokens(),
                stats.total_tokens()
            ),
            Err(e) => tracing::warn!("{}", e),
        }
        self.client.close();
    }
}

pub fn build_setup(model: &str, config: &LiveSessionConfig) -> Setup {
    let modality = if config.response_audio {
        Modality::Audio
    } else {
        Modality::Text
    };
    let mut setup = Setup::new(model)
        .with_response_modalities(vec![modality])
        .with_voice(&config.voice)
        .with_input_transcription(config.transcribe_input)
        .with_output_transcription(config.transcribe_output);
    if !config.system_instruction.is_empty() {
        setup = setup.with_system_instruction(&config.system_instruction);
    }
    setup
}

/// Flattens one server message into events, in the order they must be applied:
/// open, audio, user transcript, model transcript, turn end, interruption.
pub fn translate(message: ServerMessage) -> Vec<InboundEvent> {
    let mut events = Vec::new();
    if message.setup_complete.is_some() {
        events.push(InboundEvent::Opened);
    }
    let Some(content) = message.server_content else {
        return events;
    };

    if let Some(turn) = content.model_turn {
        for part in turn.parts {
            match part.inline_data {
                Some(blob) if blob.mime_type.starts_with("audio/") => {
                    events.push(InboundEvent::AudioChunk { data: blob.data });
                }
                Some(blob) => tracing::debug!("ignoring inline data of type {}", blob.mime_type),
                None => {}
            }
        }
    }
    if let Some(transcription) = content.input_transcription {
        if !transcription.text.is_empty() {
            events.push(InboundEvent::TranscriptFragment {
                speaker: Speaker::User,
                text: transcription.text,
            });
        }
    }
    if let Some(transcription) = content.output_transcription {
        if !transcription.text.is_empty() {
            events.push(InboundEvent::TranscriptFragment {
                speaker: Speaker::Assistant,
                text: transcription.text,
            });
        }
    }
    if content.turn_complete == Some(true) {
        events.push(InboundEvent::TurnComplete);
    }
    if content.interrupted == Some(true) {
        events.push(InboundEvent::Interrupted);
    }
    events
}

async fn forward_events(mut server_rx: ServerRx, tx: mpsc::Sender<InboundEvent>) {
    while let Some(event) = server_rx.recv().await {
        let events = match event {
            ServerEvent::Message(message) => translate(message),
            ServerEvent::Close { reason } => vec![InboundEvent::Closed { reason }],
            ServerEvent::Error(e) => vec![InboundEvent::TransportError(e)],
        };
        for event in events {
            if tx.send(event).await.is_err() {
                tracing::debug!("session dropped its event receiver");
                return;
            }
        }
    }
}
