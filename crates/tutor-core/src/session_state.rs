use crate::audio_host::{AudioHost, CaptureStream};
use crate::error::SessionError;
use crate::generic_types::{InboundEvent, OutboundMessage, Speaker};
use crate::pcm::{CAPTURE_BLOCK_SIZE, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE, encode_pcm_frame};
use crate::playback::PlaybackScheduler;
use crate::realtime_api::{LiveConnector, LiveTransport};
use crate::transcript::{TranscriptLine, TurnAggregator};
use crate::variants::{CODE_PUSH_INTERVAL, CallProfile, CodeStatePush, EditorSnapshot};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How often finished playback sources are released.
const REAP_INTERVAL: Duration = Duration::from_millis(50);

pub const STATUS_IDLE: &str = "Idle";
pub const STATUS_CONNECTING: &str = "Connecting to AI...";
pub const STATUS_STARTED: &str = "Call started. AI is listening...";
pub const STATUS_AI_SPEAKING: &str = "AI is speaking...";
pub const STATUS_USER_SPEAKING: &str = "You are speaking...";
pub const STATUS_LISTENING: &str = "AI is listening...";
pub const STATUS_INTERRUPTED: &str = "Interrupted, AI is thinking...";
pub const STATUS_ENDED: &str = "Call ended.";
pub const STATUS_ERROR: &str = "Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Error,
}

/// Pushed to the front end as the call progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    State(ConnectionState),
    Status(String),
    Line(TranscriptLine),
    Error(String),
}

/// Requests from the front end while a call runs.
#[derive(Debug, Clone, PartialEq)]
pub enum CallCommand {
    Stop,
    UpdateEditor(EditorSnapshot),
    RunOutput {
        code: String,
        outcome: Result<String, String>,
    },
}

/// Everything a UI needs to render the call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub status: String,
    pub error: Option<String>,
    pub lines: Vec<TranscriptLine>,
    pub pending_user: String,
    pub pending_assistant: String,
}

/// Resources of one call. Every handle is taken exactly once by `release`.
struct ActiveCall {
    profile: CallProfile,
    capture: Option<Box<dyn CaptureStream>>,
    capture_rx: Option<mpsc::Receiver<Vec<f32>>>,
    playback: PlaybackScheduler,
    transport: Option<Box<dyn LiveTransport>>,
    events: Option<mpsc::Receiver<InboundEvent>>,
    code_push: Option<CodeStatePush>,
    editor: EditorSnapshot,
}

impl ActiveCall {
    fn send(&self, message: OutboundMessage) -> Result<(), SessionError> {
        match &self.transport {
            Some(transport) => transport.send(message),
            None => Err(SessionError::Transport("no open transport".to_string())),
        }
    }

    fn release(&mut self) {
        self.capture_rx = None;
        if let Some(mut capture) = self.capture.take() {
            capture.release();
        }
        self.playback.teardown();
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.events = None;
    }
}

enum Activity {
    Inbound(Option<InboundEvent>),
    Capture(Option<Vec<f32>>),
}

/// Drives one live voice call at a time.
///
/// The controller owns the microphone, the playback context and the
/// transport of the current call. Starting a new call tears the previous one
/// down first, and every way a call can end goes through the same teardown.
pub struct SessionController {
    connector: Arc<dyn LiveConnector>,
    host: Box<dyn AudioHost>,
    state: ConnectionState,
    status: String,
    error: Option<String>,
    transcript: TurnAggregator,
    active: Option<ActiveCall>,
    rng: StdRng,
    notices: Option<mpsc::UnboundedSender<SessionNotice>>,
}

impl SessionController {
    pub fn new(connector: Arc<dyn LiveConnector>, host: Box<dyn AudioHost>) -> Self {
        Self {
            connector,
            host,
            state: ConnectionState::Idle,
            status: STATUS_IDLE.to_string(),
            error: None,
            transcript: TurnAggregator::new(),
            active: None,
            rng: StdRng::from_entropy(),
            notices: None,
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_notices(mut self, notices: mpsc::UnboundedSender<SessionNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        )
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            status: self.status.clone(),
            error: self.error.clone(),
            lines: self.transcript.lines().to_vec(),
            pending_user: self.transcript.pending(Speaker::User).to_string(),
            pending_assistant: self.transcript.pending(Speaker::Assistant).to_string(),
        }
    }

    /// Starts a call with `profile`, replacing any call in progress.
    ///
    /// Returns once the transport is connecting; the call becomes `Open` when
    /// the provider confirms the session.
    pub async fn start(&mut self, profile: CallProfile) -> Result<(), SessionError> {
        self.teardown();
        self.transcript.reset();
        self.error = None;
        self.set_state(ConnectionState::Connecting);
        self.set_status(STATUS_CONNECTING);
        tracing::info!("starting {:?} call", profile.kind);

        let capture = match self
            .host
            .request_microphone(INPUT_SAMPLE_RATE, CAPTURE_BLOCK_SIZE)
        {
            Ok(capture) => capture,
            Err(e) => return Err(self.fail(e)),
        };
        let context = match self.host.open_playback(OUTPUT_SAMPLE_RATE) {
            Ok(context) => context,
            Err(e) => {
                let mut capture = capture;
                capture.release();
                return Err(self.fail(e));
            }
        };

        let mut call = ActiveCall {
            code_push: profile.code_push.then(CodeStatePush::new),
            profile,
            capture: Some(capture),
            capture_rx: None,
            playback: PlaybackScheduler::new(context),
            transport: None,
            events: None,
            editor: EditorSnapshot::default(),
        };

        let connector = self.connector.clone();
        match connector.connect(&call.profile.session_config()).await {
            Ok(link) => {
                call.transport = Some(link.transport);
                call.events = Some(link.events);
                self.active = Some(call);
                Ok(())
            }
            Err(e) => {
                call.release();
                Err(self.fail(e))
            }
        }
    }

    /// Ends the call at the user's request. Safe to call at any time.
    pub fn stop(&mut self) {
        if self.active.is_none() && !self.is_live() {
            return;
        }
        self.set_state(ConnectionState::Closing);
        self.teardown();
        self.error = None;
        self.set_state(ConnectionState::Closed);
        self.set_status(STATUS_IDLE);
        tracing::info!("call stopped");
    }

    /// Applies one inbound event.
    pub fn dispatch(&mut self, event: InboundEvent) {
        if self.active.is_none() {
            tracing::debug!("dropping event without an active call: {:?}", event);
            return;
        }
        match event {
            InboundEvent::Opened => self.on_open(),
            InboundEvent::AudioChunk { data } => self.on_audio(&data),
            InboundEvent::TranscriptFragment { speaker, text } => {
                self.transcript.on_fragment(speaker, &text);
                if speaker == Speaker::User {
                    self.set_status(STATUS_USER_SPEAKING);
                }
            }
            InboundEvent::TurnComplete => {
                for line in self.transcript.on_turn_complete() {
                    tracing::debug!("{}", line);
                    self.notify(SessionNotice::Line(line));
                }
                self.set_status(STATUS_LISTENING);
            }
            InboundEvent::Interrupted => {
                if let Some(call) = self.active.as_mut() {
                    call.playback.interrupt();
                }
                self.transcript.on_interrupted();
                self.set_status(STATUS_INTERRUPTED);
            }
            InboundEvent::Closed { reason } => {
                tracing::info!("call closed by remote: {:?}", reason);
                self.teardown();
                self.set_state(ConnectionState::Closed);
                self.set_status(STATUS_ENDED);
            }
            InboundEvent::TransportError(reason) => {
                self.fail(SessionError::Transport(reason));
            }
        }
    }

    /// Encodes one microphone block and sends it without waiting.
    pub fn on_capture_block(&mut self, block: &[f32]) {
        if self.state != ConnectionState::Open {
            return;
        }
        let Some(call) = self.active.as_ref() else {
            return;
        };
        let blob = encode_pcm_frame(block);
        if let Err(e) = call.send(OutboundMessage::Media(blob)) {
            tracing::warn!("dropping capture block: {}", e);
        }
    }

    /// Records what the code editor shows now. Only coding calls use it.
    /// A snapshot without run output keeps the output of the last run.
    pub fn update_editor(&mut self, snapshot: EditorSnapshot) {
        if let Some(call) = self.active.as_mut() {
            let EditorSnapshot { code, run_output } = snapshot;
            call.editor.code = code;
            if run_output.is_some() {
                call.editor.run_output = run_output;
            }
        }
    }

    /// Tells the model about a code run right away.
    pub fn report_run_output(&mut self, code: &str, outcome: Result<String, String>) {
        if self.state != ConnectionState::Open {
            return;
        }
        let Some(call) = self.active.as_mut() else {
            return;
        };
        let Some(push) = call.code_push.as_mut() else {
            return;
        };
        let message = push.report_run(code, &outcome);
        call.editor = EditorSnapshot {
            code: code.to_string(),
            run_output: Some(match outcome {
                Ok(output) => output,
                Err(error) => error,
            }),
        };
        if let Err(e) = call.send(OutboundMessage::Text(message)) {
            tracing::warn!("failed to report run output: {}", e);
        }
    }

    /// One code-push tick: sends the editor state if it changed.
    pub fn push_code_state(&mut self) {
        if self.state != ConnectionState::Open {
            return;
        }
        let Some(call) = self.active.as_mut() else {
            return;
        };
        let Some(push) = call.code_push.as_mut() else {
            return;
        };
        if let Some(message) = push.on_tick(&call.editor) {
            tracing::debug!("pushing editor state ({} bytes)", call.editor.code.len());
            if let Err(e) = call.send(OutboundMessage::Text(message)) {
                tracing::warn!("failed to push editor state: {}", e);
            }
        }
    }

    pub fn reap_playback(&mut self) {
        if let Some(call) = self.active.as_mut() {
            let reaped = call.playback.reap_finished();
            if reaped > 0 {
                tracing::trace!("released {} finished playback sources", reaped);
            }
        }
    }

    /// Runs the current call until it closes, fails or is stopped.
    ///
    /// Returns immediately when no call is connecting or open. A dropped
    /// command sender counts as a stop.
    pub async fn run(&mut self, commands: &mut mpsc::Receiver<CallCommand>) {
        let mut push_tick =
            tokio::time::interval_at(Instant::now() + CODE_PUSH_INTERVAL, CODE_PUSH_INTERVAL);
        let mut reap_tick = tokio::time::interval(REAP_INTERVAL);
        reap_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while self.is_live() {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(CallCommand::Stop) | None => self.stop(),
                    Some(CallCommand::UpdateEditor(snapshot)) => self.update_editor(snapshot),
                    Some(CallCommand::RunOutput { code, outcome }) => {
                        self.report_run_output(&code, outcome)
                    }
                },
                activity = self.next_activity() => match activity {
                    Activity::Inbound(Some(event)) => self.dispatch(event),
                    Activity::Inbound(None) => {
                        tracing::warn!("event stream ended without a close");
                        self.dispatch(InboundEvent::Closed { reason: None });
                    }
                    Activity::Capture(Some(block)) => self.on_capture_block(&block),
                    Activity::Capture(None) => {
                        tracing::warn!("capture stream ended");
                        if let Some(call) = self.active.as_mut() {
                            call.capture_rx = None;
                        }
                    }
                },
                _ = push_tick.tick() => self.push_code_state(),
                _ = reap_tick.tick() => self.reap_playback(),
            }
        }
    }

    async fn next_activity(&mut self) -> Activity {
        let Some(call) = self.active.as_mut() else {
            return std::future::pending().await;
        };
        tokio::select! {
            event = recv_opt(&mut call.events) => Activity::Inbound(event),
            block = recv_opt(&mut call.capture_rx) => Activity::Capture(block),
        }
    }

    fn on_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            tracing::debug!("ignoring duplicate open in state {:?}", self.state);
            return;
        }
        let Some(call) = self.active.as_mut() else {
            return;
        };
        let opening = call.profile.opening.resolve(&mut self.rng);
        if let Err(e) = call.send(OutboundMessage::Text(opening)) {
            tracing::warn!("failed to send opening message: {}", e);
        }
        let tap = match call.capture.as_mut() {
            Some(capture) => capture.attach_tap(),
            None => Err(SessionError::PermissionDenied(
                "microphone already released".to_string(),
            )),
        };
        match tap {
            Ok(rx) => {
                call.capture_rx = Some(rx);
                self.set_state(ConnectionState::Open);
                self.set_status(STATUS_STARTED);
                tracing::info!("call open");
            }
            Err(e) => {
                self.fail(e);
            }
        }
    }

    fn on_audio(&mut self, data: &str) {
        let Some(call) = self.active.as_mut() else {
            return;
        };
        match call.playback.enqueue(data, OUTPUT_SAMPLE_RATE, 1) {
            Ok(_) => self.set_status(STATUS_AI_SPEAKING),
            Err(e) => {
                tracing::error!("{}", e);
                self.set_error(e.user_message());
            }
        }
    }

    /// Moves to `Error`, releases everything and hands the error back.
    fn fail(&mut self, error: SessionError) -> SessionError {
        tracing::error!("call failed: {}", error);
        self.teardown();
        self.set_state(ConnectionState::Error);
        self.set_status(STATUS_ERROR);
        self.set_error(error.user_message());
        error
    }

    fn teardown(&mut self) {
        if let Some(mut call) = self.active.take() {
            call.release();
            tracing::debug!("released call resources");
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!("state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.notify(SessionNotice::State(state));
        }
    }

    fn set_status(&mut self, status: &str) {
        if self.status != status {
            self.status = status.to_string();
            self.notify(SessionNotice::Status(self.status.clone()));
        }
    }

    fn set_error(&mut self, message: String) {
        self.error = Some(message.clone());
        self.notify(SessionNotice::Error(message));
    }

    fn notify(&self, notice: SessionNotice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }
}

async fn recv_opt<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
