//! The three call modes: free chat, mock interview and coding assistant.
//!
//! They share one pipeline and differ only in the framing carried by
//! [`CallProfile`].

use crate::error::SessionError;
use crate::generic_types::LiveSessionConfig;
use rand::Rng;
use rand::seq::SliceRandom;
use std::time::Duration;

pub const FREE_CHAT_GREETINGS: [&str; 4] = [
    "Hey there! How's your day going? Ready to conquer the world?",
    "Hello! What's on your mind today? I'm all ears.",
    "Hi! Ready to learn something new or just want to chat?",
    "Greetings! How can I boost your confidence today?",
];

pub const FREE_CHAT_INSTRUCTION: &str = "You are a helpful, confident friend. If the user speaks a language like Urdu, Hindi, Spanish, reply in that language fluently. Be concise and encouraging. Always greet warmly.";

pub const CODING_INSTRUCTION: &str = "You are a coding assistant. The user is writing code. Monitor their logic. If they pause or ask, help them. Be concise.";

pub const CODING_OPENING: &str = "Session started. I am ready to code.";

pub const CHAT_VOICE: &str = "Zephyr";
pub const INTERVIEW_VOICE: &str = "Puck";

/// How often the coding mode looks at the editor.
pub const CODE_PUSH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    FreeChat,
    Interview { field: String },
    Coding { language: String, goal: String },
}

impl CallKind {
    /// Key used to look up an instruction override in the prompts directory.
    pub fn prompt_key(&self) -> &'static str {
        match self {
            CallKind::FreeChat => "free_chat",
            CallKind::Interview { .. } => "interview",
            CallKind::Coding { .. } => "coding",
        }
    }
}

/// First text turn sent once the session opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpeningMessage {
    RandomGreeting(Vec<String>),
    Fixed(String),
}

impl OpeningMessage {
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match self {
            OpeningMessage::RandomGreeting(greetings) => {
                greetings.choose(rng).cloned().unwrap_or_default()
            }
            OpeningMessage::Fixed(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallProfile {
    pub kind: CallKind,
    pub system_instruction: String,
    pub voice: String,
    pub opening: OpeningMessage,
    pub code_push: bool,
}

impl CallProfile {
    pub fn free_chat() -> Self {
        Self {
            kind: CallKind::FreeChat,
            system_instruction: FREE_CHAT_INSTRUCTION.to_string(),
            voice: CHAT_VOICE.to_string(),
            opening: OpeningMessage::RandomGreeting(
                FREE_CHAT_GREETINGS.iter().map(|g| g.to_string()).collect(),
            ),
            code_push: false,
        }
    }

    pub fn interview(field: &str) -> Result<Self, SessionError> {
        let field = field.trim();
        if field.is_empty() {
            return Err(SessionError::InvalidProfile(
                "Please enter a job field or topic.".to_string(),
            ));
        }
        Ok(Self {
            kind: CallKind::Interview {
                field: field.to_string(),
            },
            system_instruction: interview_instruction(field),
            voice: INTERVIEW_VOICE.to_string(),
            opening: OpeningMessage::Fixed(format!(
                "Start the interview for a {} role. Ask your first question.",
                field
            )),
            code_push: false,
        })
    }

    pub fn coding(language: &str, goal: &str) -> Self {
        Self {
            kind: CallKind::Coding {
                language: language.to_string(),
                goal: goal.to_string(),
            },
            system_instruction: coding_instruction(CODING_INSTRUCTION, language, goal),
            voice: CHAT_VOICE.to_string(),
            opening: OpeningMessage::Fixed(CODING_OPENING.to_string()),
            code_push: true,
        }
    }

    /// Replaces the base instruction, e.g. from a prompt file.
    ///
    /// Interview overrides may use `{field}`; coding overrides keep the
    /// generated goal line appended.
    pub fn with_system_instruction(mut self, instruction: &str) -> Self {
        self.system_instruction = match &self.kind {
            CallKind::FreeChat => instruction.to_string(),
            CallKind::Interview { field } => instruction.replace("{field}", field),
            CallKind::Coding { language, goal } => coding_instruction(instruction, language, goal),
        };
        self
    }

    pub fn session_config(&self) -> LiveSessionConfig {
        LiveSessionConfig {
            system_instruction: self.system_instruction.clone(),
            voice: self.voice.clone(),
            response_audio: true,
            transcribe_input: true,
            transcribe_output: true,
        }
    }
}

fn interview_instruction(field: &str) -> String {
    format!(
        "You are an AI interviewer specializing in {}. You will ask common interview questions one by one. After each user response, you will provide constructive feedback or a follow-up question. Your goal is to simulate a realistic interview experience.",
        field
    )
}

fn coding_instruction(base: &str, language: &str, goal: &str) -> String {
    format!(
        "{}\nUser Goal: Create a program in {} that: {}.",
        base.trim_end(),
        language,
        goal
    )
}

/// What the coding surface currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub code: String,
    pub run_output: Option<String>,
}

impl EditorSnapshot {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            run_output: None,
        }
    }
}

/// Content-equality gate for the periodic code push.
#[derive(Debug, Default)]
pub struct CodeStatePush {
    last_sent: Option<EditorSnapshot>,
}

impl CodeStatePush {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the message to send for this tick, if the editor changed since
    /// the last one that went out.
    pub fn on_tick(&mut self, snapshot: &EditorSnapshot) -> Option<String> {
        if snapshot.code.trim().is_empty() || self.last_sent.as_ref() == Some(snapshot) {
            return None;
        }
        let mut message = format!("[SYSTEM] User paused. Current Code:\n{}", snapshot.code);
        if let Some(output) = &snapshot.run_output {
            message.push_str("\nLast Output:\n");
            message.push_str(output);
        }
        self.last_sent = Some(snapshot.clone());
        Some(message)
    }

    /// Builds the message for a finished code run and marks that state as sent.
    pub fn report_run(&mut self, code: &str, outcome: &Result<String, String>) -> String {
        let (message, output) = match outcome {
            Ok(output) => (
                format!("[SYSTEM] User ran code. Output:\n{}", output),
                output.clone(),
            ),
            Err(error) => (
                format!("[SYSTEM] User ran code and got ERROR:\n{}", error),
                error.clone(),
            ),
        };
        self.last_sent = Some(EditorSnapshot {
            code: code.to_string(),
            run_output: Some(output),
        });
        message
    }
}
