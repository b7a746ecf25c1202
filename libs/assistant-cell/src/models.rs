use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

/// Prior turns kept when forwarding a conversation.
pub const MAX_HISTORY_TURNS: usize = 10;

pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssistantCategory {
    SymptomAnalysis,
    AppointmentBooking,
    MedicationInfo,
    HealthAdvice,
    MentalHealth,
    GeneralChat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    pub category: AssistantCategory,
    /// Set when an emergency keyword matched.
    pub urgent: bool,
}

impl Classification {
    pub fn general() -> Self {
        Self { category: AssistantCategory::GeneralChat, urgent: false }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Caller-held conversation window. Only the newest [`MAX_HISTORY_TURNS`]
/// turns survive, whether built by pushing or deserialized from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ChatTurn>", into = "Vec<ChatTurn>")]
pub struct ChatHistory {
    turns: VecDeque<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        if self.turns.len() == MAX_HISTORY_TURNS {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn turns(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl From<Vec<ChatTurn>> for ChatHistory {
    fn from(turns: Vec<ChatTurn>) -> Self {
        let mut history = Self::new();
        for turn in turns {
            history.push(turn);
        }
        history
    }
}

impl From<ChatHistory> for Vec<ChatTurn> {
    fn from(history: ChatHistory) -> Self {
        history.turns.into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: ChatHistory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Completion,
    Fallback,
    NotConfigured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantReply {
    pub reply: String,
    pub category: AssistantCategory,
    pub urgent: bool,
    pub source: ReplySource,
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Message is too long ({0} characters)")]
    MessageTooLong(usize),

    #[error("Completion request failed: {0}")]
    Upstream(String),

    #[error("Completion request timed out after {0}s")]
    Timeout(u64),

    #[error("Unexpected completion response: {0}")]
    InvalidResponse(String),
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::EmptyMessage | AssistantError::MessageTooLong(_) => {
                AppError::ValidationError(err.to_string())
            }
            AssistantError::Upstream(_)
            | AssistantError::Timeout(_)
            | AssistantError::InvalidResponse(_) => AppError::ExternalService(err.to_string()),
        }
    }
}

pub fn validate_message(message: &str) -> Result<(), AssistantError> {
    if message.trim().is_empty() {
        return Err(AssistantError::EmptyMessage);
    }
    let length = message.chars().count();
    if length > MAX_MESSAGE_CHARS {
        return Err(AssistantError::MessageTooLong(length));
    }
    Ok(())
}
