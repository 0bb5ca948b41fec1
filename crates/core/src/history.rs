//! Transcript reconstruction from stored turns.
//!
//! The server returns the most recent turns first; callers that render a
//! conversation sort ascending by timestamp and flatten each turn into a
//! user message followed by an assistant message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ConversationId, ConversationTurn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self { role: Role::User, content: content.into(), timestamp }
    }

    pub fn assistant(content: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self { role: Role::Assistant, content: content.into(), timestamp }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    pub messages: Vec<ChatMessage>,
    pub conversation_id: Option<ConversationId>,
}

/// Stable ascending sort; turns with equal timestamps keep their input order.
pub fn order_turns(mut turns: Vec<ConversationTurn>) -> Vec<ConversationTurn> {
    turns.sort_by(|left, right| left.timestamp.cmp(&right.timestamp));
    turns
}

pub fn flatten_turns(turns: &[ConversationTurn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .flat_map(|turn| {
            [
                ChatMessage::user(turn.user_message.clone(), Some(turn.timestamp)),
                ChatMessage::assistant(turn.assistant_message.clone(), Some(turn.timestamp)),
            ]
        })
        .collect()
}

pub fn build_transcript(turns: Vec<ConversationTurn>) -> Transcript {
    let ordered = order_turns(turns);
    let conversation_id = ordered.last().map(|turn| turn.conversation_id.clone());
    Transcript { messages: flatten_turns(&ordered), conversation_id }
}
