use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub String);

impl TurnId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Opaque grouping key issued by the upstream service. Never interpreted locally.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Empty and whitespace-only ids are treated as "no conversation yet".
    pub fn from_optional(raw: Option<String>) -> Option<Self> {
        raw.filter(|value| !value.trim().is_empty()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One user-message / assistant-reply exchange. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub user_message: String,
    pub assistant_message: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: ConversationId,
}

impl ConversationTurn {
    pub fn new(
        user_message: impl Into<String>,
        assistant_message: impl Into<String>,
        conversation_id: ConversationId,
    ) -> Result<Self, DomainError> {
        Self::recorded_at(user_message, assistant_message, conversation_id, Utc::now())
    }

    pub fn recorded_at(
        user_message: impl Into<String>,
        assistant_message: impl Into<String>,
        conversation_id: ConversationId,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let user_message = user_message.into();
        let assistant_message = assistant_message.into();

        if user_message.trim().is_empty() {
            return Err(DomainError::EmptyField("user_message"));
        }
        if assistant_message.trim().is_empty() {
            return Err(DomainError::EmptyField("assistant_message"));
        }
        if conversation_id.as_str().trim().is_empty() {
            return Err(DomainError::EmptyField("conversation_id"));
        }

        Ok(Self {
            id: TurnId::generate(),
            user_message,
            assistant_message,
            timestamp: storage_precision(timestamp),
            conversation_id,
        })
    }
}

/// Fixed-width UTC rendering; lexical order of these strings equals chronological order.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| DomainError::InvalidTimestamp(raw.to_string()))
}

fn storage_precision(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    // Round-trip through the stored form so in-memory and persisted turns compare equal.
    parse_timestamp(&format_timestamp(&timestamp)).unwrap_or(timestamp)
}
