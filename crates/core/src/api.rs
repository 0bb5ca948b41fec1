//! JSON contract shared by the HTTP service and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ConversationId, ConversationTurn, TurnId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// One element of the `GET /api/chat/history` array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub id: String,
    pub user_message: String,
    pub assistant_message: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: String,
}

impl From<ConversationTurn> for TurnRecord {
    fn from(turn: ConversationTurn) -> Self {
        Self {
            id: turn.id.0,
            user_message: turn.user_message,
            assistant_message: turn.assistant_message,
            timestamp: turn.timestamp,
            conversation_id: turn.conversation_id.0,
        }
    }
}

impl From<TurnRecord> for ConversationTurn {
    fn from(record: TurnRecord) -> Self {
        Self {
            id: TurnId(record.id),
            user_message: record.user_message,
            assistant_message: record.assistant_message,
            timestamp: record.timestamp,
            conversation_id: ConversationId(record.conversation_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallLinkResponse {
    pub install_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
}
