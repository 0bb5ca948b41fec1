use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use difychat_core::domain::conversation::{ConversationId, ConversationTurn};

pub mod conversation;
pub mod memory;

pub use conversation::SqlConversationRepository;
pub use memory::InMemoryConversationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Selects the most recent turns, newest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryFilter {
    pub limit: u32,
    /// Exclusive upper bound on `timestamp`.
    pub before: Option<DateTime<Utc>>,
    pub conversation_id: Option<ConversationId>,
}

impl HistoryFilter {
    pub fn latest(limit: u32) -> Self {
        Self { limit, before: None, conversation_id: None }
    }
}

/// Append-only store of conversation turns. Turns are never updated or deleted.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn append(&self, turn: &ConversationTurn) -> Result<(), RepositoryError>;

    async fn recent(&self, filter: &HistoryFilter)
        -> Result<Vec<ConversationTurn>, RepositoryError>;

    async fn count_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<u64, RepositoryError>;
}
