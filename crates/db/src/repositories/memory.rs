use tokio::sync::RwLock;

use difychat_core::domain::conversation::{ConversationId, ConversationTurn};

use super::{ConversationRepository, HistoryFilter, RepositoryError};

#[derive(Default)]
pub struct InMemoryConversationRepository {
    turns: RwLock<Vec<ConversationTurn>>,
}

impl InMemoryConversationRepository {
    pub async fn len(&self) -> usize {
        self.turns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.turns.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn append(&self, turn: &ConversationTurn) -> Result<(), RepositoryError> {
        let mut turns = self.turns.write().await;
        turns.push(turn.clone());
        Ok(())
    }

    async fn recent(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let turns = self.turns.read().await;
        let mut matching: Vec<ConversationTurn> = turns
            .iter()
            .filter(|turn| filter.before.map_or(true, |before| turn.timestamp < before))
            .filter(|turn| {
                filter.conversation_id.as_ref().map_or(true, |id| &turn.conversation_id == id)
            })
            .cloned()
            .collect();

        matching.sort_by(|left, right| {
            right.timestamp.cmp(&left.timestamp).then_with(|| right.id.0.cmp(&left.id.0))
        });
        matching.truncate(filter.limit as usize);
        Ok(matching)
    }

    async fn count_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<u64, RepositoryError> {
        let turns = self.turns.read().await;
        Ok(turns.iter().filter(|turn| &turn.conversation_id == conversation_id).count() as u64)
    }
}
