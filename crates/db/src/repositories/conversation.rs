use chrono::{DateTime, Duration, Timelike, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};

use difychat_core::domain::conversation::{
    format_timestamp, parse_timestamp, ConversationId, ConversationTurn, TurnId,
};

use super::{ConversationRepository, HistoryFilter, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_message: String =
        row.try_get("user_message").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let assistant_message: String =
        row.try_get("assistant_message").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let timestamp_str: String =
        row.try_get("timestamp").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let timestamp =
        parse_timestamp(&timestamp_str).map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ConversationTurn {
        id: TurnId(id),
        user_message,
        assistant_message,
        timestamp,
        conversation_id: ConversationId(conversation_id),
    })
}

/// Stored timestamps carry microseconds, so a finer `before` bound is rounded up
/// to the next microsecond to keep `stored < before` exact.
fn storage_upper_bound(before: &DateTime<Utc>) -> DateTime<Utc> {
    match before.nanosecond() % 1_000 {
        0 => *before,
        remainder => *before + Duration::nanoseconds(i64::from(1_000 - remainder)),
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn append(&self, turn: &ConversationTurn) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversations
                (id, user_message, assistant_message, timestamp, conversation_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&turn.id.0)
        .bind(&turn.user_message)
        .bind(&turn.assistant_message)
        .bind(format_timestamp(&turn.timestamp))
        .bind(&turn.conversation_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT id, user_message, assistant_message, timestamp, conversation_id
             FROM conversations WHERE 1 = 1",
        );

        if let Some(before) = &filter.before {
            builder
                .push(" AND timestamp < ")
                .push_bind(format_timestamp(&storage_upper_bound(before)));
        }
        if let Some(conversation_id) = &filter.conversation_id {
            builder.push(" AND conversation_id = ").push_bind(conversation_id.0.clone());
        }
        builder
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.limit));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_turn).collect::<Result<Vec<_>, _>>()
    }

    async fn count_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE conversation_id = ?")
                .bind(&conversation_id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
