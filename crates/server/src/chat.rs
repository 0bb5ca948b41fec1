//! Chat JSON API.
//!
//! - `POST /api/chat` : forward a message upstream and record the turn
//! - `GET  /api/chat/history` : most recent turns, newest first

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use difychat_core::config::{ChatConfig, PersistenceFailurePolicy};
use difychat_core::domain::conversation::parse_timestamp;
use difychat_core::{
    ApplicationError, ChatRequest, ChatResponse, ConversationId, ConversationTurn, DomainError,
    TurnRecord,
};
use difychat_db::{ConversationRepository, HistoryFilter};
use difychat_upstream::{UpstreamClient, UpstreamRequest};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::{correlation_id, ApiError};

#[derive(Clone)]
pub struct ChatState {
    pub conversations: Arc<dyn ConversationRepository>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub settings: ChatConfig,
}

/// Raw history query; parsed by hand so bad values get the JSON error body.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<String>,
    pub before: Option<String>,
    pub conversation_id: Option<String>,
}

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/api/chat", post(send_message))
        .route("/api/chat/history", get(history))
        .with_state(state)
}

pub async fn send_message(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = correlation_id();
    let Json(request) = payload.map_err(|rejection| {
        ApiError::bad_request(
            format!("invalid request body: {}", rejection.body_text()),
            &correlation_id,
        )
    })?;

    if request.message.trim().is_empty() {
        return Err(ApiError::from_application(DomainError::EmptyMessage.into(), &correlation_id));
    }
    let requested_conversation = ConversationId::from_optional(request.conversation_id);

    info!(
        event_name = "chat.send.received",
        correlation_id = %correlation_id,
        conversation_id = requested_conversation.as_ref().map_or("new", ConversationId::as_str),
        "chat message received"
    );

    let reply = state
        .upstream
        .send(UpstreamRequest {
            message: request.message.clone(),
            conversation_id: requested_conversation,
        })
        .await
        .map_err(|upstream_error| {
            warn!(
                event_name = "chat.upstream.failed",
                correlation_id = %correlation_id,
                timeout = upstream_error.is_timeout(),
                error = %upstream_error,
                "upstream chat call failed"
            );
            ApiError::from_application(
                ApplicationError::Upstream(upstream_error.to_string()),
                &correlation_id,
            )
        })?;

    let conversation_id = reply.conversation_id.unwrap_or_else(ConversationId::mint);
    let turn = ConversationTurn::new(request.message, reply.answer, conversation_id)
        .map_err(|domain_error| ApiError::from_application(domain_error.into(), &correlation_id))?;

    if let Err(persist_error) = state.conversations.append(&turn).await {
        error!(
            event_name = "chat.persist.failed",
            correlation_id = %correlation_id,
            conversation_id = %turn.conversation_id,
            turn_id = %turn.id.0,
            error = %persist_error,
            "failed to record chat turn"
        );
        if state.settings.persistence_failure == PersistenceFailurePolicy::FailRequest {
            return Err(ApiError::from_application(
                ApplicationError::Persistence(persist_error.to_string()),
                &correlation_id,
            ));
        }
    } else {
        info!(
            event_name = "chat.send.completed",
            correlation_id = %correlation_id,
            conversation_id = %turn.conversation_id,
            turn_id = %turn.id.0,
            "chat turn recorded"
        );
    }

    Ok(Json(ChatResponse {
        conversation_id: turn.conversation_id.0,
        message: turn.assistant_message,
        timestamp: turn.timestamp,
    }))
}

pub async fn history(
    State(state): State<ChatState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<TurnRecord>>, ApiError> {
    let correlation_id = correlation_id();
    let filter = history_filter(&params, &state.settings)
        .map_err(|domain_error| ApiError::from_application(domain_error.into(), &correlation_id))?;

    let turns = state.conversations.recent(&filter).await.map_err(|read_error| {
        error!(
            event_name = "chat.history.failed",
            correlation_id = %correlation_id,
            error = %read_error,
            "failed to read chat history"
        );
        ApiError::from_application(
            ApplicationError::Persistence(read_error.to_string()),
            &correlation_id,
        )
    })?;

    Ok(Json(turns.into_iter().map(TurnRecord::from).collect()))
}

fn history_filter(
    params: &HistoryParams,
    settings: &ChatConfig,
) -> Result<HistoryFilter, DomainError> {
    let max = settings.history_max_limit;
    let limit = match params.limit.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        None => settings.history_default_limit,
        Some(raw) => {
            let requested: i64 =
                raw.parse().map_err(|_| DomainError::InvalidHistoryLimit { requested: 0, max })?;
            u32::try_from(requested)
                .ok()
                .filter(|value| (1..=max).contains(value))
                .ok_or(DomainError::InvalidHistoryLimit {
                    requested: u32::try_from(requested).unwrap_or(0),
                    max,
                })?
        }
    };

    let before = match params.before.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        // An unescaped `+` offset arrives as a space after form decoding.
        Some(raw) => Some(parse_timestamp(&raw.replace(' ', "+"))?),
        None => None,
    };

    Ok(HistoryFilter {
        limit,
        before,
        conversation_id: ConversationId::from_optional(params.conversation_id.clone()),
    })
}
