//! Client side of the external conversational-AI service.
//!
//! The rest of the workspace talks to the upstream through [`UpstreamClient`]
//! only; [`dify::DifyClient`] is the production implementation. Conversation
//! ids are passed through untouched.

pub mod dify;

use async_trait::async_trait;
use thiserror::Error;

use difychat_core::domain::conversation::ConversationId;

pub use dify::DifyClient;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub message: String,
    pub conversation_id: Option<ConversationId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamReply {
    pub answer: String,
    /// `None` when the upstream did not issue an id for this exchange.
    pub conversation_id: Option<ConversationId>,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
    #[error("upstream returned an empty answer")]
    EmptyAnswer,
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(error) if error.is_timeout())
    }
}

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamReply, UpstreamError>;
}
