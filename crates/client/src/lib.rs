//! Client side of the chat service: an HTTP binding for the backend API and
//! the session state machines that drive the chat and Slack landing views.

pub mod http;
pub mod landing;
pub mod session;

use async_trait::async_trait;
use difychat_core::{ChatResponse, ConversationId, HistoryQuery, InstallLinkResponse, TurnRecord};
use thiserror::Error;

pub use http::HttpChatApi;
pub use landing::{LandingState, SlackLanding};
pub use session::{ChatSession, PendingSubmit, SessionPhase, SubmitOutcome};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Backend operations the views depend on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<&ConversationId>,
    ) -> Result<ChatResponse, ClientError>;

    /// Turns as the backend returns them (newest first).
    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<TurnRecord>, ClientError>;

    async fn fetch_install_link(&self) -> Result<InstallLinkResponse, ClientError>;
}

#[async_trait]
impl<T: ChatApi + ?Sized> ChatApi for std::sync::Arc<T> {
    async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<&ConversationId>,
    ) -> Result<ChatResponse, ClientError> {
        (**self).send_message(message, conversation_id).await
    }

    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<TurnRecord>, ClientError> {
        (**self).fetch_history(query).await
    }

    async fn fetch_install_link(&self) -> Result<InstallLinkResponse, ClientError> {
        (**self).fetch_install_link().await
    }
}
