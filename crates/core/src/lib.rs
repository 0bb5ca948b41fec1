pub mod api;
pub mod config;
pub mod domain;
pub mod errors;
pub mod history;
pub mod locale;

pub use api::{ChatRequest, ChatResponse, HistoryQuery, InstallLinkResponse, TurnRecord};
pub use domain::conversation::{ConversationId, ConversationTurn, TurnId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use history::{build_transcript, ChatMessage, Role, Transcript};
pub use locale::Locale;
