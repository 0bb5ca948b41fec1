use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::bootstrap::Application;
use crate::chat::{self, ChatState};
use crate::health;
use crate::pages::{self, PagesState};
use crate::slack::{self, SlackState};

/// Full HTTP surface: JSON API, Slack routes, health probes, and pages.
pub fn build_router(app: &Application) -> Router {
    let chat_state = ChatState {
        conversations: app.conversations.clone(),
        upstream: app.upstream.clone(),
        settings: app.config.chat.clone(),
    };

    Router::new()
        .merge(chat::router(chat_state))
        .merge(slack::router(SlackState::from_config(&app.config.slack)))
        .merge(health::router(app.db_pool.clone()))
        .merge(pages::router(PagesState::new(app.templates.clone(), app.config.chat.locale)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
