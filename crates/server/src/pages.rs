//! HTML pages.
//!
//! - `GET /` : chat page
//! - `GET /slack` : "Add to Slack" landing page

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use difychat_core::Locale;
use tera::{Context, Tera};
use tracing::error;

pub const CHAT_TEMPLATE: &str = "chat/index.html";
pub const INSTALL_TEMPLATE: &str = "slack/install.html";

#[derive(Clone)]
pub struct PagesState {
    templates: Arc<Tera>,
    locale: Locale,
}

impl PagesState {
    pub fn new(templates: Arc<Tera>, locale: Locale) -> Self {
        Self { templates, locale }
    }
}

/// Templates compiled into the binary.
pub fn init_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        (CHAT_TEMPLATE, include_str!("../../../templates/chat/index.html")),
        (INSTALL_TEMPLATE, include_str!("../../../templates/slack/install.html")),
    ])?;
    Ok(tera)
}

pub fn router(state: PagesState) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route("/slack", get(install_page))
        .with_state(state)
}

pub async fn chat_page(
    State(state): State<PagesState>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    render(&state, CHAT_TEMPLATE)
}

pub async fn install_page(
    State(state): State<PagesState>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    render(&state, INSTALL_TEMPLATE)
}

fn render(state: &PagesState, template: &str) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let mut context = Context::new();
    context.insert("strings", state.locale.strings());

    state.templates.render(template, &context).map(Html).map_err(|render_error| {
        error!(
            event_name = "pages.render.failed",
            template,
            error = %render_error,
            "failed to render page"
        );
        (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Template Error</h1>".to_string()))
    })
}
