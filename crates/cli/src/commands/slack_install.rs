use difychat_client::{HttpChatApi, LandingState, SlackLanding};

use crate::commands::{client_config, current_thread_runtime, resolve_server_url, CommandResult};

pub fn run(server_url: Option<String>) -> CommandResult {
    let config = client_config();
    let locale = config.as_ref().map(|config| config.chat.locale).unwrap_or_default();
    let server_url = resolve_server_url(server_url, config.as_ref());

    let api = match HttpChatApi::new(&server_url) {
        Ok(api) => api,
        Err(error) => {
            return CommandResult::failure("slack-install", "runtime_init", error.to_string(), 3)
        }
    };
    let runtime = match current_thread_runtime("slack-install") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let mut landing = SlackLanding::new(locale);
    runtime.block_on(landing.load(&api));

    match landing.state() {
        LandingState::Ready { install_url } => {
            CommandResult::success("slack-install", install_url.clone())
        }
        LandingState::Error { message } => CommandResult::failure(
            "slack-install",
            "remote_call",
            format!("{message} ({server_url}/api/slack/install)"),
            6,
        ),
        LandingState::Loading => CommandResult::failure(
            "slack-install",
            "remote_call",
            "install link was not loaded",
            6,
        ),
    }
}
