pub mod chat;
pub mod config;
pub mod doctor;
pub mod history;
pub mod migrate;
pub mod slack_install;

use difychat_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn current_thread_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Client commands talk to a running server and must not require the
/// server's secrets, so a config that fails validation falls back to defaults.
pub(crate) fn client_config() -> Option<AppConfig> {
    AppConfig::load(LoadOptions::default()).ok()
}

pub(crate) fn resolve_server_url(explicit: Option<String>, config: Option<&AppConfig>) -> String {
    explicit
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| match config {
            Some(config) => config.server.local_base_url(),
            None => AppConfig::default().server.local_base_url(),
        })
}

#[cfg(test)]
mod tests {
    use super::{resolve_server_url, CommandResult};

    #[test]
    fn failure_payload_is_structured_json() {
        let result = CommandResult::failure("history", "query", "no such table", 5);
        let payload: serde_json::Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 5);
        assert_eq!(payload["command"], "history");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "query");
    }

    #[test]
    fn explicit_server_url_wins() {
        assert_eq!(
            resolve_server_url(Some(" http://chat.internal:9000 ".to_string()), None),
            "http://chat.internal:9000"
        );
        assert_eq!(resolve_server_url(None, None), "http://127.0.0.1:8000");
        assert_eq!(resolve_server_url(Some("  ".to_string()), None), "http://127.0.0.1:8000");
    }
}
