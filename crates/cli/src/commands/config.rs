use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use difychat_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct ConfigSource {
    file_doc: Option<Value>,
    file_path: Option<PathBuf>,
}

impl ConfigSource {
    fn detect() -> Self {
        let file_path = resolve_config_path(None);
        let file_doc = load_config_file_doc(file_path.as_deref());
        Self { file_doc, file_path }
    }

    fn line(&self, key_path: &str, value: &str, env_keys: &[&str]) -> String {
        render_line(key_path, value, self.field_source(key_path, env_keys))
    }

    fn field_source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    render(&config, &ConfigSource::detect())
}

fn render(config: &AppConfig, source: &ConfigSource) -> String {
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(source.line(
        "database.url",
        &config.database.url,
        &["DIFYCHAT_DATABASE_URL", "DATABASE_URL"],
    ));
    lines.push(source.line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        &["DIFYCHAT_DATABASE_MAX_CONNECTIONS"],
    ));
    lines.push(source.line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        &["DIFYCHAT_DATABASE_TIMEOUT_SECS"],
    ));

    lines.push(source.line(
        "upstream.api_key",
        &redact_secret(config.upstream.api_key.expose_secret()),
        &["DIFYCHAT_UPSTREAM_API_KEY", "DIFY_API_KEY"],
    ));
    lines.push(source.line(
        "upstream.base_url",
        &config.upstream.base_url,
        &["DIFYCHAT_UPSTREAM_BASE_URL", "DIFY_BASE_URL"],
    ));
    lines.push(source.line("upstream.user", &config.upstream.user, &["DIFYCHAT_UPSTREAM_USER"]));
    lines.push(source.line(
        "upstream.timeout_secs",
        &config.upstream.timeout_secs.to_string(),
        &["DIFYCHAT_UPSTREAM_TIMEOUT_SECS"],
    ));

    lines.push(source.line(
        "slack.client_id",
        config.slack.client_id.as_deref().unwrap_or("<unset>"),
        &["DIFYCHAT_SLACK_CLIENT_ID", "SLACK_CLIENT_ID"],
    ));
    let signing_secret = match &config.slack.signing_secret {
        Some(secret) => redact_secret(secret.expose_secret()),
        None => "<unset>".to_string(),
    };
    lines.push(source.line(
        "slack.signing_secret",
        &signing_secret,
        &["DIFYCHAT_SLACK_SIGNING_SECRET", "SLACK_SIGNING_SECRET"],
    ));
    lines.push(source.line(
        "slack.scopes",
        &config.slack.scopes.join(","),
        &["DIFYCHAT_SLACK_SCOPES"],
    ));
    lines.push(source.line("slack.authorize_url", &config.slack.authorize_url, &[]));

    lines.push(source.line(
        "server.bind_address",
        &config.server.bind_address,
        &["DIFYCHAT_SERVER_BIND_ADDRESS"],
    ));
    lines.push(source.line(
        "server.port",
        &config.server.port.to_string(),
        &["DIFYCHAT_SERVER_PORT"],
    ));
    lines.push(source.line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        &["DIFYCHAT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    ));

    lines.push(source.line(
        "chat.history_default_limit",
        &config.chat.history_default_limit.to_string(),
        &["DIFYCHAT_CHAT_HISTORY_DEFAULT_LIMIT"],
    ));
    lines.push(source.line(
        "chat.history_max_limit",
        &config.chat.history_max_limit.to_string(),
        &["DIFYCHAT_CHAT_HISTORY_MAX_LIMIT"],
    ));
    lines.push(source.line(
        "chat.persistence_failure",
        &format!("{:?}", config.chat.persistence_failure),
        &["DIFYCHAT_CHAT_PERSISTENCE_FAILURE"],
    ));
    lines.push(source.line(
        "chat.locale",
        config.chat.locale.strings().lang,
        &["DIFYCHAT_CHAT_LOCALE"],
    ));

    lines.push(source.line(
        "logging.level",
        &config.logging.level,
        &["DIFYCHAT_LOGGING_LEVEL", "DIFYCHAT_LOG_LEVEL"],
    ));
    lines.push(source.line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["DIFYCHAT_LOGGING_FORMAT", "DIFYCHAT_LOG_FORMAT"],
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognisable prefix (`app-`, `xoxb-`) and hides the rest.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_keep_only_their_prefix() {
        assert_eq!(redact_secret("app-AbCdEf123"), "app-***");
        assert_eq!(redact_secret("0123456789abcdef"), "<redacted>");
        assert_eq!(redact_secret("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_toml() {
        let doc: toml::Value = "[upstream]\nbase_url = \"https://dify.internal/v1\"\n"
            .parse()
            .expect("toml");

        assert!(contains_path(&doc, "upstream.base_url"));
        assert!(!contains_path(&doc, "upstream.api_key"));
        assert!(!contains_path(&doc, "slack.client_id"));
    }
}
