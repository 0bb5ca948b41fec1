use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::locale::Locale;

pub const DEFAULT_SLACK_SCOPES: &[&str] =
    &["chat:write", "channels:read", "commands", "incoming-webhook", "im:history", "im:write"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub slack: SlackConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub user: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub client_id: Option<String>,
    pub signing_secret: Option<SecretString>,
    pub scopes: Vec<String>,
    pub authorize_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub history_default_limit: u32,
    pub history_max_limit: u32,
    pub persistence_failure: PersistenceFailurePolicy,
    pub locale: Locale,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// What the chat endpoint does when the upstream replied but the turn could not be stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceFailurePolicy {
    ReturnReply,
    FailRequest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub upstream_api_key: Option<String>,
    pub upstream_base_url: Option<String>,
    pub slack_client_id: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub server_port: Option<u16>,
    pub persistence_failure: Option<PersistenceFailurePolicy>,
    pub locale: Option<Locale>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://difychat.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            upstream: UpstreamConfig {
                api_key: String::new().into(),
                base_url: "https://api.dify.ai/v1".to_string(),
                user: "default_user".to_string(),
                timeout_secs: 30,
            },
            slack: SlackConfig {
                client_id: None,
                signing_secret: None,
                scopes: DEFAULT_SLACK_SCOPES.iter().map(ToString::to_string).collect(),
                authorize_url: "https://slack.com/oauth/v2/authorize".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            chat: ChatConfig {
                history_default_limit: 50,
                history_max_limit: 500,
                persistence_failure: PersistenceFailurePolicy::ReturnReply,
                locale: Locale::Ja,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for PersistenceFailurePolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "return_reply" => Ok(Self::ReturnReply),
            "fail_request" => Ok(Self::FailRequest),
            other => Err(ConfigError::Validation(format!(
                "unsupported persistence failure policy `{other}` (expected return_reply|fail_request)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Base URL a local client uses to reach this server.
    pub fn local_base_url(&self) -> String {
        let host = match self.bind_address.as_str() {
            "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
            other => other,
        };
        format!("http://{host}:{}", self.port)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("difychat.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(upstream) = patch.upstream {
            if let Some(api_key_value) = upstream.api_key {
                self.upstream.api_key = secret_value(api_key_value);
            }
            if let Some(base_url) = upstream.base_url {
                self.upstream.base_url = base_url;
            }
            if let Some(user) = upstream.user {
                self.upstream.user = user;
            }
            if let Some(timeout_secs) = upstream.timeout_secs {
                self.upstream.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(client_id) = slack.client_id {
                self.slack.client_id = Some(client_id);
            }
            if let Some(signing_secret_value) = slack.signing_secret {
                self.slack.signing_secret = Some(secret_value(signing_secret_value));
            }
            if let Some(scopes) = slack.scopes {
                self.slack.scopes = scopes;
            }
            if let Some(authorize_url) = slack.authorize_url {
                self.slack.authorize_url = authorize_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(limit) = chat.history_default_limit {
                self.chat.history_default_limit = limit;
            }
            if let Some(limit) = chat.history_max_limit {
                self.chat.history_max_limit = limit;
            }
            if let Some(policy) = chat.persistence_failure {
                self.chat.persistence_failure = policy;
            }
            if let Some(locale) = chat.locale {
                self.chat.locale = locale;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_with_alias("DIFYCHAT_DATABASE_URL", "DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DIFYCHAT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("DIFYCHAT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("DIFYCHAT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("DIFYCHAT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env_with_alias("DIFYCHAT_UPSTREAM_API_KEY", "DIFY_API_KEY") {
            self.upstream.api_key = secret_value(value);
        }
        if let Some(value) = read_env_with_alias("DIFYCHAT_UPSTREAM_BASE_URL", "DIFY_BASE_URL") {
            self.upstream.base_url = value;
        }
        if let Some(value) = read_env("DIFYCHAT_UPSTREAM_USER") {
            self.upstream.user = value;
        }
        if let Some(value) = read_env("DIFYCHAT_UPSTREAM_TIMEOUT_SECS") {
            self.upstream.timeout_secs = parse_u64("DIFYCHAT_UPSTREAM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env_with_alias("DIFYCHAT_SLACK_CLIENT_ID", "SLACK_CLIENT_ID") {
            self.slack.client_id = Some(value);
        }
        if let Some(value) =
            read_env_with_alias("DIFYCHAT_SLACK_SIGNING_SECRET", "SLACK_SIGNING_SECRET")
        {
            self.slack.signing_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("DIFYCHAT_SLACK_SCOPES") {
            self.slack.scopes = split_list(&value);
        }

        if let Some(value) = read_env("DIFYCHAT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DIFYCHAT_SERVER_PORT") {
            self.server.port = parse_u16("DIFYCHAT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DIFYCHAT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DIFYCHAT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("DIFYCHAT_CHAT_HISTORY_DEFAULT_LIMIT") {
            self.chat.history_default_limit =
                parse_u32("DIFYCHAT_CHAT_HISTORY_DEFAULT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("DIFYCHAT_CHAT_HISTORY_MAX_LIMIT") {
            self.chat.history_max_limit = parse_u32("DIFYCHAT_CHAT_HISTORY_MAX_LIMIT", &value)?;
        }
        if let Some(value) = read_env("DIFYCHAT_CHAT_PERSISTENCE_FAILURE") {
            self.chat.persistence_failure = value.parse()?;
        }
        if let Some(value) = read_env("DIFYCHAT_CHAT_LOCALE") {
            self.chat.locale = value.parse()?;
        }

        let log_level =
            read_env("DIFYCHAT_LOGGING_LEVEL").or_else(|| read_env("DIFYCHAT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DIFYCHAT_LOGGING_FORMAT").or_else(|| read_env("DIFYCHAT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.upstream_api_key {
            self.upstream.api_key = secret_value(api_key);
        }
        if let Some(base_url) = overrides.upstream_base_url {
            self.upstream.base_url = base_url;
        }
        if let Some(client_id) = overrides.slack_client_id {
            self.slack.client_id = Some(client_id);
        }
        if let Some(signing_secret) = overrides.slack_signing_secret {
            self.slack.signing_secret = Some(secret_value(signing_secret));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(policy) = overrides.persistence_failure {
            self.chat.persistence_failure = policy;
        }
        if let Some(locale) = overrides.locale {
            self.chat.locale = locale;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_upstream(&self.upstream)?;
        validate_slack(&self.slack)?;
        validate_server(&self.server)?;
        validate_chat(&self.chat)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("difychat.toml"), PathBuf::from("config/difychat.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_upstream(upstream: &UpstreamConfig) -> Result<(), ConfigError> {
    if upstream.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "upstream.api_key is required. Get it from your Dify app > API Access (env: DIFY_API_KEY)"
                .to_string(),
        ));
    }

    let base_url = upstream.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "upstream.base_url must start with http:// or https://".to_string(),
        ));
    }

    if upstream.user.trim().is_empty() {
        return Err(ConfigError::Validation("upstream.user must not be empty".to_string()));
    }

    if upstream.timeout_secs == 0 || upstream.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "upstream.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if let Some(client_id) = &slack.client_id {
        if client_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "slack.client_id must not be blank when set".to_string(),
            ));
        }
    }

    if slack.scopes.is_empty() || slack.scopes.iter().any(|scope| scope.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "slack.scopes must list at least one non-empty scope".to_string(),
        ));
    }

    let authorize_url = slack.authorize_url.trim();
    if !authorize_url.starts_with("http://") && !authorize_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.authorize_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation(
            "server.bind_address must not be empty".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.history_max_limit == 0 {
        return Err(ConfigError::Validation(
            "chat.history_max_limit must be greater than zero".to_string(),
        ));
    }

    if chat.history_default_limit == 0 || chat.history_default_limit > chat.history_max_limit {
        return Err(ConfigError::Validation(
            "chat.history_default_limit must be in range 1..=chat.history_max_limit".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_with_alias(key: &str, alias: &str) -> Option<String> {
    read_env(key).or_else(|| read_env(alias))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    upstream: Option<UpstreamPatch>,
    slack: Option<SlackPatch>,
    server: Option<ServerPatch>,
    chat: Option<ChatPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    user: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    client_id: Option<String>,
    signing_secret: Option<String>,
    scopes: Option<Vec<String>>,
    authorize_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    history_default_limit: Option<u32>,
    history_max_limit: Option<u32>,
    persistence_failure: Option<PersistenceFailurePolicy>,
    locale: Option<Locale>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
