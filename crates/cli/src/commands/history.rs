use difychat_core::config::{AppConfig, LoadOptions};
use difychat_core::domain::conversation::format_timestamp;
use difychat_core::{build_transcript, ConversationId, Role, Transcript};
use difychat_db::{
    connect_with_settings, ConversationRepository, HistoryFilter, SqlConversationRepository,
};

use crate::commands::{current_thread_runtime, CommandResult};

pub fn run(limit: Option<u32>, conversation_id: Option<String>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "history",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let limit = limit.unwrap_or(config.chat.history_default_limit);
    if limit == 0 || limit > config.chat.history_max_limit {
        return CommandResult::failure(
            "history",
            "invalid_argument",
            format!("--limit must be in 1..={}", config.chat.history_max_limit),
            2,
        );
    }

    let runtime = match current_thread_runtime("history") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let filter = HistoryFilter {
        limit,
        before: None,
        conversation_id: ConversationId::from_optional(conversation_id),
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let turns = SqlConversationRepository::new(pool.clone())
            .recent(&filter)
            .await
            .map_err(|error| ("query", error.to_string(), 5u8));
        pool.close().await;
        turns
    });

    match result {
        Ok(turns) => CommandResult { exit_code: 0, output: render(&build_transcript(turns)) },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("history", error_class, message, exit_code)
        }
    }
}

pub fn render(transcript: &Transcript) -> String {
    if transcript.messages.is_empty() {
        return "(no stored turns)".to_string();
    }

    let mut lines: Vec<String> = transcript
        .messages
        .iter()
        .map(|message| {
            let speaker = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let at = message.timestamp.as_ref().map(format_timestamp).unwrap_or_default();
            format!("[{at}] {speaker}: {}", message.content)
        })
        .collect();

    if let Some(conversation_id) = &transcript.conversation_id {
        lines.push(format!("active conversation: {conversation_id}"));
    }
    lines.join("\n")
}
