//! Terminal chat over the HTTP API.
//!
//! Each input line is submitted as a message; `/quit` or end of input stops
//! the session. While a send is in flight the loading label is shown and no
//! further input is read.

use difychat_client::{ChatApi, ChatSession, HttpChatApi, SubmitOutcome};
use difychat_core::{ChatMessage, Locale, Role};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::commands::{client_config, current_thread_runtime, resolve_server_url, CommandResult};

const QUIT: &str = "/quit";

pub fn run(server_url: Option<String>, locale: Option<String>) -> CommandResult {
    let config = client_config();
    let locale = match locale.as_deref().map(str::parse::<Locale>) {
        Some(Ok(locale)) => locale,
        Some(Err(error)) => {
            return CommandResult::failure("chat", "invalid_argument", error.to_string(), 2);
        }
        None => config.as_ref().map(|config| config.chat.locale).unwrap_or_default(),
    };
    let server_url = resolve_server_url(server_url, config.as_ref());

    let api = match HttpChatApi::new(&server_url) {
        Ok(api) => api,
        Err(error) => return CommandResult::failure("chat", "runtime_init", error.to_string(), 3),
    };
    let runtime = match current_thread_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let mut session = ChatSession::new(api, locale);
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        drive(&mut session, stdin, &mut stdout).await
    });

    match result {
        Ok(summary) => CommandResult::success(
            "chat",
            format!("session ended after {} sent message(s) against {server_url}", summary.sent),
        ),
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), 3),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub sent: usize,
    pub fallbacks: usize,
}

pub async fn drive<A, R, W>(
    session: &mut ChatSession<A>,
    input: R,
    output: &mut W,
) -> std::io::Result<SessionSummary>
where
    A: ChatApi,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let strings = session.locale().strings();
    let mut summary = SessionSummary::default();

    match session.load_history().await {
        Ok(()) => {
            for message in session.messages() {
                write_message(output, message).await?;
            }
        }
        Err(error) => {
            output.write_all(format!("(history unavailable: {error})\n").as_bytes()).await?;
        }
    }

    let mut lines = input.lines();
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim() == QUIT {
            break;
        }

        session.set_draft(line);
        let Some(pending) = session.begin_submit() else {
            continue;
        };
        output.write_all(format!("{}\n", strings.loading_label).as_bytes()).await?;
        output.flush().await?;

        let result =
            session.api().send_message(&pending.message, pending.conversation_id.as_ref()).await;
        let outcome = session.finish_submit(result);

        summary.sent += 1;
        if outcome == SubmitOutcome::Fallback {
            summary.fallbacks += 1;
        }
        if let Some(reply) = session.messages().last() {
            write_message(output, reply).await?;
        }
    }

    output.flush().await?;
    Ok(summary)
}

async fn write_message<W: AsyncWrite + Unpin>(
    output: &mut W,
    message: &ChatMessage,
) -> std::io::Result<()> {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    output.write_all(format!("{speaker}: {}\n", message.content).as_bytes()).await
}
