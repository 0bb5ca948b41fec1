pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "difychat",
    about = "difychat operator CLI",
    long_about = "Operate the difychat service: migrations, config inspection, readiness checks, stored history, and terminal chat.",
    after_help = "Examples:\n  difychat doctor --json\n  difychat history --limit 20\n  difychat chat --locale en"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, upstream and Slack readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print stored chat history as an ordered transcript")]
    History {
        #[arg(long, help = "Number of most recent turns to include")]
        limit: Option<u32>,
        #[arg(long, help = "Only include turns from this conversation")]
        conversation_id: Option<String>,
    },
    #[command(about = "Chat with the running server from the terminal")]
    Chat {
        #[arg(long, help = "Base URL of the difychat server")]
        server_url: Option<String>,
        #[arg(long, help = "UI locale for fallback messages (ja|en)")]
        locale: Option<String>,
    },
    #[command(about = "Fetch the Slack install link from the running server")]
    SlackInstall {
        #[arg(long, help = "Base URL of the difychat server")]
        server_url: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::History { limit, conversation_id } => {
            commands::history::run(limit, conversation_id)
        }
        Command::Chat { server_url, locale } => commands::chat::run(server_url, locale),
        Command::SlackInstall { server_url } => commands::slack_install::run(server_url),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
