use std::process::ExitCode;

fn main() -> ExitCode {
    difychat_cli::run()
}
