// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use attn::config::Config;

#[derive(Parser)]
#[command(name = "attn", version, about = "Session-state supervisor for concurrent coding-agent CLI sessions.")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the supervisor in the foreground.
    Daemon,
    /// Print the session registry as JSON.
    List,
    /// Print a one-line session summary for status bars.
    Status,
    /// Forward a hook payload from stdin (or the first argument) to the
    /// running supervisor.
    Hook {
        /// JSON payload. Read from stdin if omitted.
        payload: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::List) => {
            std::process::exit(attn::cli::list::run(&cli.config));
        }
        Some(Commands::Status) => {
            std::process::exit(attn::cli::status::run(&cli.config));
        }
        Some(Commands::Hook { payload }) => {
            std::process::exit(attn::cli::hook::run(&cli.config, payload.as_deref()).await);
        }
        Some(Commands::Daemon) | None => {
            if let Err(err) = cli.config.validate() {
                eprintln!("error: {err}");
                std::process::exit(2);
            }
            std::process::exit(attn::cli::daemon::run(cli.config).await);
        }
    }
}
