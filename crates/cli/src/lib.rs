pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "bistro",
    about = "Bistro restaurant assistant CLI",
    long_about = "Prepare the restaurant database, inspect configuration, check readiness, and chat with the assistant.",
    after_help = "Examples:\n  bistro migrate\n  bistro seed\n  bistro doctor --json\n  bistro chat --seed"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the reference catalog (menu, offers, venue, tables) idempotently")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, language model readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Chat with the assistant over stdin/stdout, one session per invocation")]
    Chat {
        #[arg(long, help = "Session identifier (defaults to a random one)")]
        session: Option<String>,
        #[arg(long, help = "Load the reference catalog before chatting")]
        seed: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Chat { session, seed } => commands::chat::run(session, seed),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
