use std::io::{self, BufRead, Write};
use std::sync::Arc;

use bistro_agent::{build_llm_client, ChatRuntime, DialogueManager, DialogueSettings};
use bistro_core::config::AppConfig;
use bistro_db::{CatalogSeed, SqlBookingEngine, SqlCatalog};
use uuid::Uuid;

use crate::commands::{build_runtime, load_config, open_database, CommandResult, StepError};

const QUIT_WORDS: [&str; 3] = ["quit", "exit", "/quit"];

pub fn run(session: Option<String>, seed: bool) -> CommandResult {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    run_with_io(session, seed, stdin.lock(), &mut stdout)
}

/// Runs one chat session over line-oriented I/O. Each input line is one
/// turn; the session ends at end of input or on a quit word.
pub fn run_with_io(
    session: Option<String>,
    seed: bool,
    input: impl BufRead,
    output: &mut impl Write,
) -> CommandResult {
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());

    let result = runtime.block_on(async {
        let chat = build_chat_runtime(&config, seed).await?;
        tracing::info!(session_id = %session_id, "chat session opened");

        let mut turns = 0usize;
        for line in input.lines() {
            let line = line.map_err(|error| ("chat_io", error.to_string(), 7u8))?;
            let text = line.trim();
            if QUIT_WORDS.contains(&text.to_ascii_lowercase().as_str()) {
                break;
            }
            if text.is_empty() {
                continue;
            }

            let reply = chat.process_turn(&session_id, text).await;
            turns += 1;
            writeln!(output, "{reply}")
                .and_then(|()| output.flush())
                .map_err(|error| ("chat_io", error.to_string(), 7u8))?;
        }

        chat.end_session(&session_id).await;
        Ok::<usize, StepError>(turns)
    });

    match result {
        Ok(turns) => CommandResult::success(
            "chat",
            format!("session {session_id} ended after {turns} turns"),
        ),
        Err(step) => CommandResult::from_step("chat", step),
    }
}

async fn build_chat_runtime(config: &AppConfig, seed: bool) -> Result<ChatRuntime, StepError> {
    let pool = open_database(config).await?;
    if seed {
        let loaded = CatalogSeed::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        tracing::debug!(
            menu_items = loaded.menu_items,
            offers = loaded.offers,
            tables = loaded.tables,
            "catalog seeded for chat"
        );
    }

    let llm = build_llm_client(config).map_err(|error| ("llm_init", error.to_string(), 3u8))?;
    let dialogue = DialogueManager::new(
        Arc::new(SqlBookingEngine::new(pool.clone())),
        Arc::new(SqlCatalog::new(pool)),
        llm,
        DialogueSettings::from(&config.dialogue),
    )
    .await
    .map_err(|error| ("catalog_load", error.to_string(), 4u8))?;

    Ok(ChatRuntime::new(dialogue))
}
