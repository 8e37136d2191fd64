use crate::commands::{build_runtime, load_config, open_database, CommandResult, StepError};
use bistro_db::migrations::MIGRATOR;

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        pool.close().await;
        Ok::<(), StepError>(())
    });

    match result {
        Ok(()) => CommandResult::success(
            "migrate",
            format!("schema is up to date ({} migrations known)", MIGRATOR.iter().count()),
        ),
        Err(step) => CommandResult::from_step("migrate", step),
    }
}
