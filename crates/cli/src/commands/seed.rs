use crate::commands::{build_runtime, load_config, open_database, CommandResult, StepError};
use bistro_db::{CatalogSeed, SeedResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let loaded = CatalogSeed::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = CatalogSeed::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        pool.close().await;

        let failed: Vec<&str> = verification
            .checks
            .iter()
            .filter_map(|(check, present)| (!present).then_some(check.as_str()))
            .collect();
        if verification.all_present {
            Ok(loaded)
        } else {
            Err::<SeedResult, StepError>(("seed_verification", verification_message(&failed), 6u8))
        }
    });

    match result {
        Ok(loaded) => CommandResult::success("seed", summary(&loaded)),
        Err(step) => CommandResult::from_step("seed", step),
    }
}

fn summary(loaded: &SeedResult) -> String {
    format!(
        "catalog ready: {} menu items, {} offers, {} tables",
        loaded.menu_items, loaded.offers, loaded.tables
    )
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "Some catalog rows failed to load".to_string()
    } else {
        format!("Catalog verification failed for checks: {}", failed.join(", "))
    }
}
