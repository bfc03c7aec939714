use sofra_db::{connect_with_settings, migrations};

use crate::commands::{prepare, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("migrate") {
        Ok(parts) => parts,
        Err(result) => return result,
    };

    let outcome = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| StepFailure::new("db_connectivity", error.to_string(), 4))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| StepFailure::new("migration", error.to_string(), 5))?;
        let version = migrations::schema_version(&pool)
            .await
            .map_err(|error| StepFailure::new("migration", error.to_string(), 5))?;

        pool.close().await;
        Ok::<_, StepFailure>(version)
    });

    match outcome {
        Ok(Some(version)) => CommandResult::success(
            "migrate",
            format!(
                "database schema is at version {version} ({} migrations embedded)",
                migrations::MIGRATOR.migrations.len()
            ),
        ),
        Ok(None) => CommandResult::success("migrate", "no migrations recorded"),
        Err(failure) => failure.into_result("migrate"),
    }
}
