use sofra_db::{connect_with_settings, migrations, DemoCatalog};

use crate::commands::{prepare, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
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

        let summary = DemoCatalog::load(&pool)
            .await
            .map_err(|error| StepFailure::new("seed_execution", error.to_string(), 5))?;

        let verification = DemoCatalog::verify(&pool)
            .await
            .map_err(|error| StepFailure::new("seed_verification", error.to_string(), 6))?;

        let result = if verification.all_present {
            Ok(summary)
        } else {
            Err(StepFailure::new(
                "seed_verification",
                verification_message(&verification.checks),
                6,
            ))
        };

        pool.close().await;
        result
    });

    match outcome {
        Ok(summary) => CommandResult::success(
            "seed",
            format!(
                "demo catalog loaded: {} categories, {} restaurants, {} items, {} variants",
                summary.restaurant_categories, summary.restaurants, summary.items, summary.variants
            ),
        ),
        Err(failure) => failure.into_result("seed"),
    }
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let failed = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed.is_empty() {
        "some seeded rows failed verification".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}
