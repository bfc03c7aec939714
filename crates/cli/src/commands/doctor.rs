use secrecy::ExposeSecret;
use serde::Serialize;
use sofra_core::config::{AppConfig, LoadOptions};
use sofra_db::connect_with_settings;

use crate::commands::CommandResult;

const STATUS_PASS: &str = "pass";
const STATUS_FAIL: &str = "fail";
const STATUS_SKIPPED: &str = "skipped";

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    status: &'static str,
    details: String,
}

impl Check {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: STATUS_PASS, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: STATUS_FAIL, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self { name, status: STATUS_SKIPPED, details: "configuration did not load".to_string() }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    overall_status: &'static str,
    summary: String,
    checks: Vec<Check>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = readiness_report();
    let exit_code = u8::from(report.overall_status != STATUS_PASS);

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| {
            r#"{"overall_status":"fail","summary":"doctor output serialization failed","checks":[]}"#
                .to_string()
        })
    } else {
        render_text(&report)
    };

    CommandResult { exit_code, output }
}

fn readiness_report() -> Report {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => vec![
            Check::pass("config_validation", "configuration loaded and validated"),
            credentials_check(&config),
            database_check(&config),
        ],
        Err(error) => vec![
            Check::fail("config_validation", error.to_string()),
            Check::skipped("whatsapp_credentials"),
            Check::skipped("database_connectivity"),
        ],
    };

    let not_passing = checks.iter().filter(|check| check.status != STATUS_PASS).count();
    let (overall_status, summary) = if not_passing == 0 {
        (STATUS_PASS, "all readiness checks passed".to_string())
    } else {
        (STATUS_FAIL, format!("{not_passing} of {} readiness checks did not pass", checks.len()))
    };

    Report { overall_status, summary, checks }
}

/// Presence and shape are enforced by config validation; this check restates
/// what a webhook registration will need so operators see it in one place.
fn credentials_check(config: &AppConfig) -> Check {
    let token_len = config.whatsapp.access_token.expose_secret().trim().len();
    Check::pass(
        "whatsapp_credentials",
        format!(
            "phone_number_id `{}`, access token of {token_len} chars, verify token and app secret set",
            config.whatsapp.phone_number_id
        ),
    )
}

fn database_check(config: &AppConfig) -> Check {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return Check::fail(
                "database_connectivity",
                format!("tokio runtime failed to start: {error}"),
            );
        }
    };

    let connect = runtime.block_on(async {
        match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => {
                pool.close().await;
                Ok(())
            }
            Err(error) => Err(format!("failed to connect to database: {error}")),
        }
    });

    match connect {
        Ok(()) => {
            Check::pass("database_connectivity", format!("connected using `{}`", config.database.url))
        }
        Err(details) => Check::fail("database_connectivity", details),
    }
}

fn render_text(report: &Report) -> String {
    let mut out = report.summary.clone();
    for check in &report.checks {
        out.push('\n');
        out.push_str(&format!("{:>8}  {}  {}", check.status, check.name, check.details));
    }
    out
}
