pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use serde_json::json;
use sofra_core::config::{AppConfig, LoadOptions};

/// What a subcommand hands back to `main`: the process exit code and the
/// line to print. State-changing commands report one-line JSON so deploy
/// scripts can parse the result.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let body = json!({
            "command": command,
            "status": "ok",
            "message": message.into(),
        });
        Self { exit_code: 0, output: body.to_string() }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let body = json!({
            "command": command,
            "status": "error",
            "error_class": error_class,
            "message": message.into(),
        });
        Self { exit_code, output: body.to_string() }
    }
}

/// One failed step inside a command pipeline. Exit codes: 2 config,
/// 3 runtime, 4 connectivity, 5 migration or seed write, 6 verification.
pub(crate) struct StepFailure {
    class: &'static str,
    message: String,
    exit_code: u8,
}

impl StepFailure {
    pub(crate) fn new(class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { class, message: message.into(), exit_code }
    }

    pub(crate) fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, self.class, self.message, self.exit_code)
    }
}

/// Validated config plus a current-thread runtime, or the failure to print.
/// Every command that touches the database starts here.
pub(crate) fn prepare(
    command: &str,
) -> Result<(AppConfig, tokio::runtime::Runtime), CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("config did not validate: {error}"),
            2,
        )
    })?;
    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("tokio runtime failed to start: {error}"),
                3,
            )
        })?;
    Ok((config, runtime))
}
