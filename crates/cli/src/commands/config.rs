use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use sofra_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "SOFRA_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "SOFRA_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "SOFRA_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "whatsapp.api_base_url",
        &config.whatsapp.api_base_url,
        source("whatsapp.api_base_url", "SOFRA_WHATSAPP_API_BASE_URL"),
    ));
    lines.push(render_line(
        "whatsapp.phone_number_id",
        &config.whatsapp.phone_number_id,
        source("whatsapp.phone_number_id", "SOFRA_WHATSAPP_PHONE_NUMBER_ID"),
    ));
    lines.push(render_line(
        "whatsapp.access_token",
        &redact_token(config.whatsapp.access_token.expose_secret()),
        source("whatsapp.access_token", "SOFRA_WHATSAPP_ACCESS_TOKEN"),
    ));
    lines.push(render_line(
        "whatsapp.verify_token",
        &redact_token(config.whatsapp.verify_token.expose_secret()),
        source("whatsapp.verify_token", "SOFRA_WHATSAPP_VERIFY_TOKEN"),
    ));
    lines.push(render_line(
        "whatsapp.app_secret",
        &redact_token(config.whatsapp.app_secret.expose_secret()),
        source("whatsapp.app_secret", "SOFRA_WHATSAPP_APP_SECRET"),
    ));
    lines.push(render_line(
        "whatsapp.operator_channel",
        config.whatsapp.operator_channel.as_deref().unwrap_or("<unset>"),
        source("whatsapp.operator_channel", "SOFRA_WHATSAPP_OPERATOR_CHANNEL"),
    ));

    lines.push(render_line(
        "llm.provider",
        &format!("{:?}", config.llm.provider),
        source("llm.provider", "SOFRA_LLM_PROVIDER"),
    ));
    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", "SOFRA_LLM_MODEL")));
    lines.push(render_line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        source("llm.base_url", "SOFRA_LLM_BASE_URL"),
    ));
    lines.push(render_line(
        "llm.api_key",
        if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" },
        source("llm.api_key", "SOFRA_LLM_API_KEY"),
    ));

    lines.push(render_line(
        "session.ttl_secs",
        &config.session.ttl_secs.to_string(),
        source("session.ttl_secs", "SOFRA_SESSION_TTL_SECS"),
    ));
    lines.push(render_line(
        "session.nlu_budget_calls",
        &config.session.nlu_budget_calls.to_string(),
        source("session.nlu_budget_calls", "SOFRA_SESSION_NLU_BUDGET_CALLS"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "SOFRA_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "SOFRA_SERVER_PORT"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "SOFRA_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "SOFRA_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("sofra.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/sofra.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
