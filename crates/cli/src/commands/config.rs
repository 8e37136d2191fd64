use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use bistro_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILES};
use toml::Value;

/// One effective setting: dotted key, rendered value, and the env var that
/// overrides it.
struct ConfigRow {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for row in rows(&config) {
        let source = field_source(
            row.key,
            row.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", row.key, row.value));
    }
    lines.join("\n")
}

fn rows(config: &AppConfig) -> Vec<ConfigRow> {
    let row = |key, env_key, value: String| ConfigRow { key, env_key, value };
    vec![
        row("database.url", "BISTRO_DATABASE_URL", config.database.url.clone()),
        row(
            "database.max_connections",
            "BISTRO_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        row(
            "database.timeout_secs",
            "BISTRO_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        row("llm.provider", "BISTRO_LLM_PROVIDER", format!("{:?}", config.llm.provider)),
        row("llm.model", "BISTRO_LLM_MODEL", config.llm.model.clone()),
        row(
            "llm.base_url",
            "BISTRO_LLM_BASE_URL",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        row(
            "llm.api_key",
            "BISTRO_LLM_API_KEY",
            if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" }.to_string(),
        ),
        row("llm.timeout_secs", "BISTRO_LLM_TIMEOUT_SECS", config.llm.timeout_secs.to_string()),
        row("llm.max_retries", "BISTRO_LLM_MAX_RETRIES", config.llm.max_retries.to_string()),
        row(
            "dialogue.max_implicit_party_size",
            "BISTRO_DIALOGUE_MAX_IMPLICIT_PARTY_SIZE",
            config.dialogue.max_implicit_party_size.to_string(),
        ),
        row(
            "dialogue.history_window",
            "BISTRO_DIALOGUE_HISTORY_WINDOW",
            config.dialogue.history_window.to_string(),
        ),
        row("dialogue.guest_name", "BISTRO_DIALOGUE_GUEST_NAME", config.dialogue.guest_name.clone()),
        row("logging.level", "BISTRO_LOGGING_LEVEL", config.logging.level.clone()),
        row("logging.format", "BISTRO_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES.iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
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

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}
