use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use optiq_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: Option<&str>| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "model.provider",
        &format!("{:?}", config.model.provider),
        source("model.provider", Some("OPTIQ_MODEL_PROVIDER")),
    ));
    lines.push(render_line(
        "model.model",
        &config.model.model,
        source("model.model", Some("OPTIQ_MODEL_NAME")),
    ));
    lines.push(render_line(
        "model.base_url",
        config.model.base_url.as_deref().unwrap_or("<unset>"),
        source("model.base_url", Some("OPTIQ_MODEL_BASE_URL")),
    ));

    let api_key = if config.model.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "model.api_key",
        api_key,
        source("model.api_key", Some("OPTIQ_MODEL_API_KEY")),
    ));
    lines.push(render_line(
        "model.temperature",
        &config.model.temperature.to_string(),
        source("model.temperature", Some("OPTIQ_MODEL_TEMPERATURE")),
    ));
    lines.push(render_line(
        "model.max_tokens",
        &config.model.max_tokens.to_string(),
        source("model.max_tokens", Some("OPTIQ_MODEL_MAX_TOKENS")),
    ));
    lines.push(render_line(
        "model.timeout_secs",
        &config.model.timeout_secs.to_string(),
        source("model.timeout_secs", Some("OPTIQ_MODEL_TIMEOUT_SECS")),
    ));

    lines.push(render_line(
        "prompts.dir",
        &config.prompts.dir.display().to_string(),
        source("prompts.dir", Some("OPTIQ_PROMPTS_DIR")),
    ));
    lines.push(render_line(
        "schemas.dir",
        &config
            .schemas
            .dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "<builtin>".to_string()),
        source("schemas.dir", Some("OPTIQ_SCHEMAS_DIR")),
    ));
    lines.push(render_line(
        "session.max_turns",
        &config.session.max_turns.to_string(),
        source("session.max_turns", Some("OPTIQ_SESSION_MAX_TURNS")),
    ));

    lines.push(render_line(
        "scale_check.ratio_threshold",
        &config.scale_check.ratio_threshold.to_string(),
        source("scale_check.ratio_threshold", None),
    ));
    lines.push(render_line(
        "scale_check.confidence_penalty",
        &config.scale_check.confidence_penalty.to_string(),
        source("scale_check.confidence_penalty", None),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", Some("OPTIQ_LOGGING_LEVEL")),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", Some("OPTIQ_LOGGING_FORMAT")),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("optiq.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/optiq.toml");
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
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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
