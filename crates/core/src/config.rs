use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::heuristics::ScaleCheckConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub prompts: PromptConfig,
    pub schemas: SchemaConfig,
    pub session: SessionConfig,
    pub scale_check: ScaleCheckConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PromptConfig {
    pub dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct SchemaConfig {
    /// Directory of contract files. `None` uses the contracts compiled
    /// into the schemas crate.
    pub dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Retention cap on conversation turns; oldest turns drop first once
    /// exceeded.
    pub max_turns: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub model_provider: Option<ModelProvider>,
    pub model_name: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub prompts_dir: Option<PathBuf>,
    pub schemas_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                provider: ModelProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                temperature: 0.1,
                max_tokens: 2000,
                timeout_secs: 30,
            },
            prompts: PromptConfig { dir: PathBuf::from("prompts") },
            schemas: SchemaConfig { dir: None },
            session: SessionConfig { max_turns: 256 },
            scale_check: ScaleCheckConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ModelProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported model provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("optiq.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(model) = patch.model {
            if let Some(provider) = model.provider {
                self.model.provider = provider;
            }
            if let Some(api_key_value) = model.api_key {
                self.model.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = model.base_url {
                self.model.base_url = Some(base_url);
            }
            if let Some(name) = model.model {
                self.model.model = name;
            }
            if let Some(temperature) = model.temperature {
                self.model.temperature = temperature;
            }
            if let Some(max_tokens) = model.max_tokens {
                self.model.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = model.timeout_secs {
                self.model.timeout_secs = timeout_secs;
            }
        }

        if let Some(prompts) = patch.prompts {
            if let Some(dir) = prompts.dir {
                self.prompts.dir = dir;
            }
        }

        if let Some(schemas) = patch.schemas {
            if let Some(dir) = schemas.dir {
                self.schemas.dir = Some(dir);
            }
        }

        if let Some(session) = patch.session {
            if let Some(max_turns) = session.max_turns {
                self.session.max_turns = max_turns;
            }
        }

        if let Some(scale_check) = patch.scale_check {
            if let Some(ratio_threshold) = scale_check.ratio_threshold {
                self.scale_check.ratio_threshold = ratio_threshold;
            }
            if let Some(confidence_penalty) = scale_check.confidence_penalty {
                self.scale_check.confidence_penalty = confidence_penalty;
            }
            if let Some(financial_domains) = scale_check.financial_domains {
                self.scale_check.financial_domains = financial_domains;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("OPTIQ_MODEL_PROVIDER") {
            self.model.provider = value.parse()?;
        }
        if let Some(value) = read_env("OPTIQ_MODEL_API_KEY") {
            self.model.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("OPTIQ_MODEL_BASE_URL") {
            self.model.base_url = Some(value);
        }
        if let Some(value) = read_env("OPTIQ_MODEL_NAME") {
            self.model.model = value;
        }
        if let Some(value) = read_env("OPTIQ_MODEL_TEMPERATURE") {
            self.model.temperature = parse_f32("OPTIQ_MODEL_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("OPTIQ_MODEL_MAX_TOKENS") {
            self.model.max_tokens = parse_u32("OPTIQ_MODEL_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("OPTIQ_MODEL_TIMEOUT_SECS") {
            self.model.timeout_secs = parse_u64("OPTIQ_MODEL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("OPTIQ_PROMPTS_DIR") {
            self.prompts.dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("OPTIQ_SCHEMAS_DIR") {
            self.schemas.dir = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("OPTIQ_SESSION_MAX_TURNS") {
            self.session.max_turns = parse_usize("OPTIQ_SESSION_MAX_TURNS", &value)?;
        }

        let log_level = read_env("OPTIQ_LOGGING_LEVEL").or_else(|| read_env("OPTIQ_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("OPTIQ_LOGGING_FORMAT").or_else(|| read_env("OPTIQ_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(provider) = overrides.model_provider {
            self.model.provider = provider;
        }
        if let Some(model_name) = overrides.model_name {
            self.model.model = model_name;
        }
        if let Some(api_key) = overrides.api_key {
            self.model.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.base_url {
            self.model.base_url = Some(base_url);
        }
        if let Some(prompts_dir) = overrides.prompts_dir {
            self.prompts.dir = prompts_dir;
        }
        if let Some(schemas_dir) = overrides.schemas_dir {
            self.schemas.dir = Some(schemas_dir);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_model(&self.model)?;
        validate_session(&self.session)?;
        validate_scale_check(&self.scale_check)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("optiq.toml"), PathBuf::from("config/optiq.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_model(model: &ModelConfig) -> Result<(), ConfigError> {
    if model.timeout_secs == 0 || model.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "model.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&model.temperature) {
        return Err(ConfigError::Validation(
            "model.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if model.max_tokens == 0 || model.max_tokens > 32_768 {
        return Err(ConfigError::Validation(
            "model.max_tokens must be in range 1..=32768".to_string(),
        ));
    }

    match model.provider {
        ModelProvider::OpenAi | ModelProvider::Anthropic => {
            let missing = model
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "model.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        ModelProvider::Ollama => {
            let missing =
                model.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "model.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.max_turns == 0 {
        return Err(ConfigError::Validation(
            "session.max_turns must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_scale_check(scale_check: &ScaleCheckConfig) -> Result<(), ConfigError> {
    if scale_check.ratio_threshold <= 1.0 {
        return Err(ConfigError::Validation(
            "scale_check.ratio_threshold must be greater than 1.0".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&scale_check.confidence_penalty) {
        return Err(ConfigError::Validation(
            "scale_check.confidence_penalty must be in range 0.0..=1.0".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    model: Option<ModelPatch>,
    prompts: Option<PromptsPatch>,
    schemas: Option<SchemasPatch>,
    session: Option<SessionPatch>,
    scale_check: Option<ScaleCheckPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelPatch {
    provider: Option<ModelProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptsPatch {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SchemasPatch {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    max_turns: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ScaleCheckPatch {
    ratio_threshold: Option<f64>,
    confidence_penalty: Option<f64>,
    financial_domains: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
