use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::GenerationParams;

/// Placeholder shipped in sample `.env` files; treated as "no key".
const PLACEHOLDER_KEY: &str = "your_google_gemini_api_key_here";

/// Root configuration structure, deserialized from `.sensitivity-checkr/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub generation: GenerationParams,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Which hosted model to call and how.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable holding the API credential.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_model_name() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Backoff schedule for transient model failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    16_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_max_examples")]
    pub max_examples_per_level: usize,
    /// Estimated prompt tokens above which a warning is logged.
    #[serde(default = "default_token_warning_threshold")]
    pub token_warning_threshold: usize,
}

fn default_max_examples() -> usize {
    3
}

fn default_token_warning_threshold() -> usize {
    4000
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_examples_per_level: default_max_examples(),
            token_warning_threshold: default_token_warning_threshold(),
        }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.sensitivity-checkr/config.toml`
/// 3. `~/.config/sensitivity-checkr/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".sensitivity-checkr").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("sensitivity-checkr")
            .join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    debug!("no config file found, using built-in defaults");
    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// The model API credential. Never printed: `Debug` is redacted.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Read the credential from the environment (after loading a `.env` file, if any).
pub fn load_api_key(var: &str) -> Result<ApiKey> {
    if let Some(err) = dotenv_problem(dotenvy::dotenv()) {
        warn!(error = %err, "ignoring unreadable .env file");
    }
    validate_api_key(var, std::env::var(var).ok())
}

/// A `.env` failure worth reporting. A missing file is the normal case.
fn dotenv_problem<T>(result: dotenvy::Result<T>) -> Option<dotenvy::Error> {
    match result {
        Ok(_) => None,
        Err(err) if err.not_found() => None,
        Err(err) => Some(err),
    }
}

fn validate_api_key(var: &str, value: Option<String>) -> Result<ApiKey> {
    let key = match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() && v != PLACEHOLDER_KEY => v,
        _ => bail!("{} is not set (export it or add it to a .env file)", var),
    };
    if !key.starts_with("AIza") {
        warn!(var, "API key does not look like a Gemini key (expected prefix AIza)");
    }
    Ok(ApiKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.model.name, "gemini-1.5-flash");
        assert_eq!(cfg.model.api_key_env, "GEMINI_API_KEY");
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.generation.temperature, 0.1);
        assert_eq!(cfg.prompt.max_examples_per_level, 3);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "[retry]").unwrap();
        writeln!(f, "max_attempts = 5").unwrap();
        writeln!(f, "[generation]").unwrap();
        writeln!(f, "temperature = 0.0").unwrap();

        let dir = TempDir::new().unwrap();
        let cfg = load_config(dir.path(), Some(f.path())).unwrap();
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.initial_delay_ms, 1000);
        assert_eq!(cfg.generation.temperature, 0.0);
        assert_eq!(cfg.generation.top_k, 40);
        assert_eq!(cfg.model.timeout_secs, 30);
    }

    #[test]
    fn test_project_config_is_found() {
        let dir = TempDir::new().unwrap();
        let cfg_dir = dir.path().join(".sensitivity-checkr");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[model]\nname = \"gemini-1.5-pro\"\n",
        )
        .unwrap();

        let cfg = load_config(dir.path(), None).unwrap();
        assert_eq!(cfg.model.name, "gemini-1.5-pro");
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "[retry").unwrap();
        let dir = TempDir::new().unwrap();
        assert!(load_config(dir.path(), Some(f.path())).is_err());
    }

    #[test]
    fn test_api_key_validation() {
        assert!(validate_api_key("K", None).is_err());
        assert!(validate_api_key("K", Some("  ".into())).is_err());
        assert!(validate_api_key("K", Some(PLACEHOLDER_KEY.into())).is_err());
        let key = validate_api_key("K", Some("AIzaSyExample".into())).unwrap();
        assert_eq!(key.expose(), "AIzaSyExample");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
    }

    #[test]
    fn test_dotenv_missing_file_is_quiet_but_bad_file_is_reported() {
        let dir = TempDir::new().unwrap();
        assert!(dotenv_problem(dotenvy::from_path(dir.path().join(".env"))).is_none());

        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "SENSITIVITY_CHECKR_TEST_KEY=\"unterminated").unwrap();
        assert!(dotenv_problem(dotenvy::from_path(f.path())).is_some());
    }
}
