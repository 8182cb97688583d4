use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::model::Model;
use crate::usage::{ModelRate, PricingTable};

pub const API_KEY_VAR: &str = "XAI_API_KEY";
pub const CONFIG_PATH_VAR: &str = "GROK_ENV_PATH";
pub const BASE_URL_VAR: &str = "XAI_BASE_URL";
pub const MAX_TOKENS_VAR: &str = "MAX_TOKENS";
pub const DEBUG_LOGGING_VAR: &str = "DEBUG_LOGGING";

pub const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Price override keys as (model, prompt key, completion key).
pub const PRICE_VARS: [(Model, &str, &str); 2] = [
    (
        Model::Grok3Beta,
        "GROK_3_BETA_INPUT_PRICE_PER_1K",
        "GROK_3_BETA_OUTPUT_PRICE_PER_1K",
    ),
    (
        Model::Grok3MiniBeta,
        "GROK_3_MINI_BETA_INPUT_PRICE_PER_1K",
        "GROK_3_MINI_BETA_OUTPUT_PRICE_PER_1K",
    ),
];

/// Fatal startup errors. None of the messages include the API key.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file {} not found. Create it with XAI_API_KEY=<key> and run: chmod 600 {}", .0.display(), .0.display())]
    NotFound(PathBuf),
    #[error("{} permissions are {mode:03o}, should be 600 (rw-------). Fix with: chmod 600 {}", .path.display(), .path.display())]
    InsecurePermissions { path: PathBuf, mode: u32 },
    #[error("XAI_API_KEY not found or empty in {}", .0.display())]
    MissingApiKey(PathBuf),
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("No pricing defined for model '{0}'")]
    UnknownModelRate(String),
    #[error("Malformed line in {}", .0.display())]
    Parse(PathBuf),
    #[error("File system error: {0}")]
    IO(#[from] std::io::Error),
}

/// The xAI API key. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Immutable process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub api_key: ApiKey,
    pub base_url: Url,
    pub max_tokens: u32,
    pub debug_logging: bool,
    pub pricing: PricingTable,
}

impl Config {
    /// Builds a configuration from file entries. `env` is consulted first for
    /// every optional key; the API key only ever comes from the file.
    fn from_entries(
        path: &Path,
        entries: &HashMap<String, String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str| -> Option<String> {
            env(key)
                .or_else(|| entries.get(key).cloned())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = entries
            .get(API_KEY_VAR)
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(ApiKey::new)
            .ok_or_else(|| ConfigError::MissingApiKey(path.to_path_buf()))?;

        let base_url = lookup(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
            key: BASE_URL_VAR.to_string(),
            reason: e.to_string(),
        })?;

        let max_tokens = match lookup(MAX_TOKENS_VAR) {
            Some(v) => parse_value::<u32>(MAX_TOKENS_VAR, &v)?,
            None => DEFAULT_MAX_TOKENS,
        };
        if max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: MAX_TOKENS_VAR.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let debug_logging = lookup(DEBUG_LOGGING_VAR)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let mut pricing = PricingTable::default();
        for (model, prompt_key, completion_key) in PRICE_VARS {
            let default = pricing.rate(model.as_str())?;
            let prompt_per_1k = match lookup(prompt_key) {
                Some(v) => parse_price(prompt_key, &v)?,
                None => default.prompt_per_1k,
            };
            let completion_per_1k = match lookup(completion_key) {
                Some(v) => parse_price(completion_key, &v)?,
                None => default.completion_per_1k,
            };
            pricing.set_rate(
                model.as_str(),
                ModelRate::new(prompt_per_1k, completion_per_1k),
            );
        }

        Ok(Config {
            path: path.to_path_buf(),
            api_key,
            base_url,
            max_tokens,
            debug_logging,
            pricing,
        })
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("'{value}': {e}"),
    })
}

fn parse_price(key: &str, value: &str) -> Result<f64, ConfigError> {
    let price = parse_value::<f64>(key, value)?;
    if !price.is_finite() || price < 0.0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{value}' is not a valid price"),
        });
    }
    Ok(price)
}

/// Default location of the configuration file, `~/.grok-prompt`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".grok-prompt"))
        .unwrap_or_else(|| PathBuf::from("~/.grok-prompt"))
}

/// Picks the configuration path: explicit argument, then `GROK_ENV_PATH`, then
/// the default.
pub fn resolve_config_path(config_path: Option<PathBuf>) -> PathBuf {
    config_path
        .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

/// Fails unless the file is readable and writable by its owner only.
#[cfg(unix)]
pub fn check_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode() & 0o777;
    if mode != 0o600 {
        return Err(ConfigError::InsecurePermissions {
            path: path.to_path_buf(),
            mode,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn check_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

/// Reads `KEY=value` entries without touching the process environment.
fn read_entries(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| map_dotenv_error(path, e))?;
    let mut entries = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| map_dotenv_error(path, e))?;
        entries.insert(key, value);
    }
    Ok(entries)
}

// dotenvy echoes the offending line, which may hold the key, so drop it.
fn map_dotenv_error(path: &Path, err: dotenvy::Error) -> ConfigError {
    match err {
        dotenvy::Error::Io(e) => ConfigError::IO(e),
        _ => ConfigError::Parse(path.to_path_buf()),
    }
}

#[instrument(skip(config_path))]
pub fn get_config(config_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    get_config_with_env(config_path, |key| std::env::var(key).ok())
}

/// Loads the configuration, resolving optional keys through `env` first.
pub fn get_config_with_env(
    config_path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let path = resolve_config_path(config_path);
    if !path.exists() {
        return Err(ConfigError::NotFound(path));
    }
    check_permissions(&path)?;

    let entries = read_entries(&path)?;
    debug!(path = %path.display(), keys = entries.len(), "Loaded configuration file");
    Config::from_entries(&path, &entries, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_temp_config;
    use crate::usage::UsageRecord;

    const SECRET: &str = "xai-super-secret-key";

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_get_config_reads_defaults() {
        let path = create_temp_config(&format!("{API_KEY_VAR}={SECRET}\n"), 0o600);
        let config = get_config_with_env(Some(path.clone()), no_env).unwrap();

        assert_eq!(config.api_key.expose(), SECRET);
        assert_eq!(config.path, path);
        assert_eq!(config.base_url.as_str(), "https://api.x.ai/v1");
        assert_eq!(config.max_tokens, 1500);
        assert!(!config.debug_logging);
        assert_eq!(config.pricing, PricingTable::default());
    }

    #[test]
    fn test_get_config_reads_optional_keys() {
        let content = format!(
            r#"# grok settings
{API_KEY_VAR}="{SECRET}"
MAX_TOKENS=42
DEBUG_LOGGING=TRUE
XAI_BASE_URL=http://localhost:9000/v1
GROK_3_BETA_INPUT_PRICE_PER_1K=1.5
GROK_3_MINI_BETA_OUTPUT_PRICE_PER_1K=0.25
"#
        );
        let path = create_temp_config(&content, 0o600);
        let config = get_config_with_env(Some(path), no_env).unwrap();

        assert_eq!(config.api_key.expose(), SECRET);
        assert_eq!(config.max_tokens, 42);
        assert!(config.debug_logging);
        assert_eq!(config.base_url.as_str(), "http://localhost:9000/v1");

        let beta = config.pricing.rate("grok-3-beta").unwrap();
        assert_eq!(beta, ModelRate::new(1.5, 0.015));
        let mini = config.pricing.rate("grok-3-mini-beta").unwrap();
        assert_eq!(mini, ModelRate::new(0.002, 0.25));
    }

    #[test]
    fn test_environment_overrides_optional_keys_only() {
        let content = format!("{API_KEY_VAR}={SECRET}\nMAX_TOKENS=10\n");
        let path = create_temp_config(&content, 0o600);
        let env = |key: &str| match key {
            "MAX_TOKENS" => Some("20".to_string()),
            "XAI_API_KEY" => Some("from-env".to_string()),
            _ => None,
        };
        let config = get_config_with_env(Some(path), env).unwrap();

        assert_eq!(config.max_tokens, 20);
        assert_eq!(config.api_key.expose(), SECRET);
    }

    #[cfg(unix)]
    #[test]
    fn test_insecure_permissions_are_fatal_and_hide_key() {
        let path = create_temp_config(&format!("{API_KEY_VAR}={SECRET}\n"), 0o644);
        let err = get_config_with_env(Some(path), no_env).unwrap_err();

        assert!(matches!(err, ConfigError::InsecurePermissions { mode: 0o644, .. }));
        let message = err.to_string();
        assert!(message.contains("permissions are 644, should be 600"));
        assert!(!message.contains(SECRET));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");
        let err = get_config_with_env(Some(path.clone()), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(p) if p == path));
    }

    #[test]
    fn test_missing_or_empty_key() {
        let path = create_temp_config("MAX_TOKENS=10\n", 0o600);
        let err = get_config_with_env(Some(path), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey(_)));

        let path = create_temp_config(&format!("{API_KEY_VAR}=\"\"\n"), 0o600);
        let err = get_config_with_env(Some(path), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey(_)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for (line, key) in [
            ("MAX_TOKENS=lots", "MAX_TOKENS"),
            ("MAX_TOKENS=0", "MAX_TOKENS"),
            ("GROK_3_BETA_OUTPUT_PRICE_PER_1K=-1", "GROK_3_BETA_OUTPUT_PRICE_PER_1K"),
            ("XAI_BASE_URL=not-a-url", "XAI_BASE_URL"),
        ] {
            let content = format!("{API_KEY_VAR}={SECRET}\n{line}\n");
            let path = create_temp_config(&content, 0o600);
            let err = get_config_with_env(Some(path), no_env).unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidValue { key: k, .. } if k == key),
                "{line}: {err}"
            );
            assert!(!err.to_string().contains(SECRET));
        }
    }

    #[test]
    fn test_malformed_file_does_not_echo_line() {
        let content = format!("{API_KEY_VAR}='{SECRET}\n");
        let path = create_temp_config(&content, 0o600);
        let err = get_config_with_env(Some(path), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(!err.to_string().contains(SECRET));
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new(SECRET);
        assert_eq!(format!("{key:?}"), "ApiKey(<redacted>)");

        let path = create_temp_config(&format!("{API_KEY_VAR}={SECRET}\n"), 0o600);
        let config = get_config_with_env(Some(path), no_env).unwrap();
        assert!(!format!("{config:?}").contains(SECRET));
    }

    #[test]
    fn test_resolve_config_path_prefers_explicit() {
        let explicit = PathBuf::from("/tmp/explicit-grok");
        assert_eq!(resolve_config_path(Some(explicit.clone())), explicit);
    }

    #[test]
    fn test_configured_pricing_drives_estimate() {
        let content = format!("{API_KEY_VAR}={SECRET}\nGROK_3_BETA_OUTPUT_PRICE_PER_1K=1\n");
        let path = create_temp_config(&content, 0o600);
        let config = get_config_with_env(Some(path), no_env).unwrap();
        let cost = config
            .pricing
            .estimate(&UsageRecord::new(0, 2000), "grok-3-beta")
            .unwrap();
        assert_eq!(cost.usd, 2.0);
    }
}
