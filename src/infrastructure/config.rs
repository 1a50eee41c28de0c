use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

const CLIENT_JSON: &str = "client.json";
const API_URL_KEYS: [&str; 2] = ["POMODORO_FOREST_API_URL", "FOREST_API_URL"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    Local,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    pub schema: u8,
    pub api_base_url: String,
    pub default_duration_minutes: u32,
    pub phrase_interval_seconds: u64,
    pub phrase_retry_delay_ms: u64,
    pub duplicate_retry_delay_ms: u64,
    pub max_duplicate_attempts: u32,
    pub phrase_history_capacity: usize,
    pub crossfade_ms: u64,
    pub completion_max_retries: u32,
    pub completion_initial_backoff_ms: u64,
    pub stats_max_retries: u32,
    pub credential_backend: CredentialBackend,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            api_base_url: "http://localhost:8000/api".to_string(),
            default_duration_minutes: 25,
            phrase_interval_seconds: 5 * 60,
            phrase_retry_delay_ms: 2_000,
            duplicate_retry_delay_ms: 800,
            max_duplicate_attempts: 3,
            phrase_history_capacity: 5,
            crossfade_ms: 500,
            completion_max_retries: 3,
            completion_initial_backoff_ms: 1_000,
            stats_max_retries: 2,
            credential_backend: CredentialBackend::Local,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), InfraError> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(InfraError::InvalidConfig(
                "apiBaseUrl must not be empty".to_string(),
            ));
        }
        let parsed = Url::parse(base)
            .map_err(|error| InfraError::InvalidConfig(format!("invalid apiBaseUrl: {error}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(InfraError::InvalidConfig(format!(
                "apiBaseUrl must use http or https, got {}",
                parsed.scheme()
            )));
        }
        if self.default_duration_minutes == 0 {
            return Err(InfraError::InvalidConfig(
                "defaultDurationMinutes must be > 0".to_string(),
            ));
        }
        if self.phrase_interval_seconds == 0 {
            return Err(InfraError::InvalidConfig(
                "phraseIntervalSeconds must be > 0".to_string(),
            ));
        }
        if self.phrase_history_capacity == 0 {
            return Err(InfraError::InvalidConfig(
                "phraseHistoryCapacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn phrase_interval(&self) -> Duration {
        Duration::from_secs(self.phrase_interval_seconds)
    }

    pub fn phrase_retry_delay(&self) -> Duration {
        Duration::from_millis(self.phrase_retry_delay_ms)
    }

    pub fn duplicate_retry_delay(&self) -> Duration {
        Duration::from_millis(self.duplicate_retry_delay_ms)
    }

    pub fn crossfade(&self) -> Duration {
        Duration::from_millis(self.crossfade_ms)
    }

    pub fn completion_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.completion_initial_backoff_ms)
    }
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(CLIENT_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&ClientConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_client_config(config_dir: &Path) -> Result<ClientConfig, InfraError> {
    load_client_config_with_lookup(config_dir, |key| std::env::var(key).ok())
}

pub fn load_client_config_with_lookup<F>(
    config_dir: &Path,
    lookup: F,
) -> Result<ClientConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = read_config(&config_dir.join(CLIENT_JSON))?;
    let mut config: ClientConfig = serde_json::from_value(raw)?;
    if let Some(api_base_url) = optional_lookup_value(&lookup, &API_URL_KEYS) {
        config.api_base_url = api_base_url;
    }
    config.validate()?;
    Ok(config)
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}
