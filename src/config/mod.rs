#[cfg(feature = "cli")]
pub mod cli;

use crate::core::{PlanPolicy, DEFAULT_DEMO_USER_ID};
use crate::domain::model::Limit;
use crate::utils::error::{QuotaError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_one_of, validate_path, validate_range,
    validate_required_field, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_STORAGE_TIMEOUT_MS: u64 = 5_000;
const MAX_STORAGE_TIMEOUT_MS: u64 = 60_000;
const BACKENDS: [&str; 2] = ["memory", "json"];
const LOG_FORMATS: [&str; 2] = ["compact", "json"];

/// `gastro-quota.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default)]
    pub quota: QuotaSection,
    #[serde(default)]
    pub store: StoreConfig,
    /// `[limits.<plan>] <tool> = <n> | "unlimited"`, applied over the
    /// standard table.
    #[serde(default)]
    pub limits: HashMap<String, HashMap<String, Limit>>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSection {
    #[serde(default = "default_demo_user_id")]
    pub demo_user_id: String,
    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,
}

impl Default for QuotaSection {
    fn default() -> Self {
        Self {
            demo_user_id: default_demo_user_id(),
            storage_timeout_ms: default_storage_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    pub path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Json(PathBuf),
}

impl StoreConfig {
    pub fn backend(&self) -> Result<StoreBackend> {
        match self.backend.as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "json" => {
                let path = validate_required_field("store.path", &self.path)?;
                Ok(StoreBackend::Json(PathBuf::from(path)))
            }
            other => Err(QuotaError::InvalidValue {
                field: "store.backend".to_string(),
                value: other.to_string(),
                reason: format!("Supported backends: {}", BACKENDS.join(", ")),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

fn default_demo_user_id() -> String {
    DEFAULT_DEMO_USER_ID.to_string()
}

fn default_storage_timeout_ms() -> u64 {
    DEFAULT_STORAGE_TIMEOUT_MS
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl QuotaConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| QuotaError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the environment value. Unset variables are
    /// left in place so validation can point at them.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| QuotaError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn build_policy(&self) -> Result<PlanPolicy> {
        PlanPolicy::with_overrides(&self.limits)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.quota.storage_timeout_ms)
    }
}

impl Validate for QuotaConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("quota.demo_user_id", &self.quota.demo_user_id)?;
        validate_range(
            "quota.storage_timeout_ms",
            self.quota.storage_timeout_ms,
            1,
            MAX_STORAGE_TIMEOUT_MS,
        )?;

        validate_one_of("store.backend", &self.store.backend, &BACKENDS)?;
        if let StoreBackend::Json(path) = self.store.backend()? {
            validate_path("store.path", &path.to_string_lossy())?;
        }

        validate_one_of("logging.format", &self.logging.format, &LOG_FORMATS)?;

        // Unknown plan or tool names fail here rather than on first use.
        self.build_policy()?;
        Ok(())
    }
}
