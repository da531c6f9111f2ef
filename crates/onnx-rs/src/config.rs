//! Runtime configuration: kernel cache sizing and execution platform selection.
//!
//! Values come from defaults, a JSON document, or `ONNXRS_*` environment variables.
//! [`RuntimeConfig::global`] resolves the environment once per process.

use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::env::{
    non_empty_var, parse_platform_list, DEFAULT_PLATFORMS_VAR, KERNEL_CACHE_SIZE_VAR, PLATFORM_VAR,
};

/// Default number of compiled variants kept per implementation function.
pub const DEFAULT_KERNEL_CACHE_CAPACITY: usize = 64;

static GLOBAL_CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub kernel_cache_capacity: usize,
    /// Platform the current process executes artifacts on.
    pub platform: String,
    /// Platforms recorded in artifacts exported without an explicit list.
    pub default_platforms: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            kernel_cache_capacity: DEFAULT_KERNEL_CACHE_CAPACITY,
            platform: "cpu".to_string(),
            default_platforms: vec!["cpu".to_string()],
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(src: &str) -> Result<Self> {
        let config: RuntimeConfig =
            serde_json::from_str(src).context("failed to parse runtime config json")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize runtime config")
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(non_empty_var)
    }

    /// Builds a config from an arbitrary variable source, falling back to defaults for
    /// anything unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RuntimeConfig::default();
        if let Some(value) = lookup(KERNEL_CACHE_SIZE_VAR) {
            config.kernel_cache_capacity = value
                .trim()
                .parse()
                .with_context(|| format!("{KERNEL_CACHE_SIZE_VAR} must be an integer, got '{value}'"))?;
        }
        if let Some(value) = lookup(PLATFORM_VAR) {
            config.platform = value.trim().to_ascii_lowercase();
        }
        if let Some(value) = lookup(DEFAULT_PLATFORMS_VAR) {
            config.default_platforms = parse_platform_list(&value);
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.kernel_cache_capacity == 0 {
            bail!("kernel cache capacity must be non-zero");
        }
        if self.platform.trim().is_empty() {
            bail!("execution platform must not be empty");
        }
        if self.default_platforms.is_empty() {
            bail!("default platform list must not be empty");
        }
        Ok(())
    }

    /// Process-wide configuration resolved from the environment on first use. An invalid
    /// environment logs a warning and falls back to defaults.
    pub fn global() -> &'static RuntimeConfig {
        GLOBAL_CONFIG.get_or_init(|| match RuntimeConfig::from_env() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring invalid ONNXRS_* environment");
                RuntimeConfig::default()
            }
        })
    }
}
