//! Configuration file support for skillassess.
//!
//! Loads `skillassess.toml` from the working directory, falling back to the
//! user's global config at `<config dir>/skillassess/config.toml`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use skillassess_agent::{ProviderType, RetryPolicy};

/// The project config file name
pub const CONFIG_FILE_NAME: &str = "skillassess.toml";

/// Directory under the platform config dir holding the global config
pub const GLOBAL_CONFIG_DIR: &str = "skillassess";

/// The global config file name
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Concurrent calls allowed when `[throttle]` does not say otherwise
pub const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Configuration loaded from `skillassess.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Model provider for both roles
    pub provider: Option<String>,
    /// Global default model (applies to both generator and critic)
    pub model: Option<String>,
    /// Directory exported grids are written to
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// Generator-specific configuration
    #[serde(default)]
    pub generator: RoleConfig,
    /// Critic-specific configuration
    #[serde(default)]
    pub critic: RoleConfig,
}

/// `[retry]`: bounds for every model call
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub max_transport_retries: Option<u32>,
    pub max_repair_retries: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub base_delay: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub max_delay: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// `[pipeline]`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Regenerations allowed after the first rejection
    pub regeneration_budget: Option<usize>,
}

/// `[throttle]`: limits shared by every run in the process
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ThrottleConfig {
    pub max_concurrent: Option<usize>,
    #[serde(default, with = "humantime_serde")]
    pub min_interval: Option<Duration>,
}

/// Configuration for a specific role (generator or critic)
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// Model to use for this role
    pub model: Option<String>,
    /// Sampling temperature for this role
    pub temperature: Option<f32>,
}

impl ProjectConfig {
    /// Load the project config, or the global one when the project has none.
    ///
    /// A missing file is not an error; a file that fails to parse is.
    pub fn load(working_dir: &Path) -> Result<Self> {
        if let Some(config) = Self::load_from(&working_dir.join(CONFIG_FILE_NAME))? {
            return Ok(config);
        }
        if let Some(path) = global_config_path() {
            if let Some(config) = Self::load_from(&path)? {
                return Ok(config);
            }
        }
        Ok(Self::default())
    }

    /// Load a single file.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(Some(config))
    }

    /// Configured provider, if any
    pub fn provider(&self) -> Result<Option<ProviderType>> {
        self.provider
            .as_deref()
            .map(|p| p.parse::<ProviderType>().map_err(anyhow::Error::msg))
            .transpose()
    }

    /// Get the effective model for the generator role.
    /// Priority: [generator].model > global model > None
    pub fn generator_model(&self) -> Option<&str> {
        self.generator.model.as_deref().or(self.model.as_deref())
    }

    /// Get the effective model for the critic role.
    /// Priority: [critic].model > global model > None
    pub fn critic_model(&self) -> Option<&str> {
        self.critic.model.as_deref().or(self.model.as_deref())
    }

    /// Retry policy with unset fields left at their defaults
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_transport_retries: self
                .retry
                .max_transport_retries
                .unwrap_or(defaults.max_transport_retries),
            max_repair_retries: self
                .retry
                .max_repair_retries
                .unwrap_or(defaults.max_repair_retries),
            base_delay: self.retry.base_delay.unwrap_or(defaults.base_delay),
            max_delay: self.retry.max_delay.unwrap_or(defaults.max_delay),
            timeout: self.retry.timeout.unwrap_or(defaults.timeout),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.throttle.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT)
    }

    pub fn min_interval(&self) -> Duration {
        self.throttle.min_interval.unwrap_or(Duration::ZERO)
    }
}

/// Path of the global config file, if the platform has a config dir
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parses_full_config() {
        let config: ProjectConfig = toml::from_str(
            r#"
            provider = "deepseek"
            model = "deepseek-chat"
            output_dir = "grids"

            [retry]
            max_transport_retries = 5
            base_delay = "250ms"
            timeout = "90s"

            [pipeline]
            regeneration_budget = 2

            [throttle]
            max_concurrent = 4
            min_interval = "1s"

            [critic]
            model = "deepseek-reasoner"
            temperature = 0.2
            "#,
        )
        .unwrap();

        assert_eq!(config.provider().unwrap(), Some(ProviderType::DeepSeek));
        assert_eq!(config.output_dir, Some(PathBuf::from("grids")));
        assert_eq!(config.pipeline.regeneration_budget, Some(2));
        assert_eq!(config.max_concurrent(), 4);
        assert_eq!(config.min_interval(), Duration::from_secs(1));

        let policy = config.retry_policy();
        assert_eq!(policy.max_transport_retries, 5);
        assert_eq!(policy.max_repair_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_role_model_overrides_global() {
        let config: ProjectConfig = toml::from_str(
            r#"
            model = "gemini-2.5-flash"

            [critic]
            model = "gemini-2.5-pro"
            "#,
        )
        .unwrap();

        assert_eq!(config.generator_model(), Some("gemini-2.5-flash"));
        assert_eq!(config.critic_model(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(toml::from_str::<ProjectConfig>("agent = \"claude\"").is_err());
        assert!(toml::from_str::<ProjectConfig>("[retry]\nattempts = 3").is_err());
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        let config: ProjectConfig = toml::from_str("provider = \"mystery\"").unwrap();
        assert!(config.provider().is_err());
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = TempDir::new().unwrap();
        let loaded = ProjectConfig::load_from(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_from_malformed_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "provider = ").unwrap();

        assert!(ProjectConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_project_file_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "provider = \"gemini\"\n[pipeline]\nregeneration_budget = 0\n",
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.provider().unwrap(), Some(ProviderType::Gemini));
        assert_eq!(config.pipeline.regeneration_budget, Some(0));
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = ProjectConfig::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.max_concurrent(), DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.generator_model(), None);
    }
}
