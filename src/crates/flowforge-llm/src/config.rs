//! Planner-adapter configuration, loadable from the environment the way
//! every ambient config in this workspace is (§10.3).

use flowforge_tooling::config::{build_env_key, get_env, get_env_or, get_env_parse_or, ConfigBuilder};
use flowforge_tooling::{Result, ToolingError};

/// Configuration for a [`crate::traits::PlanningModel`] implementation and
/// the retry loop in [`crate::planner`].
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Base URL of the model provider's API.
    pub base_url: String,
    /// Model identifier to request.
    pub model: String,
    /// API key, if the provider requires one. Never logged.
    pub api_key: Option<String>,
    /// Milliseconds before a single generation request is aborted.
    pub request_timeout_ms: u64,
    /// Maximum plan-generation attempts before giving up (§4.10).
    pub max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "default".into(),
            api_key: None,
            request_timeout_ms: 30_000,
            max_attempts: 3,
        }
    }
}

impl ConfigBuilder for LlmConfig {
    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ToolingError::General("base_url must not be empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ToolingError::General("model must not be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(ToolingError::General("max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    fn from_env(prefix: &str) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            base_url: get_env_or(&build_env_key(prefix, "base_url"), defaults.base_url)?,
            model: get_env_or(&build_env_key(prefix, "model"), defaults.model)?,
            api_key: get_env(&build_env_key(prefix, "api_key"))?,
            request_timeout_ms: get_env_parse_or(
                &build_env_key(prefix, "request_timeout_ms"),
                defaults.request_timeout_ms,
            )?,
            max_attempts: get_env_parse_or(&build_env_key(prefix, "max_attempts"), defaults.max_attempts)?,
        })
    }

    fn merge(&mut self, other: Self) -> &mut Self {
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(LlmConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_model_is_rejected() {
        let mut config = LlmConfig::default();
        config.model = "".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_attempts_is_rejected() {
        let mut config = LlmConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_env_falls_back_to_defaults_when_unset() {
        let config = LlmConfig::from_env("FLOWFORGE_LLM_TEST_UNSET_PREFIX_").unwrap();
        assert_eq!(config.model, LlmConfig::default().model);
        assert_eq!(config.max_attempts, LlmConfig::default().max_attempts);
    }

    #[test]
    fn from_env_reads_overrides() {
        std::env::set_var("FLOWFORGE_LLM_TEST_MODEL", "gpt-test");
        std::env::set_var("FLOWFORGE_LLM_TEST_MAX_ATTEMPTS", "5");
        let config = LlmConfig::from_env("FLOWFORGE_LLM_TEST_").unwrap();
        assert_eq!(config.model, "gpt-test");
        assert_eq!(config.max_attempts, 5);
        std::env::remove_var("FLOWFORGE_LLM_TEST_MODEL");
        std::env::remove_var("FLOWFORGE_LLM_TEST_MAX_ATTEMPTS");
    }
}
