//! Configuration builder trait and helpers
//!
//! Provides a common trait for configuration structures to implement,
//! enabling consistent patterns for validation, environment variable loading,
//! and configuration merging across the workspace.

use crate::Result;

/// Trait for configuration structures that support building, validation, and merging
///
/// Implementing this trait provides a consistent API for:
/// - Default configuration creation
/// - Validation of configuration values
/// - Loading from environment variables
/// - Merging multiple configuration sources
///
/// # Example
///
/// ```rust,ignore
/// use flowforge_tooling::config::ConfigBuilder;
///
/// #[derive(Clone, Default)]
/// struct MyConfig {
///     pub port: u16,
///     pub host: String,
/// }
///
/// impl ConfigBuilder for MyConfig {
///     fn validate(&self) -> flowforge_tooling::Result<()> {
///         if self.port == 0 {
///             return Err(flowforge_tooling::ToolingError::General(
///                 "Port must be non-zero".to_string()
///             ));
///         }
///         Ok(())
///     }
///
///     fn from_env(prefix: &str) -> flowforge_tooling::Result<Self> {
///         Ok(Self::default())
///     }
///
///     fn merge(&mut self, other: Self) -> &mut Self {
///         self
///     }
/// }
/// ```
pub trait ConfigBuilder: Default + Clone {
    /// Validate the configuration.
    ///
    /// Should check for required fields being set, values within valid
    /// ranges, and dependencies between fields.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables should follow the pattern `{PREFIX}{FIELD_NAME}`
    /// where `FIELD_NAME` is the uppercased field name.
    fn from_env(prefix: &str) -> Result<Self>;

    /// Merge another configuration into this one, returning self for chaining.
    ///
    /// Strategy: `Option` fields from `other` overwrite if `Some`, `Vec`
    /// fields are appended, scalar fields overwrite.
    fn merge(&mut self, other: Self) -> &mut Self;

    /// Create, validate, and return the default configuration.
    fn build() -> Result<Self> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load from environment, merge with defaults, then validate.
    fn from_env_with_defaults(prefix: &str) -> Result<Self> {
        let mut config = Self::from_env(prefix)?;
        let defaults = Self::default();
        config.merge(defaults);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolingError;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct TestConfig {
        value: Option<i32>,
        items: Vec<String>,
    }

    impl ConfigBuilder for TestConfig {
        fn validate(&self) -> Result<()> {
            if let Some(v) = self.value {
                if v < 0 {
                    return Err(ToolingError::General("Value must be non-negative".into()));
                }
            }
            Ok(())
        }

        fn from_env(_prefix: &str) -> Result<Self> {
            Ok(Self {
                value: Some(42),
                items: vec!["from_env".to_string()],
            })
        }

        fn merge(&mut self, other: Self) -> &mut Self {
            if other.value.is_some() {
                self.value = other.value;
            }
            self.items.extend(other.items);
            self
        }
    }

    #[test]
    fn test_validate_success() {
        let config = TestConfig {
            value: Some(10),
            items: vec![],
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_failure() {
        let config = TestConfig {
            value: Some(-5),
            items: vec![],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge() {
        let mut config1 = TestConfig {
            value: Some(1),
            items: vec!["a".to_string()],
        };

        let config2 = TestConfig {
            value: Some(2),
            items: vec!["b".to_string()],
        };

        config1.merge(config2);

        assert_eq!(config1.value, Some(2));
        assert_eq!(config1.items, vec!["a", "b"]);
    }

    #[test]
    fn test_from_env_with_defaults() {
        let config = TestConfig::from_env_with_defaults("TEST_").unwrap();
        assert_eq!(config.value, Some(42));
        assert!(config.items.contains(&"from_env".to_string()));
    }
}
