//! Engine-wide configuration (§6.6, §10.3), loadable from the environment
//! the way every ambient config in this workspace is.

use flowforge_tooling::config::{build_env_key, get_env_parse_or, ConfigBuilder};
use flowforge_tooling::{Result, ToolingError};

/// Defaults applied when a plan node's own `config` leaves a field unset.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Milliseconds before a node's tool invocation is aborted.
    pub default_timeout_ms: u64,
    /// Retry attempts for a node with no `config.retries` override.
    pub default_retries: u32,
    /// Concurrency used for a parallel node with no `config.concurrency`.
    pub max_concurrency: u32,
    /// Channel capacity for a run's event stream.
    pub event_buffer_size: usize,
    /// Maximum iterations a `while` loop may run before `LoopBound`.
    pub loop_iteration_cap: u64,
    /// Minutes a suspension record remains resumable before expiry.
    pub suspension_ttl_minutes: i64,
    /// Maximum plan-generation attempts before `PlanGenerationError` (§4.10).
    pub planner_retry_count: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            default_retries: 2,
            max_concurrency: 4,
            event_buffer_size: 256,
            loop_iteration_cap: 10_000,
            suspension_ttl_minutes: 60,
            planner_retry_count: 3,
        }
    }
}

impl ConfigBuilder for EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(ToolingError::General("max_concurrency must be at least 1".into()));
        }
        if self.event_buffer_size == 0 {
            return Err(ToolingError::General("event_buffer_size must be at least 1".into()));
        }
        if self.loop_iteration_cap == 0 {
            return Err(ToolingError::General("loop_iteration_cap must be at least 1".into()));
        }
        if self.planner_retry_count == 0 {
            return Err(ToolingError::General("planner_retry_count must be at least 1".into()));
        }
        Ok(())
    }

    fn from_env(prefix: &str) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            default_timeout_ms: get_env_parse_or(
                &build_env_key(prefix, "default_timeout_ms"),
                defaults.default_timeout_ms,
            )?,
            default_retries: get_env_parse_or(&build_env_key(prefix, "default_retries"), defaults.default_retries)?,
            max_concurrency: get_env_parse_or(&build_env_key(prefix, "max_concurrency"), defaults.max_concurrency)?,
            event_buffer_size: get_env_parse_or(
                &build_env_key(prefix, "event_buffer_size"),
                defaults.event_buffer_size,
            )?,
            loop_iteration_cap: get_env_parse_or(
                &build_env_key(prefix, "loop_iteration_cap"),
                defaults.loop_iteration_cap,
            )?,
            suspension_ttl_minutes: get_env_parse_or(
                &build_env_key(prefix, "suspension_ttl_minutes"),
                defaults.suspension_ttl_minutes,
            )?,
            planner_retry_count: get_env_parse_or(
                &build_env_key(prefix, "planner_retry_count"),
                defaults.planner_retry_count,
            )?,
        })
    }

    fn merge(&mut self, other: Self) -> &mut Self {
        *self = other;
        self
    }
}

impl From<&EngineConfig> for flowforge_core::SchedulerConfig {
    fn from(config: &EngineConfig) -> Self {
        flowforge_core::SchedulerConfig {
            default_retry: flowforge_core::retry::RetryPolicy {
                max_attempts: config.default_retries + 1,
                ..flowforge_core::retry::RetryPolicy::default()
            },
            default_timeout_ms: Some(config.default_timeout_ms),
            loop_iteration_cap: config.loop_iteration_cap,
            default_concurrency: config.max_concurrency,
            event_channel_capacity: config.event_buffer_size,
        }
    }
}
