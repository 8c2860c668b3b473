#![forbid(unsafe_code)]

//! Runtime configuration: how unhandled failures are treated and which
//! scheduler drives main-thread delivery.
//!
//! Values come from the environment ([`RuntimeConfig::from_env`]) or, with
//! the `config-file` feature, from TOML. Environment values are normalized
//! (trimmed, case-folded, `_` treated as `-`); an unrecognized value falls
//! back to the default and is logged.
//!
//! ```toml
//! exception-policy = "panic"
//! scheduler = "queue"
//! ```

use std::env;
use std::str::FromStr;

/// Environment variable selecting the [`ExceptionPolicy`].
pub const EXCEPTION_POLICY_ENV: &str = "RXM_EXCEPTION_POLICY";
/// Environment variable selecting the main-thread [`SchedulerKind`].
pub const SCHEDULER_ENV: &str = "RXM_SCHEDULER";

/// Errors from parsing configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A key held a value outside its accepted set.
    #[error("unknown value {value:?} for {key}")]
    UnknownValue {
        /// Offending key.
        key: &'static str,
        /// Raw value as supplied.
        value: String,
    },
    /// The configuration file could not be read.
    #[cfg(feature = "config-file")]
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid TOML for [`RuntimeConfig`].
    #[cfg(feature = "config-file")]
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// What the default exception handler does with a failure nobody observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "kebab-case"))]
pub enum ExceptionPolicy {
    /// Emit a `tracing` error event.
    #[default]
    Log,
    /// Panic with the failure's message.
    Panic,
    /// Drop the failure silently.
    Ignore,
}

impl FromStr for ExceptionPolicy {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match normalize(raw).as_str() {
            "log" => Ok(Self::Log),
            "panic" => Ok(Self::Panic),
            "ignore" => Ok(Self::Ignore),
            _ => Err(ConfigError::UnknownValue {
                key: EXCEPTION_POLICY_ENV,
                value: raw.to_owned(),
            }),
        }
    }
}

/// Scheduler used for main-thread delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "kebab-case"))]
pub enum SchedulerKind {
    /// Run inline.
    Immediate,
    /// Run inline, trampolining nested work.
    #[default]
    CurrentThread,
    /// Queue until the owner drains it.
    Queue,
}

impl FromStr for SchedulerKind {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match normalize(raw).as_str() {
            "immediate" => Ok(Self::Immediate),
            "current-thread" | "trampoline" => Ok(Self::CurrentThread),
            "queue" => Ok(Self::Queue),
            _ => Err(ConfigError::UnknownValue {
                key: SCHEDULER_ENV,
                value: raw.to_owned(),
            }),
        }
    }
}

/// Runtime-wide settings consumed by [`Registration::from_config`](crate::Registration::from_config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default, rename_all = "kebab-case"))]
pub struct RuntimeConfig {
    /// Treatment of unobserved failures.
    pub exception_policy: ExceptionPolicy,
    /// Main-thread scheduler.
    pub scheduler: SchedulerKind,
}

impl RuntimeConfig {
    /// Read settings from `RXM_EXCEPTION_POLICY` and `RXM_SCHEDULER`.
    #[must_use]
    pub fn from_env() -> Self {
        let policy = env::var(EXCEPTION_POLICY_ENV).ok();
        let scheduler = env::var(SCHEDULER_ENV).ok();
        Self::from_env_values(policy.as_deref(), scheduler.as_deref())
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML file.
    #[cfg(feature = "config-file")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    fn from_env_values(policy: Option<&str>, scheduler: Option<&str>) -> Self {
        Self {
            exception_policy: parse_or_default(policy),
            scheduler: parse_or_default(scheduler),
        }
    }
}

fn parse_or_default<T>(raw: Option<&str>) -> T
where
    T: FromStr<Err = ConfigError> + Default,
{
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return T::default();
    };
    raw.parse().unwrap_or_else(|error: ConfigError| {
        tracing::warn!(message = "config.value.ignored", error = %error);
        T::default()
    })
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_values_default_when_missing() {
        let config = RuntimeConfig::from_env_values(None, None);
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.exception_policy, ExceptionPolicy::Log);
        assert_eq!(config.scheduler, SchedulerKind::CurrentThread);
    }

    #[test]
    fn env_values_are_normalized() {
        let config = RuntimeConfig::from_env_values(Some("  PANIC "), Some("Current_Thread"));
        assert_eq!(config.exception_policy, ExceptionPolicy::Panic);
        assert_eq!(config.scheduler, SchedulerKind::CurrentThread);
    }

    #[test]
    fn unknown_env_values_fall_back() {
        let config = RuntimeConfig::from_env_values(Some("explode"), Some("threadpool"));
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn blank_env_values_fall_back() {
        let config = RuntimeConfig::from_env_values(Some("   "), Some(""));
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn unknown_value_error_names_the_key() {
        let err = "bogus".parse::<SchedulerKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown value \"bogus\" for RXM_SCHEDULER");
    }
}
