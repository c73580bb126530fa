//! Shared configuration for the Steward management gateway.
//!
//! [`Config`] is resolved through `ortho_config`, which layers built-in
//! defaults, an optional TOML file (`--config-path`), `STEWARD_*`
//! environment variables and command-line flags, with later layers taking
//! precedence. The dispatch core reads two concerns from it: the logging
//! setup used by its telemetry and the access policy directives that gate
//! every command.

mod logging;
mod policy;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use logging::{
    DEFAULT_LOG_FILTER, LogFormat, LogFormatParseError, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use policy::{
    PolicyDirective, PolicyDirectiveParseError, PolicyRule, PolicyScope, deduplicate_directives,
};

/// Resolved gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "STEWARD")]
pub struct Config {
    /// Filter expression handed to the tracing subscriber.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Access policy directives, applied in order with later entries winning.
    #[ortho_config(merge_strategy = "append")]
    #[serde(default)]
    pub policy: Vec<PolicyDirective>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            policy: Vec::new(),
        }
    }
}

impl Config {
    /// Returns the tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the policy directives with duplicates collapsed.
    ///
    /// Directives addressing the same scope and subject keep only the last
    /// occurrence so file, environment and CLI layers override each other
    /// predictably.
    #[must_use]
    pub fn policy_directives(&self) -> Vec<PolicyDirective> {
        let mut directives = self.policy.clone();
        deduplicate_directives(&mut directives);
        directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_allows_everything() {
        let config = Config::default();
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert!(config.policy_directives().is_empty());
    }

    #[test]
    fn later_policy_directives_win() {
        let config = Config {
            policy: vec![
                "type:write=deny".parse().expect("directive"),
                "method:get=deny".parse().expect("directive"),
                "TYPE:Write=allow".parse().expect("directive"),
            ],
            ..Config::default()
        };

        let directives = config.policy_directives();
        assert_eq!(directives.len(), 2);
        assert!(directives.contains(&PolicyDirective::new(
            PolicyScope::Type,
            "write",
            PolicyRule::Allow
        )));
        assert!(directives.contains(&PolicyDirective::new(
            PolicyScope::Method,
            "get",
            PolicyRule::Deny
        )));
    }
}
