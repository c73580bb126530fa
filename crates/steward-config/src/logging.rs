//! Logging settings shared by the gateway binaries and the dispatch core.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Filter expression used when no other layer configures one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Output formats understood by the telemetry layer.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, flattened for log shippers.
    #[default]
    Json,
    /// Single-line human-readable events.
    Compact,
}

/// Error returned when text does not name a [`LogFormat`].
pub type LogFormatParseError = strum::ParseError;

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned default filter, for serde and `ortho_config` defaults.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default log format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::lower("json", LogFormat::Json)]
    #[case::upper("COMPACT", LogFormat::Compact)]
    #[case::mixed("Compact", LogFormat::Compact)]
    fn parses_formats_case_insensitively(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(input.parse::<LogFormat>().expect("format"), expected);
    }

    #[test]
    fn rejects_unknown_format() {
        assert!("pretty".parse::<LogFormat>().is_err());
    }
}
