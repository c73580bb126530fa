//! Command types and transport methods.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Closed set of management commands the gateway understands.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CommandType {
    /// Read one or more attributes.
    Read,
    /// Write an attribute.
    Write,
    /// Invoke an operation.
    Exec,
    /// Describe the registered objects as a tree.
    List,
    /// Search for object names matching a pattern.
    Search,
    /// Report the gateway version.
    Version,
}

impl CommandType {
    /// Every command type, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Read,
        Self::Write,
        Self::Exec,
        Self::List,
        Self::Search,
        Self::Version,
    ];

    /// Position of the command type within [`CommandType::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Read => 0,
            Self::Write => 1,
            Self::Exec => 2,
            Self::List => 3,
            Self::Search => 4,
            Self::Version => 5,
        }
    }
}

/// Transport method a request was delivered with.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TransportMethod {
    /// Parameters carried in the request path or query.
    #[default]
    Get,
    /// Parameters carried in the request body.
    Post,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn indices_follow_declaration_order() {
        for (position, command) in CommandType::ALL.iter().enumerate() {
            assert_eq!(command.index(), position);
        }
    }

    #[rstest]
    #[case("read", CommandType::Read)]
    #[case("LIST", CommandType::List)]
    #[case("Exec", CommandType::Exec)]
    fn parses_command_types(#[case] input: &str, #[case] expected: CommandType) {
        assert_eq!(input.parse::<CommandType>().expect("command"), expected);
        assert_eq!(expected.to_string(), input.to_ascii_lowercase());
    }

    #[test]
    fn parses_methods() {
        assert_eq!("POST".parse::<TransportMethod>().ok(), Some(TransportMethod::Post));
        assert!("put".parse::<TransportMethod>().is_err());
    }
}
