//! Access policy directives.
//!
//! A directive names a scope (`type` for command types, `method` for
//! transport methods), a subject within that scope and a rule. The textual
//! form is `scope:subject=rule`, for example `type:write=deny` or
//! `method:get=allow`. Subjects are kept as normalised strings here; the
//! dispatch crate resolves them against its closed enumerations.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Part of a request a directive applies to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, EnumString,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PolicyScope {
    /// The command type carried by the request.
    Type,
    /// The transport method the request arrived with.
    Method,
}

/// Decision applied to the directive's subject.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PolicyRule {
    /// Permit the subject.
    #[default]
    Allow,
    /// Reject the subject.
    Deny,
}

/// Errors produced when parsing [`PolicyDirective`] values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyDirectiveParseError {
    /// Scope separator (`:`) was missing from the directive.
    #[error("directive '{0}' is missing the scope separator ':'")]
    MissingScope(String),
    /// Rule assignment (`=`) was missing from the directive.
    #[error("directive '{0}' is missing the rule assignment '='")]
    MissingRule(String),
    /// The scope was not `type` or `method`.
    #[error("unsupported policy scope '{0}'")]
    InvalidScope(String),
    /// The rule was not `allow` or `deny`.
    #[error("unsupported policy rule '{0}'")]
    InvalidRule(String),
    /// The subject between the separators was empty.
    #[error("directive '{0}' has an empty subject")]
    EmptySubject(String),
}

/// A single allow/deny directive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct PolicyDirective {
    /// Scope the subject belongs to.
    pub scope: PolicyScope,
    /// Normalised subject, such as `write` or `post`.
    pub subject: String,
    /// Decision for the subject.
    pub rule: PolicyRule,
}

impl PolicyDirective {
    /// Creates a directive, normalising the subject.
    #[must_use]
    pub fn new(scope: PolicyScope, subject: impl AsRef<str>, rule: PolicyRule) -> Self {
        Self {
            scope,
            subject: normalise_key(subject.as_ref()),
            rule,
        }
    }

    /// Returns `true` when the directive denies its subject.
    #[must_use]
    pub fn denies(&self) -> bool {
        self.rule == PolicyRule::Deny
    }
}

impl fmt::Display for PolicyDirective {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}={}", self.scope, self.subject, self.rule)
    }
}

impl FromStr for PolicyDirective {
    type Err = PolicyDirectiveParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (scope, rest) = input
            .split_once(':')
            .ok_or_else(|| PolicyDirectiveParseError::MissingScope(input.to_owned()))?;
        let (subject, rule) = rest
            .split_once('=')
            .ok_or_else(|| PolicyDirectiveParseError::MissingRule(input.to_owned()))?;
        let scope = PolicyScope::from_str(scope.trim())
            .map_err(|_| PolicyDirectiveParseError::InvalidScope(scope.trim().to_owned()))?;
        let rule = PolicyRule::from_str(rule.trim())
            .map_err(|_| PolicyDirectiveParseError::InvalidRule(rule.trim().to_owned()))?;
        if subject.trim().is_empty() {
            return Err(PolicyDirectiveParseError::EmptySubject(input.to_owned()));
        }
        Ok(Self::new(scope, subject, rule))
    }
}

impl TryFrom<String> for PolicyDirective {
    type Error = PolicyDirectiveParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PolicyDirective> for String {
    fn from(directive: PolicyDirective) -> Self {
        directive.to_string()
    }
}

/// Deduplicates directives in place, keeping the last directive per subject.
pub fn deduplicate_directives(directives: &mut Vec<PolicyDirective>) {
    let mut merged: BTreeMap<(PolicyScope, String), PolicyDirective> = BTreeMap::new();
    for directive in directives.drain(..) {
        merged.insert((directive.scope, directive.subject.clone()), directive);
    }
    *directives = merged.into_values().collect();
}

fn normalise_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_and_normalises_directive() {
        let directive: PolicyDirective = " Type : Write = DENY".parse().expect("directive");
        assert_eq!(directive.scope, PolicyScope::Type);
        assert_eq!(directive.subject, "write");
        assert!(directive.denies());
        assert_eq!(directive.to_string(), "type:write=deny");
    }

    #[rstest]
    #[case::no_scope("write=deny")]
    #[case::no_rule("type:write")]
    #[case::bad_scope("header:write=deny")]
    #[case::bad_rule("type:write=maybe")]
    #[case::empty_subject("type: =deny")]
    fn rejects_malformed_directives(#[case] input: &str) {
        assert!(input.parse::<PolicyDirective>().is_err(), "{input} should fail");
    }

    #[test]
    fn reports_missing_separator() {
        let error = "write=deny"
            .parse::<PolicyDirective>()
            .expect_err("missing scope");
        assert_eq!(
            error,
            PolicyDirectiveParseError::MissingScope(String::from("write=deny"))
        );
    }

    #[test]
    fn keeps_scopes_apart_when_deduplicating() {
        let mut directives = vec![
            PolicyDirective::new(PolicyScope::Type, "list", PolicyRule::Deny),
            PolicyDirective::new(PolicyScope::Method, "list", PolicyRule::Deny),
            PolicyDirective::new(PolicyScope::Type, "LIST", PolicyRule::Allow),
        ];
        deduplicate_directives(&mut directives);

        assert_eq!(directives.len(), 2);
        assert_eq!(
            directives.first(),
            Some(&PolicyDirective::new(
                PolicyScope::Type,
                "list",
                PolicyRule::Allow
            ))
        );
    }
}
