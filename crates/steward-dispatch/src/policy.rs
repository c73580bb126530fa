//! Access policy consulted before any handler touches a registry.
//!
//! [`PolicySource`] is the seam handlers query through
//! [`crate::HandlerContext`]. Command types and transport methods are always
//! checked; attribute and operation checks are finer-grained and default to
//! permitting everything.

use std::collections::BTreeSet;
use std::str::FromStr;

use steward_config::{Config, PolicyDirective, PolicyScope, deduplicate_directives};
use thiserror::Error;

use crate::command::{CommandType, TransportMethod};
use crate::name::NamePattern;

/// Decides which requests may proceed.
pub trait PolicySource: Send + Sync {
    /// Returns `true` when the command type may be executed.
    fn is_type_allowed(&self, command: CommandType) -> bool;

    /// Returns `true` when requests may arrive with `method`.
    fn is_method_allowed(&self, method: TransportMethod) -> bool;

    /// Returns `true` when `attribute` may be read on objects matching
    /// `target`.
    fn is_attribute_read_allowed(&self, _target: &NamePattern, _attribute: &str) -> bool {
        true
    }

    /// Returns `true` when `attribute` may be written on objects matching
    /// `target`.
    fn is_attribute_write_allowed(&self, _target: &NamePattern, _attribute: &str) -> bool {
        true
    }

    /// Returns `true` when `operation` may be invoked on objects matching
    /// `target`.
    fn is_operation_allowed(&self, _target: &NamePattern, _operation: &str) -> bool {
        true
    }
}

/// Policy permitting every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllPolicy;

impl PolicySource for AllowAllPolicy {
    fn is_type_allowed(&self, _command: CommandType) -> bool {
        true
    }

    fn is_method_allowed(&self, _method: TransportMethod) -> bool {
        true
    }
}

/// Errors raised while building a [`ConfigPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A `type` directive named a command type that does not exist.
    #[error("policy directive '{directive}' names unknown command type '{subject}'")]
    UnknownCommand {
        /// Directive as written.
        directive: String,
        /// Unrecognised subject.
        subject: String,
    },

    /// A `method` directive named a transport method that does not exist.
    #[error("policy directive '{directive}' names unknown transport method '{subject}'")]
    UnknownMethod {
        /// Directive as written.
        directive: String,
        /// Unrecognised subject.
        subject: String,
    },
}

/// Policy built from configuration directives.
///
/// Everything is allowed unless a directive denies it. Directives are
/// applied in order, so a later `allow` lifts an earlier `deny`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigPolicy {
    denied_types: BTreeSet<CommandType>,
    denied_methods: Vec<TransportMethod>,
}

impl ConfigPolicy {
    /// Builds the policy from the configuration's directives.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when a directive names an unknown command type
    /// or transport method.
    pub fn from_config(config: &Config) -> Result<Self, PolicyError> {
        Self::from_directives(&config.policy_directives())
    }

    /// Builds the policy from explicit directives.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when a directive names an unknown command type
    /// or transport method.
    pub fn from_directives(directives: &[PolicyDirective]) -> Result<Self, PolicyError> {
        let mut ordered = directives.to_vec();
        deduplicate_directives(&mut ordered);

        let mut policy = Self::default();
        for directive in &ordered {
            match directive.scope {
                PolicyScope::Type => {
                    let command = CommandType::from_str(&directive.subject).map_err(|_| {
                        PolicyError::UnknownCommand {
                            directive: directive.to_string(),
                            subject: directive.subject.clone(),
                        }
                    })?;
                    policy.set_type(command, directive.denies());
                }
                PolicyScope::Method => {
                    let method = TransportMethod::from_str(&directive.subject).map_err(|_| {
                        PolicyError::UnknownMethod {
                            directive: directive.to_string(),
                            subject: directive.subject.clone(),
                        }
                    })?;
                    policy.set_method(method, directive.denies());
                }
            }
        }
        Ok(policy)
    }

    /// Denies a command type.
    #[must_use]
    pub fn deny_type(mut self, command: CommandType) -> Self {
        self.set_type(command, true);
        self
    }

    /// Denies a transport method.
    #[must_use]
    pub fn deny_method(mut self, method: TransportMethod) -> Self {
        self.set_method(method, true);
        self
    }

    fn set_type(&mut self, command: CommandType, denied: bool) {
        if denied {
            self.denied_types.insert(command);
        } else {
            self.denied_types.remove(&command);
        }
    }

    fn set_method(&mut self, method: TransportMethod, denied: bool) {
        self.denied_methods.retain(|existing| *existing != method);
        if denied {
            self.denied_methods.push(method);
        }
    }
}

impl PolicySource for ConfigPolicy {
    fn is_type_allowed(&self, command: CommandType) -> bool {
        !self.denied_types.contains(&command)
    }

    fn is_method_allowed(&self, method: TransportMethod) -> bool {
        !self.denied_methods.contains(&method)
    }
}
