//! Error types for request dispatch and teardown.
//!
//! [`DispatchError`] is what a transport layer receives from
//! [`crate::Dispatcher::dispatch`]. Two of its variants are not faults:
//! [`DispatchError::PolicyViolation`] is an expected, policy-driven refusal
//! and [`DispatchError::NotModified`] is the conditional-request short
//! circuit. Callers should map both to cheap responses.
//!
//! [`TeardownError`] aggregates every failure seen while releasing
//! resources; it is never produced for the first failure alone.

use std::fmt;

use thiserror::Error;

use crate::command::CommandType;
use crate::name::NameError;
use crate::registry::RegistryError;

/// Errors surfaced while dispatching a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The command type, transport method or a parameter is disallowed.
    #[error("policy violation: {message}")]
    PolicyViolation {
        /// Description of the refused element.
        message: String,
    },

    /// Nothing changed since the caller's generation token.
    #[error("not modified since generation {since} (current generation {current})")]
    NotModified {
        /// Token supplied by the caller.
        since: u64,
        /// Generation observed when the check ran.
        current: u64,
    },

    /// The target pattern matched no object in any registry.
    #[error("no object matches '{pattern}'")]
    NotFound {
        /// Pattern from the request.
        pattern: String,
    },

    /// The target pattern matched more than one object.
    #[error("'{pattern}' is ambiguous: matched {}", .matches.join(", "))]
    AmbiguousTarget {
        /// Pattern from the request.
        pattern: String,
        /// Every match, qualified with its registry label.
        matches: Vec<String>,
    },

    /// No handler is installed for the command type.
    #[error("no handler installed for command type '{command}'")]
    UnknownCommand {
        /// Command type of the request.
        command: CommandType,
    },

    /// Two handlers were installed for the same command type.
    #[error("a handler for command type '{command}' is already installed")]
    DuplicateHandler {
        /// Command type served by both handlers.
        command: CommandType,
    },

    /// The request lacks parameters the command needs, or carries bad ones.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// Description of the problem.
        message: String,
    },

    /// The handler does not implement the requested dispatch mode.
    #[error("command type '{command}' does not support {mode} dispatch")]
    Unsupported {
        /// Command type of the handler.
        command: CommandType,
        /// Dispatch mode that was attempted.
        mode: &'static str,
    },

    /// A registry or object reported a failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The request's target name could not be parsed.
    #[error("invalid object name: {0}")]
    Name(#[from] NameError),
}

impl DispatchError {
    /// Creates a policy violation.
    #[must_use]
    pub fn policy_violation(message: impl Into<String>) -> Self {
        Self::PolicyViolation {
            message: message.into(),
        }
    }

    /// Creates a not-found error for a pattern.
    #[must_use]
    pub fn not_found(pattern: impl ToString) -> Self {
        Self::NotFound {
            pattern: pattern.to_string(),
        }
    }

    /// Creates an invalid arguments error.
    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Creates an unsupported-mode error.
    #[must_use]
    pub fn unsupported(command: CommandType, mode: &'static str) -> Self {
        Self::Unsupported { command, mode }
    }

    /// Returns `true` for the conditional-request short circuit.
    #[must_use]
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::NotModified { .. })
    }

    /// Returns `true` for policy-driven refusals.
    #[must_use]
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Self::PolicyViolation { .. })
    }

    /// Returns `true` when the error is an expected outcome rather than a
    /// fault worth logging at warning level.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        self.is_not_modified() || self.is_policy_violation()
    }
}

/// Cause of a single teardown failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownCause {
    /// The registry refused or could not find the object.
    Registry(RegistryError),
    /// A handler or other component failed to release a resource.
    Release {
        /// Description of the failure.
        message: String,
    },
}

impl fmt::Display for TeardownCause {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(error) => error.fmt(formatter),
            Self::Release { message } => formatter.write_str(message),
        }
    }
}

/// One subject that failed to tear down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    /// What failed to release, such as an object name or handler type.
    pub subject: String,
    /// Why it failed.
    pub cause: TeardownCause,
}

impl TeardownFailure {
    /// Creates a failure caused by a registry error.
    #[must_use]
    pub fn registry(subject: impl Into<String>, error: RegistryError) -> Self {
        Self {
            subject: subject.into(),
            cause: TeardownCause::Registry(error),
        }
    }

    /// Creates a failure with a free-form cause.
    #[must_use]
    pub fn release(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            cause: TeardownCause::Release {
                message: message.into(),
            },
        }
    }
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} ({})", self.subject, self.cause)
    }
}

/// Every failure collected during a best-effort teardown.
///
/// The message lists each failed subject so operators see all of them at
/// once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("teardown failed for {} subject(s): {}", .failures.len(), summarise(.failures))]
pub struct TeardownError {
    failures: Vec<TeardownFailure>,
}

impl TeardownError {
    /// Builds an aggregate from collected failures.
    ///
    /// Returns `None` when `failures` is empty.
    #[must_use]
    pub fn from_failures(failures: Vec<TeardownFailure>) -> Option<Self> {
        (!failures.is_empty()).then_some(Self { failures })
    }

    /// Builds an aggregate holding a single failure.
    #[must_use]
    pub fn single(failure: TeardownFailure) -> Self {
        Self {
            failures: vec![failure],
        }
    }

    /// The collected failures in the order they occurred.
    #[must_use]
    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    /// Consumes the aggregate, returning the failures.
    #[must_use]
    pub fn into_failures(self) -> Vec<TeardownFailure> {
        self.failures
    }
}

fn summarise(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
