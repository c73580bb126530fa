//! Command handlers and the shared dispatch pipeline.
//!
//! Each [`CommandHandler`] serves one [`CommandType`] and picks its dispatch
//! mode per request:
//!
//! - **single**: the request names exactly one object. The pipeline checks
//!   policy, locates the target across all registries and hands it to
//!   [`CommandHandler::execute_single`].
//! - **aggregate**: the handler needs every registry at once, for example to
//!   build a listing. The pipeline checks the type restriction and hands the
//!   executor to [`CommandHandler::execute_all`] together with the result
//!   accumulated so far.
//!
//! The pipeline lives on [`HandlerContext`] so handlers cannot reorder its
//! steps. Policy always runs before any registry is touched.

mod exec;
mod list;
mod read;
mod search;
mod version;
mod write;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::command::{CommandType, TransportMethod};
use crate::errors::{DispatchError, TeardownError};
use crate::executor::{RegistryExecutor, Target};
use crate::name::NamePattern;
use crate::policy::PolicySource;
use crate::request::Request;

pub use self::exec::ExecHandler;
pub use self::list::ListHandler;
pub use self::read::ReadHandler;
pub use self::search::SearchHandler;
pub use self::version::VersionHandler;
pub use self::write::WriteHandler;

const HANDLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handler");

/// Handler for one command type.
pub trait CommandHandler: Send + Sync {
    /// Command type this handler serves.
    fn command_type(&self) -> CommandType;

    /// Returns `true` when `request` should be executed against all
    /// registries at once rather than a single located target.
    fn handles_all_at_once(&self, _request: &Request) -> bool {
        false
    }

    /// Checks whether `request` is permitted.
    ///
    /// Implementations call [`HandlerContext::check_type`] and may add
    /// finer-grained checks for attributes or operations.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PolicyViolation`] when the request is refused.
    fn check_restriction(
        &self,
        context: &HandlerContext,
        request: &Request,
    ) -> Result<(), DispatchError>;

    /// Executes the request against a single located object.
    ///
    /// # Errors
    ///
    /// The default implementation returns [`DispatchError::Unsupported`].
    fn execute_single(&self, _target: &Target, _request: &Request) -> Result<Value, DispatchError> {
        Err(DispatchError::unsupported(self.command_type(), "single"))
    }

    /// Executes the request across every registry.
    ///
    /// `previous` carries the result accumulated so far; implementations
    /// merge into it and return the new accumulator. The default returns
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns any failure raised while querying the registries.
    fn execute_all(
        &self,
        _executor: &RegistryExecutor,
        _request: &Request,
        _previous: Option<Value>,
    ) -> Result<Option<Value>, DispatchError> {
        Ok(None)
    }

    /// Releases resources held by the handler.
    ///
    /// # Errors
    ///
    /// Returns every resource that could not be released.
    fn destroy(&self) -> Result<(), TeardownError> {
        Ok(())
    }
}

/// Policy-aware context driving the dispatch pipeline.
#[derive(Clone)]
pub struct HandlerContext {
    policy: Arc<dyn PolicySource>,
}

impl HandlerContext {
    /// Creates a context backed by `policy`.
    #[must_use]
    pub fn new(policy: Arc<dyn PolicySource>) -> Self {
        Self { policy }
    }

    /// Policy consulted by the checks.
    #[must_use]
    pub fn policy(&self) -> &dyn PolicySource {
        self.policy.as_ref()
    }

    /// Fails when the command type is disallowed.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PolicyViolation`].
    pub fn check_type(&self, command: CommandType) -> Result<(), DispatchError> {
        if self.policy.is_type_allowed(command) {
            Ok(())
        } else {
            Err(DispatchError::policy_violation(format!(
                "command type '{command}' is not allowed"
            )))
        }
    }

    /// Fails when the transport method is disallowed.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PolicyViolation`].
    pub fn check_method(&self, method: TransportMethod) -> Result<(), DispatchError> {
        if self.policy.is_method_allowed(method) {
            Ok(())
        } else {
            Err(DispatchError::policy_violation(format!(
                "transport method '{method}' is not allowed"
            )))
        }
    }

    /// Fails when `attribute` may not be read on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PolicyViolation`].
    pub fn check_attribute_read(
        &self,
        target: &NamePattern,
        attribute: &str,
    ) -> Result<(), DispatchError> {
        if self.policy.is_attribute_read_allowed(target, attribute) {
            Ok(())
        } else {
            Err(DispatchError::policy_violation(format!(
                "reading '{attribute}' on {target} is not allowed"
            )))
        }
    }

    /// Fails when `attribute` may not be written on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PolicyViolation`].
    pub fn check_attribute_write(
        &self,
        target: &NamePattern,
        attribute: &str,
    ) -> Result<(), DispatchError> {
        if self.policy.is_attribute_write_allowed(target, attribute) {
            Ok(())
        } else {
            Err(DispatchError::policy_violation(format!(
                "writing '{attribute}' on {target} is not allowed"
            )))
        }
    }

    /// Fails when `operation` may not be invoked on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PolicyViolation`].
    pub fn check_operation(
        &self,
        target: &NamePattern,
        operation: &str,
    ) -> Result<(), DispatchError> {
        if self.policy.is_operation_allowed(target, operation) {
            Ok(())
        } else {
            Err(DispatchError::policy_violation(format!(
                "invoking '{operation}' on {target} is not allowed"
            )))
        }
    }

    /// Runs the single-target pipeline.
    ///
    /// Callers must only use this when
    /// [`CommandHandler::handles_all_at_once`] is `false` for `request`.
    ///
    /// # Errors
    ///
    /// Returns the first failure among the restriction check, the method
    /// check, target location and execution.
    pub fn handle_single(
        &self,
        handler: &dyn CommandHandler,
        executor: &RegistryExecutor,
        request: &Request,
    ) -> Result<Value, DispatchError> {
        handler.check_restriction(self, request)?;
        self.check_method(request.method())?;
        let target = executor.locate_exactly_one(request.target_pattern()?)?;
        trace!(target: HANDLER_TARGET, command = %request.command(), ?target, "located target");
        handler.execute_single(&target, request)
    }

    /// Runs the aggregate pipeline.
    ///
    /// Only the handler's restriction check runs here; the transport method
    /// is not checked on this path.
    ///
    /// # Errors
    ///
    /// Returns the restriction failure or the handler's execution failure.
    pub fn handle_all(
        &self,
        handler: &dyn CommandHandler,
        executor: &RegistryExecutor,
        request: &Request,
        previous: Option<Value>,
    ) -> Result<Option<Value>, DispatchError> {
        handler.check_restriction(self, request)?;
        handler.execute_all(executor, request, previous)
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("HandlerContext").finish_non_exhaustive()
    }
}

/// Fails with [`DispatchError::NotModified`] when nothing has changed since
/// the request's generation token.
///
/// Requests without a token always proceed.
///
/// # Errors
///
/// Returns [`DispatchError::NotModified`] when the executor's generation has
/// not advanced strictly past the token.
pub fn check_for_modified_since(
    executor: &RegistryExecutor,
    request: &Request,
) -> Result<(), DispatchError> {
    let Some(since) = request.if_modified_since() else {
        return Ok(());
    };
    let current = executor.current_generation();
    if current > since {
        Ok(())
    } else {
        Err(DispatchError::NotModified { since, current })
    }
}
