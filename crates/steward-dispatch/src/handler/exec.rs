//! EXEC: invoke an operation on one object.

use serde_json::Value;

use super::{CommandHandler, HandlerContext};
use crate::command::CommandType;
use crate::errors::DispatchError;
use crate::executor::Target;
use crate::request::Request;

/// Invokes an operation with the request's JSON arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecHandler;

impl CommandHandler for ExecHandler {
    fn command_type(&self) -> CommandType {
        CommandType::Exec
    }

    fn check_restriction(
        &self,
        context: &HandlerContext,
        request: &Request,
    ) -> Result<(), DispatchError> {
        context.check_type(self.command_type())?;
        match (request.target(), request.operation()) {
            (Some(target), Some(operation)) => context.check_operation(target, operation),
            _ => Ok(()),
        }
    }

    fn execute_single(&self, target: &Target, request: &Request) -> Result<Value, DispatchError> {
        let operation = request
            .operation()
            .ok_or_else(|| DispatchError::invalid_arguments("exec requires an operation"))?;
        Ok(target
            .registry()
            .invoke(target.name(), operation, request.arguments())?)
    }
}
