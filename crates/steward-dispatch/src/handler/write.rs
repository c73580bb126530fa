//! WRITE: set one attribute of one object.

use serde_json::Value;

use super::{CommandHandler, HandlerContext};
use crate::command::CommandType;
use crate::errors::DispatchError;
use crate::executor::Target;
use crate::request::Request;

/// Writes an attribute and returns its previous value.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteHandler;

impl CommandHandler for WriteHandler {
    fn command_type(&self) -> CommandType {
        CommandType::Write
    }

    fn check_restriction(
        &self,
        context: &HandlerContext,
        request: &Request,
    ) -> Result<(), DispatchError> {
        context.check_type(self.command_type())?;
        match (request.target(), request.attribute()) {
            (Some(target), Some(attribute)) => context.check_attribute_write(target, attribute),
            _ => Ok(()),
        }
    }

    fn execute_single(&self, target: &Target, request: &Request) -> Result<Value, DispatchError> {
        let attribute = request
            .attribute()
            .ok_or_else(|| DispatchError::invalid_arguments("write requires an attribute"))?;
        let value = request
            .value()
            .cloned()
            .ok_or_else(|| DispatchError::invalid_arguments("write requires a value"))?;
        Ok(target
            .registry()
            .set_attribute(target.name(), attribute, value)?)
    }
}
