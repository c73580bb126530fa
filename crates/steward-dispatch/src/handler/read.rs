//! READ: attribute values of one object or of every object matching a
//! pattern.

use serde_json::{Map, Value};

use super::{CommandHandler, HandlerContext};
use crate::command::CommandType;
use crate::errors::DispatchError;
use crate::executor::{RegistryExecutor, Target};
use crate::name::ObjectName;
use crate::registry::{BackendRegistry, RegistryError};
use crate::request::Request;

/// Reads attributes.
///
/// Exact targets are read directly. Pattern targets are read across every
/// registry and returned as a map from object name to value; objects lacking
/// the requested attribute are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadHandler;

impl CommandHandler for ReadHandler {
    fn command_type(&self) -> CommandType {
        CommandType::Read
    }

    fn handles_all_at_once(&self, request: &Request) -> bool {
        request.target().is_some_and(|target| target.is_pattern())
    }

    fn check_restriction(
        &self,
        context: &HandlerContext,
        request: &Request,
    ) -> Result<(), DispatchError> {
        context.check_type(self.command_type())?;
        match (request.target(), request.attribute()) {
            (Some(target), Some(attribute)) => context.check_attribute_read(target, attribute),
            _ => Ok(()),
        }
    }

    fn execute_single(&self, target: &Target, request: &Request) -> Result<Value, DispatchError> {
        Ok(read(target.registry(), target.name(), request.attribute())?)
    }

    fn execute_all(
        &self,
        executor: &RegistryExecutor,
        request: &Request,
        previous: Option<Value>,
    ) -> Result<Option<Value>, DispatchError> {
        let pattern = request.target_pattern()?;
        let mut values = match previous {
            Some(Value::Object(values)) => values,
            _ => Map::new(),
        };

        executor.for_each_matching(pattern, |registry, name| {
            match read(registry, name, request.attribute()) {
                Ok(value) => {
                    values.insert(name.to_string(), value);
                    Ok(())
                }
                Err(RegistryError::AttributeNotFound { .. }) => Ok(()),
                Err(error) => Err(DispatchError::from(error)),
            }
        })?;

        if values.is_empty() {
            return Err(DispatchError::not_found(pattern));
        }
        Ok(Some(Value::Object(values)))
    }
}

fn read(
    registry: &dyn BackendRegistry,
    name: &ObjectName,
    attribute: Option<&str>,
) -> Result<Value, RegistryError> {
    if let Some(attribute) = attribute {
        return registry.attribute(name, attribute);
    }
    let info = registry.describe(name)?;
    let mut values = Map::new();
    for attribute in info.attributes.keys() {
        values.insert(attribute.clone(), registry.attribute(name, attribute)?);
    }
    Ok(Value::Object(values))
}
