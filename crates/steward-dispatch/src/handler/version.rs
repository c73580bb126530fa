//! VERSION: gateway identity and change generation.

use serde_json::{Value, json};

use super::{CommandHandler, HandlerContext};
use crate::command::CommandType;
use crate::errors::DispatchError;
use crate::executor::RegistryExecutor;
use crate::request::Request;

const AGENT: &str = "steward";

/// Reports the agent name, crate version and current change generation.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionHandler;

impl CommandHandler for VersionHandler {
    fn command_type(&self) -> CommandType {
        CommandType::Version
    }

    fn handles_all_at_once(&self, _request: &Request) -> bool {
        true
    }

    fn check_restriction(
        &self,
        context: &HandlerContext,
        _request: &Request,
    ) -> Result<(), DispatchError> {
        context.check_type(self.command_type())
    }

    fn execute_all(
        &self,
        executor: &RegistryExecutor,
        _request: &Request,
        _previous: Option<Value>,
    ) -> Result<Option<Value>, DispatchError> {
        Ok(Some(json!({
            "agent": AGENT,
            "version": env!("CARGO_PKG_VERSION"),
            "generation": executor.current_generation(),
        })))
    }
}
