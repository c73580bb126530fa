//! SEARCH: names of objects matching a pattern.

use std::collections::BTreeSet;

use serde_json::Value;

use super::{CommandHandler, HandlerContext};
use crate::command::CommandType;
use crate::errors::DispatchError;
use crate::executor::RegistryExecutor;
use crate::request::Request;

/// Returns the sorted, de-duplicated names matching the request's pattern.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchHandler;

impl CommandHandler for SearchHandler {
    fn command_type(&self) -> CommandType {
        CommandType::Search
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
        request: &Request,
        previous: Option<Value>,
    ) -> Result<Option<Value>, DispatchError> {
        let mut names: BTreeSet<String> = match previous {
            Some(Value::Array(values)) => values
                .into_iter()
                .filter_map(|value| value.as_str().map(str::to_owned))
                .collect(),
            _ => BTreeSet::new(),
        };
        names.extend(
            executor
                .query_names(request.target_pattern()?)?
                .iter()
                .map(ToString::to_string),
        );
        Ok(Some(Value::Array(
            names.into_iter().map(Value::String).collect(),
        )))
    }
}
