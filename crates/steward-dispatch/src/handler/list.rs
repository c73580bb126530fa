//! LIST: describe registered objects as a `domain → properties → info`
//! tree.

use serde_json::{Map, Value};

use super::{CommandHandler, HandlerContext, check_for_modified_since};
use crate::command::CommandType;
use crate::errors::DispatchError;
use crate::executor::RegistryExecutor;
use crate::name::{NamePattern, ObjectName};
use crate::registry::RegistryError;
use crate::request::Request;

const PATH_SEPARATOR: char = '/';

/// Lists object metadata across every registry.
///
/// Honours the request's change-generation token: when nothing has been
/// registered or unregistered since, the listing is skipped with
/// [`DispatchError::NotModified`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ListHandler;

impl CommandHandler for ListHandler {
    fn command_type(&self) -> CommandType {
        CommandType::List
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
        check_for_modified_since(executor, request)?;

        let pattern = request.target().cloned().unwrap_or_else(NamePattern::any);
        let filter = request.path().map(PathFilter::parse).transpose()?;
        let mut tree = match previous {
            Some(Value::Object(tree)) => tree,
            _ => Map::new(),
        };

        executor.for_each_matching::<DispatchError, _>(&pattern, |registry, name| {
            if filter.as_ref().is_some_and(|filter| !filter.admits(name)) {
                return Ok(());
            }
            let info = serde_json::to_value(registry.describe(name)?)
                .map_err(|error| RegistryError::object(name, error.to_string()))?;
            insert(&mut tree, name, info);
            Ok(())
        })?;

        Ok(Some(Value::Object(tree)))
    }
}

fn insert(tree: &mut Map<String, Value>, name: &ObjectName, info: Value) {
    let domain = tree
        .entry(name.domain())
        .or_insert_with(|| Value::Object(Map::new()));
    if !domain.is_object() {
        *domain = Value::Object(Map::new());
    }
    if let Value::Object(objects) = domain {
        objects.insert(name.property_list(), info);
    }
}

/// `domain` or `domain/property-list`.
struct PathFilter {
    domain: String,
    object: Option<ObjectName>,
}

impl PathFilter {
    /// Properties are canonicalised, so their order in the path is free.
    fn parse(path: &str) -> Result<Self, DispatchError> {
        let path = path.trim_matches(PATH_SEPARATOR);
        match path.split_once(PATH_SEPARATOR) {
            Some((domain, properties)) => {
                let object =
                    ObjectName::parse(&format!("{domain}:{properties}")).map_err(|error| {
                        DispatchError::invalid_arguments(format!(
                            "invalid list path '{path}': {error}"
                        ))
                    })?;
                Ok(Self {
                    domain: object.domain().to_owned(),
                    object: Some(object),
                })
            }
            None => Ok(Self {
                domain: path.to_owned(),
                object: None,
            }),
        }
    }

    fn admits(&self, name: &ObjectName) -> bool {
        match &self.object {
            Some(object) => object == name,
            None => name.domain() == self.domain,
        }
    }
}
