//! Parsed management requests.
//!
//! Transports decode their wire format into a [`Request`] through
//! [`RequestBuilder`]; the dispatch core never sees raw input. The target is
//! parsed eagerly so malformed names fail before any handler runs.

use serde_json::Value;

use crate::command::{CommandType, TransportMethod};
use crate::errors::DispatchError;
use crate::name::NamePattern;

/// A single management request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    command: CommandType,
    target: Option<NamePattern>,
    attribute: Option<String>,
    operation: Option<String>,
    arguments: Vec<Value>,
    value: Option<Value>,
    path: Option<String>,
    method: TransportMethod,
    if_modified_since: Option<u64>,
}

impl Request {
    /// Starts building a request for `command`.
    #[must_use]
    pub fn builder(command: CommandType) -> RequestBuilder {
        RequestBuilder::new(command)
    }

    /// Command type of the request.
    #[must_use]
    pub const fn command(&self) -> CommandType {
        self.command
    }

    /// Target name or pattern, if any.
    #[must_use]
    pub const fn target(&self) -> Option<&NamePattern> {
        self.target.as_ref()
    }

    /// Returns the target, failing when the request carries none.
    pub fn target_pattern(&self) -> Result<&NamePattern, DispatchError> {
        self.target.as_ref().ok_or_else(|| {
            DispatchError::invalid_arguments(format!("{} requires a target", self.command))
        })
    }

    /// Attribute name for READ and WRITE.
    #[must_use]
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// Operation name for EXEC.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    /// Operation arguments for EXEC.
    #[must_use]
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Value to write for WRITE.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Path filter for LIST, as `domain` or `domain/property-list`.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Transport method the request arrived with.
    #[must_use]
    pub const fn method(&self) -> TransportMethod {
        self.method
    }

    /// Change-generation token for conditional requests.
    #[must_use]
    pub const fn if_modified_since(&self) -> Option<u64> {
        self.if_modified_since
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    command: CommandType,
    target: Option<String>,
    attribute: Option<String>,
    operation: Option<String>,
    arguments: Vec<Value>,
    value: Option<Value>,
    path: Option<String>,
    method: TransportMethod,
    if_modified_since: Option<u64>,
}

impl RequestBuilder {
    fn new(command: CommandType) -> Self {
        Self {
            command,
            target: None,
            attribute: None,
            operation: None,
            arguments: Vec::new(),
            value: None,
            path: None,
            method: TransportMethod::default(),
            if_modified_since: None,
        }
    }

    /// Sets the target name or pattern.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the attribute name.
    #[must_use]
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Sets the operation name.
    #[must_use]
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Appends an operation argument.
    #[must_use]
    pub fn argument(mut self, argument: Value) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Sets the value to write.
    #[must_use]
    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the LIST path filter.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the transport method.
    #[must_use]
    pub const fn method(mut self, method: TransportMethod) -> Self {
        self.method = method;
        self
    }

    /// Makes the request conditional on changes after `generation`.
    #[must_use]
    pub const fn if_modified_since(mut self, generation: u64) -> Self {
        self.if_modified_since = Some(generation);
        self
    }

    /// Parses the target and builds the request.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Name`] when the target is not a valid object
    /// name or pattern.
    pub fn build(self) -> Result<Request, DispatchError> {
        let target = self
            .target
            .as_deref()
            .map(NamePattern::parse)
            .transpose()?;
        Ok(Request {
            command: self.command,
            target,
            attribute: self.attribute,
            operation: self.operation,
            arguments: self.arguments,
            value: self.value,
            path: self.path,
            method: self.method,
            if_modified_since: self.if_modified_since,
        })
    }
}
