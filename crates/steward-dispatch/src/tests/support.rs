//! Shared test doubles: configurable objects, a call-counting registry and
//! a recording handler.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::command::CommandType;
use crate::errors::{DispatchError, TeardownError, TeardownFailure};
use crate::executor::Target;
use crate::handler::{CommandHandler, HandlerContext};
use crate::name::{NamePattern, ObjectName};
use crate::registry::{
    AttributeInfo, BackendRegistry, HookError, LocalRegistry, ManageableObject, ObjectInfo,
    OperationInfo, RegistrationListener, RegistryError,
};
use crate::request::Request;

/// Parses an exact object name, panicking on malformed input.
pub fn name(text: &str) -> ObjectName {
    ObjectName::parse(text).expect("valid object name")
}

/// Parses a name pattern, panicking on malformed input.
pub fn pattern(text: &str) -> NamePattern {
    NamePattern::parse(text).expect("valid name pattern")
}

/// Object with in-memory attributes, an `echo` operation and optional
/// lifecycle failures.
#[derive(Debug)]
pub struct TestObject {
    name: ObjectName,
    attributes: Mutex<BTreeMap<String, Value>>,
    veto: Option<String>,
    deregistration_failure: Option<String>,
}

impl TestObject {
    pub fn new(text: &str) -> Self {
        Self {
            name: name(text),
            attributes: Mutex::new(BTreeMap::new()),
            veto: None,
            deregistration_failure: None,
        }
    }
    pub fn with_attribute(self, attribute: &str, value: Value) -> Self {
        self.attributes
            .lock()
            .expect("attribute mutex poisoned")
            .insert(attribute.to_owned(), value);
        self
    }
    pub fn vetoing(mut self, reason: &str) -> Self {
        self.veto = Some(reason.to_owned());
        self
    }
    pub fn failing_deregistration(mut self, reason: &str) -> Self {
        self.deregistration_failure = Some(reason.to_owned());
        self
    }
    pub fn shared(self) -> Arc<dyn ManageableObject> {
        Arc::new(self)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ManageableObject for TestObject {
    fn object_name(&self) -> ObjectName {
        self.name.clone()
    }

    fn describe(&self) -> ObjectInfo {
        let attributes = self
            .attributes
            .lock()
            .expect("attribute mutex poisoned")
            .iter()
            .map(|(attribute, value)| {
                (
                    attribute.clone(),
                    AttributeInfo {
                        kind: kind_of(value).to_owned(),
                        description: String::new(),
                        writable: true,
                    },
                )
            })
            .collect();
        let operations = BTreeMap::from([(
            String::from("echo"),
            OperationInfo {
                args: vec![String::from("values")],
                returns: String::from("array"),
                description: String::from("returns its arguments"),
            },
        )]);
        ObjectInfo {
            description: format!("test object {}", self.name),
            attributes,
            operations,
        }
    }

    fn attribute(&self, attribute: &str) -> Result<Value, RegistryError> {
        self.attributes
            .lock()
            .expect("attribute mutex poisoned")
            .get(attribute)
            .cloned()
            .ok_or_else(|| RegistryError::attribute_not_found(&self.name, attribute))
    }

    fn set_attribute(&self, attribute: &str, value: Value) -> Result<Value, RegistryError> {
        let mut attributes = self.attributes.lock().expect("attribute mutex poisoned");
        let slot = attributes
            .get_mut(attribute)
            .ok_or_else(|| RegistryError::attribute_not_found(&self.name, attribute))?;
        Ok(std::mem::replace(slot, value))
    }

    fn invoke(&self, operation: &str, arguments: &[Value]) -> Result<Value, RegistryError> {
        match operation {
            "echo" => Ok(Value::Array(arguments.to_vec())),
            _ => Err(RegistryError::operation_not_found(&self.name, operation)),
        }
    }

    fn pre_register(&self) -> Result<(), HookError> {
        self.veto.as_deref().map_or(Ok(()), |reason| Err(HookError::new(reason)))
    }

    fn pre_deregister(&self) -> Result<(), HookError> {
        self.deregistration_failure
            .as_deref()
            .map_or(Ok(()), |reason| Err(HookError::new(reason)))
    }
}

/// Registry wrapper counting every data access.
///
/// Lifecycle calls (`register`, `unregister`, `subscribe`, `unsubscribe`) are forwarded
/// without being counted so fixtures can populate the registry freely.
#[derive(Debug)]
pub struct SpyRegistry {
    inner: LocalRegistry,
    accesses: AtomicUsize,
}

impl SpyRegistry {
    pub fn new(label: &str) -> Self {
        Self {
            inner: LocalRegistry::new(label),
            accesses: AtomicUsize::new(0),
        }
    }
    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.accesses.fetch_add(1, Ordering::SeqCst);
    }
}

impl BackendRegistry for SpyRegistry {
    fn label(&self) -> &str {
        self.inner.label()
    }

    fn query_names(&self, pattern: &NamePattern) -> Result<Vec<ObjectName>, RegistryError> {
        self.touch();
        self.inner.query_names(pattern)
    }

    fn is_registered(&self, name: &ObjectName) -> bool {
        self.touch();
        self.inner.is_registered(name)
    }

    fn describe(&self, name: &ObjectName) -> Result<ObjectInfo, RegistryError> {
        self.touch();
        self.inner.describe(name)
    }

    fn attribute(&self, name: &ObjectName, attribute: &str) -> Result<Value, RegistryError> {
        self.touch();
        self.inner.attribute(name, attribute)
    }

    fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: &str,
        value: Value,
    ) -> Result<Value, RegistryError> {
        self.touch();
        self.inner.set_attribute(name, attribute, value)
    }

    fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        arguments: &[Value],
    ) -> Result<Value, RegistryError> {
        self.touch();
        self.inner.invoke(name, operation, arguments)
    }

    fn register(&self, object: Arc<dyn ManageableObject>) -> Result<ObjectName, RegistryError> {
        self.inner.register(object)
    }

    fn unregister(&self, name: &ObjectName) -> Result<(), RegistryError> {
        self.inner.unregister(name)
    }

    fn subscribe(&self, listener: Arc<dyn RegistrationListener>) {
        self.inner.subscribe(listener);
    }

    fn unsubscribe(&self, listener: &Arc<dyn RegistrationListener>) {
        self.inner.unsubscribe(listener);
    }
}

/// Handler recording how it was driven, with an optional teardown failure.
#[derive(Debug)]
pub struct RecordingHandler {
    command: CommandType,
    aggregate: bool,
    teardown_failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn single(command: CommandType) -> Self {
        Self {
            command,
            aggregate: false,
            teardown_failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }
    pub fn aggregate(command: CommandType) -> Self {
        Self {
            aggregate: true,
            ..Self::single(command)
        }
    }
    pub fn failing_teardown(mut self, message: &str) -> Self {
        self.teardown_failure = Some(message.to_owned());
        self
    }
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls mutex poisoned").push(call);
    }
}

impl CommandHandler for RecordingHandler {
    fn command_type(&self) -> CommandType {
        self.command
    }

    fn handles_all_at_once(&self, _request: &Request) -> bool {
        self.aggregate
    }

    fn check_restriction(
        &self,
        context: &HandlerContext,
        _request: &Request,
    ) -> Result<(), DispatchError> {
        context.check_type(self.command)
    }

    fn execute_single(&self, target: &Target, _request: &Request) -> Result<Value, DispatchError> {
        self.record(format!("single {}", target.name()));
        Ok(json!({ "target": target.name().to_string() }))
    }

    fn execute_all(
        &self,
        executor: &crate::executor::RegistryExecutor,
        _request: &Request,
        previous: Option<Value>,
    ) -> Result<Option<Value>, DispatchError> {
        self.record(format!("all generation={}", executor.current_generation()));
        let mut seen = previous
            .and_then(|value| value.as_u64())
            .unwrap_or_default();
        seen += 1;
        Ok(Some(json!(seen)))
    }

    fn destroy(&self) -> Result<(), TeardownError> {
        self.record(String::from("destroy"));
        self.teardown_failure.as_ref().map_or(Ok(()), |message| {
            Err(TeardownError::single(TeardownFailure::release(
                format!("handler {}", self.command),
                message.clone(),
            )))
        })
    }
}

/// Aggregate handler relying on every default capability.
#[derive(Debug)]
pub struct SilentHandler;

impl CommandHandler for SilentHandler {
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
}
