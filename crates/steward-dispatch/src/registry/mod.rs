//! Backend registries and the objects they hold.
//!
//! A [`BackendRegistry`] is one addressable collection of
//! [`ManageableObject`]s. The dispatch core never reaches into objects
//! directly; it queries registries by [`NamePattern`] and reads, writes or
//! invokes through them. Registries announce every successful registration
//! and unregistration to subscribed [`RegistrationListener`]s, which is how
//! the executor's change generation observes mutation.

mod local;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::name::{NamePattern, ObjectName};

pub use self::local::LocalRegistry;

/// Errors raised by registries and the objects they hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No object with the given name is registered.
    #[error("instance not found: {name}")]
    InstanceNotFound {
        /// Name that was looked up.
        name: String,
    },

    /// An object with the same name is already registered.
    #[error("instance already registered: {name}")]
    AlreadyRegistered {
        /// Conflicting name.
        name: String,
    },

    /// The object's pre-registration hook refused registration.
    #[error("registration of {name} vetoed: {reason}")]
    Vetoed {
        /// Name of the refused object.
        name: String,
        /// Reason given by the hook.
        reason: String,
    },

    /// The object has no attribute with the given name.
    #[error("attribute '{attribute}' not found on {name}")]
    AttributeNotFound {
        /// Object name.
        name: String,
        /// Missing attribute.
        attribute: String,
    },

    /// The attribute exists but cannot be written.
    #[error("attribute '{attribute}' on {name} is read-only")]
    AttributeNotWritable {
        /// Object name.
        name: String,
        /// Read-only attribute.
        attribute: String,
    },

    /// The object has no operation with the given name.
    #[error("operation '{operation}' not found on {name}")]
    OperationNotFound {
        /// Object name.
        name: String,
        /// Missing operation.
        operation: String,
    },

    /// The object itself reported a failure.
    #[error("{name}: {message}")]
    Object {
        /// Object name.
        name: String,
        /// Failure reported by the object.
        message: String,
    },

    /// Internal error (e.g., lock poisoned).
    #[error("internal registry error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl RegistryError {
    /// Creates an instance-not-found error.
    #[must_use]
    pub fn instance_not_found(name: impl ToString) -> Self {
        Self::InstanceNotFound {
            name: name.to_string(),
        }
    }

    /// Creates an attribute-not-found error.
    #[must_use]
    pub fn attribute_not_found(name: impl ToString, attribute: impl Into<String>) -> Self {
        Self::AttributeNotFound {
            name: name.to_string(),
            attribute: attribute.into(),
        }
    }

    /// Creates an attribute-not-writable error.
    #[must_use]
    pub fn attribute_not_writable(name: impl ToString, attribute: impl Into<String>) -> Self {
        Self::AttributeNotWritable {
            name: name.to_string(),
            attribute: attribute.into(),
        }
    }

    /// Creates an operation-not-found error.
    #[must_use]
    pub fn operation_not_found(name: impl ToString, operation: impl Into<String>) -> Self {
        Self::OperationNotFound {
            name: name.to_string(),
            operation: operation.into(),
        }
    }

    /// Creates an object failure.
    #[must_use]
    pub fn object(name: impl ToString, message: impl Into<String>) -> Self {
        Self::Object {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for [`RegistryError::InstanceNotFound`].
    #[must_use]
    pub fn is_instance_not_found(&self) -> bool {
        matches!(self, Self::InstanceNotFound { .. })
    }
}

/// Refusal raised by an object's lifecycle hooks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct HookError {
    reason: String,
}

impl HookError {
    /// Creates a hook error with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Reason given by the hook.
    #[must_use]
    pub fn reason(&self) -> &str {
        self.reason.as_str()
    }
}

/// Description of one attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    /// Value type, for example `string` or `number`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description.
    #[serde(rename = "desc")]
    pub description: String,
    /// Whether the attribute accepts writes.
    #[serde(rename = "rw")]
    pub writable: bool,
}

/// Description of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    /// Argument names in call order.
    pub args: Vec<String>,
    /// Return type.
    #[serde(rename = "ret")]
    pub returns: String,
    /// Human-readable description.
    #[serde(rename = "desc")]
    pub description: String,
}

/// Metadata describing an object, as reported by LIST.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Human-readable description.
    #[serde(rename = "desc")]
    pub description: String,
    /// Attributes keyed by name.
    #[serde(rename = "attr", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeInfo>,
    /// Operations keyed by name.
    #[serde(rename = "op", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub operations: BTreeMap<String, OperationInfo>,
}

/// An addressable entity exposing attributes and operations.
pub trait ManageableObject: Send + Sync {
    /// Name the object registers under.
    fn object_name(&self) -> ObjectName;

    /// Describes the object's attributes and operations.
    fn describe(&self) -> ObjectInfo;

    /// Reads an attribute.
    fn attribute(&self, attribute: &str) -> Result<Value, RegistryError>;

    /// Writes an attribute, returning the previous value.
    fn set_attribute(&self, attribute: &str, _value: Value) -> Result<Value, RegistryError> {
        Err(RegistryError::attribute_not_writable(
            self.object_name(),
            attribute,
        ))
    }

    /// Invokes an operation.
    fn invoke(&self, operation: &str, _arguments: &[Value]) -> Result<Value, RegistryError> {
        Err(RegistryError::operation_not_found(
            self.object_name(),
            operation,
        ))
    }

    /// Called before registration; an error vetoes it.
    fn pre_register(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Called before unregistration; an error keeps the object registered.
    fn pre_deregister(&self) -> Result<(), HookError> {
        Ok(())
    }
}

/// Registry mutation announced to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    /// An object was added.
    Registered(ObjectName),
    /// An object was removed.
    Unregistered(ObjectName),
}

/// Observer notified after each successful registry mutation.
pub trait RegistrationListener: Send + Sync {
    /// Invoked once per registration or unregistration.
    fn on_registration(&self, event: &RegistrationEvent);
}

/// A collection of manageable objects queryable by name pattern.
pub trait BackendRegistry: Send + Sync {
    /// Short label used in logs and diagnostics.
    fn label(&self) -> &str;

    /// Returns the names matching `pattern`, in name order.
    fn query_names(&self, pattern: &NamePattern) -> Result<Vec<ObjectName>, RegistryError>;

    /// Returns `true` when `name` is registered.
    fn is_registered(&self, name: &ObjectName) -> bool;

    /// Describes a registered object.
    fn describe(&self, name: &ObjectName) -> Result<ObjectInfo, RegistryError>;

    /// Reads an attribute of a registered object.
    fn attribute(&self, name: &ObjectName, attribute: &str) -> Result<Value, RegistryError>;

    /// Writes an attribute of a registered object, returning the old value.
    fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: &str,
        value: Value,
    ) -> Result<Value, RegistryError>;

    /// Invokes an operation on a registered object.
    fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        arguments: &[Value],
    ) -> Result<Value, RegistryError>;

    /// Registers an object, returning the name it was registered under.
    fn register(&self, object: Arc<dyn ManageableObject>) -> Result<ObjectName, RegistryError>;

    /// Removes a registered object.
    fn unregister(&self, name: &ObjectName) -> Result<(), RegistryError>;

    /// Subscribes a listener to registration events.
    fn subscribe(&self, listener: Arc<dyn RegistrationListener>);

    /// Removes a listener previously passed to
    /// [`subscribe`](Self::subscribe), compared by pointer identity.
    fn unsubscribe(&self, listener: &Arc<dyn RegistrationListener>);
}
