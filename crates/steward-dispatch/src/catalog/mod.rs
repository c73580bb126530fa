//! Lifecycle tracking for objects the gateway registers itself.
//!
//! The catalog records every object it registers so they can all be
//! removed again at shutdown. Teardown is best effort: every record is
//! attempted, failures are collected, and a single aggregate error names
//! each object that could not be removed.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::{TeardownError, TeardownFailure};
use crate::name::ObjectName;
use crate::registry::{BackendRegistry, ManageableObject};

const CATALOG_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::catalog");
const DESTROYED: &str = "catalog has already been destroyed";

/// Errors raised by [`ObjectCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The operation is not valid in the catalog's current state.
    #[error("illegal catalog state: {message}")]
    IllegalState {
        /// Description of the refused operation.
        message: String,
    },

    /// One or more objects could not be removed.
    #[error(transparent)]
    Teardown(#[from] TeardownError),
}

impl CatalogError {
    fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    fn registration_refused(name: &ObjectName, reason: impl std::fmt::Display) -> Self {
        Self::illegal_state(format!("could not register {name}: {reason}"))
    }
}

/// Lifecycle phase of an [`ObjectCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogState {
    /// Nothing has been registered yet.
    Empty,
    /// At least one registration has succeeded.
    Populated,
    /// Teardown is running or removed every record.
    Destroyed,
    /// Teardown finished with failures.
    Failed,
}

impl CatalogState {
    const fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed | Self::Failed)
    }
}

#[derive(Debug)]
struct Records {
    state: CatalogState,
    names: Vec<ObjectName>,
}

/// Registers objects into a registry and removes them all on teardown.
pub struct ObjectCatalog {
    registry: Arc<dyn BackendRegistry>,
    records: Mutex<Records>,
}

impl ObjectCatalog {
    /// Creates an empty catalog registering into `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn BackendRegistry>) -> Self {
        Self {
            registry,
            records: Mutex::new(Records {
                state: CatalogState::Empty,
                names: Vec::new(),
            }),
        }
    }

    /// Registers `object` and records it for later teardown.
    ///
    /// The record lock is not held while the registry runs the object's
    /// hooks or its listeners, so either may call back into the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::IllegalState`] when the object vetoes its
    /// registration, its name is already taken, or the catalog has already
    /// been torn down. Nothing is recorded on failure.
    pub fn register(&self, object: Arc<dyn ManageableObject>) -> Result<ObjectName, CatalogError> {
        let name = object.object_name();
        if self.lock()?.state.is_terminal() {
            return Err(CatalogError::registration_refused(&name, DESTROYED));
        }

        let registered = self
            .registry
            .register(object)
            .map_err(|error| CatalogError::registration_refused(&name, error))?;

        let mut records = self.lock()?;
        if records.state.is_terminal() {
            // Torn down while the registry was busy; undo so nothing leaks.
            drop(records);
            if let Err(error) = self.registry.unregister(&registered) {
                warn!(
                    target: CATALOG_TARGET,
                    object = %registered,
                    error = %error,
                    "failed to roll back late registration"
                );
            }
            return Err(CatalogError::registration_refused(&name, DESTROYED));
        }
        records.names.push(registered.clone());
        records.state = CatalogState::Populated;
        drop(records);

        debug!(target: CATALOG_TARGET, object = %registered, "catalogued");
        Ok(registered)
    }

    /// Removes every recorded object from the registry.
    ///
    /// Every record is attempted even when earlier ones fail. Objects
    /// already removed by someone else surface as
    /// [`crate::RegistryError::InstanceNotFound`] inside the aggregate.
    /// The catalog refuses new registrations from the moment teardown
    /// starts.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Teardown`] listing every object that could not
    /// be removed, or [`CatalogError::IllegalState`] when called twice.
    pub fn destroy(&self) -> Result<(), CatalogError> {
        let names = {
            let mut records = self.lock()?;
            if records.state.is_terminal() {
                return Err(CatalogError::illegal_state(DESTROYED));
            }
            records.state = CatalogState::Destroyed;
            std::mem::take(&mut records.names)
        };

        let mut failures = Vec::new();
        for name in names {
            if let Err(error) = self.registry.unregister(&name) {
                warn!(
                    target: CATALOG_TARGET,
                    object = %name,
                    error = %error,
                    "failed to unregister object"
                );
                failures.push(TeardownFailure::registry(name.to_string(), error));
            }
        }

        match TeardownError::from_failures(failures) {
            Some(error) => {
                self.lock()?.state = CatalogState::Failed;
                Err(CatalogError::Teardown(error))
            }
            None => Ok(()),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CatalogState {
        self.lock()
            .map_or(CatalogState::Failed, |records| records.state)
    }

    /// Number of outstanding records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |records| records.names.len())
    }

    /// Returns `true` when nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the outstanding records in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<ObjectName> {
        self.lock()
            .map(|records| records.names.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>, CatalogError> {
        self.records
            .lock()
            .map_err(|_| CatalogError::illegal_state("catalog lock poisoned"))
    }
}

impl std::fmt::Debug for ObjectCatalog {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ObjectCatalog")
            .field("registry", &self.registry.label())
            .field("state", &self.state())
            .field("records", &self.len())
            .finish()
    }
}
