//! Multi-registry executor and change tracking.
//!
//! The executor fronts every configured [`BackendRegistry`]. It resolves
//! patterns to targets, iterates matches for aggregate commands and keeps a
//! monotonically increasing change generation that conditional requests
//! compare against.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::errors::DispatchError;
use crate::name::{NamePattern, ObjectName};
use crate::registry::{BackendRegistry, RegistrationEvent, RegistrationListener, RegistryError};

const EXECUTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::executor");

/// Monotonic counter of registry mutations.
///
/// Subscribed to every registry the executor fronts; each registration or
/// unregistration advances it by one.
#[derive(Debug, Default)]
pub struct ChangeGeneration {
    value: AtomicU64,
}

impl ChangeGeneration {
    /// Current generation.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Advances the generation, returning the new value.
    pub fn advance(&self) -> u64 {
        self.value.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }
}

impl RegistrationListener for ChangeGeneration {
    fn on_registration(&self, event: &RegistrationEvent) {
        let generation = self.advance();
        trace!(target: EXECUTOR_TARGET, ?event, generation, "registry mutated");
    }
}

/// A single object located in a specific registry.
#[derive(Clone)]
pub struct Target {
    registry: Arc<dyn BackendRegistry>,
    name: ObjectName,
}

impl Target {
    /// Registry holding the object.
    #[must_use]
    pub fn registry(&self) -> &dyn BackendRegistry {
        self.registry.as_ref()
    }

    /// Name of the object.
    #[must_use]
    pub const fn name(&self) -> &ObjectName {
        &self.name
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Target")
            .field("registry", &self.registry.label())
            .field("name", &self.name)
            .finish()
    }
}

/// Executes requests across one or more registries.
///
/// Dropping the executor unsubscribes its change listener from every
/// registry.
pub struct RegistryExecutor {
    registries: Vec<Arc<dyn BackendRegistry>>,
    generation: Arc<ChangeGeneration>,
    listener: Arc<dyn RegistrationListener>,
}

impl RegistryExecutor {
    /// Creates an executor over `registries`, kept in the given order.
    ///
    /// A registry supplied more than once is kept only at its first
    /// position. A change listener is subscribed to each registry so that
    /// every registration and unregistration advances the generation.
    #[must_use]
    pub fn new(registries: Vec<Arc<dyn BackendRegistry>>) -> Self {
        let mut unique: Vec<Arc<dyn BackendRegistry>> = Vec::with_capacity(registries.len());
        for registry in registries {
            if unique.iter().any(|seen| Arc::ptr_eq(seen, &registry)) {
                debug!(
                    target: EXECUTOR_TARGET,
                    registry = registry.label(),
                    "ignoring repeated registry"
                );
                continue;
            }
            unique.push(registry);
        }

        let generation = Arc::new(ChangeGeneration::default());
        let listener: Arc<dyn RegistrationListener> = generation.clone();
        for registry in &unique {
            registry.subscribe(Arc::clone(&listener));
        }
        Self {
            registries: unique,
            generation,
            listener,
        }
    }

    /// Registries in the order they were supplied.
    #[must_use]
    pub fn registries(&self) -> &[Arc<dyn BackendRegistry>] {
        &self.registries
    }

    /// Resolves `pattern` to exactly one object across all registries.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] when nothing matches,
    /// [`DispatchError::AmbiguousTarget`] when more than one object matches
    /// and [`DispatchError::Registry`] when a registry query fails.
    pub fn locate_exactly_one(&self, pattern: &NamePattern) -> Result<Target, DispatchError> {
        let mut found = Vec::new();
        for registry in &self.registries {
            for name in registry.query_names(pattern)? {
                found.push(Target {
                    registry: Arc::clone(registry),
                    name,
                });
            }
        }

        match found.len() {
            0 => Err(DispatchError::not_found(pattern)),
            1 => found
                .pop()
                .ok_or_else(|| DispatchError::not_found(pattern)),
            _ => Err(DispatchError::AmbiguousTarget {
                pattern: pattern.to_string(),
                matches: found
                    .iter()
                    .map(|target| format!("{}/{}", target.registry.label(), target.name))
                    .collect(),
            }),
        }
    }

    /// Calls `callback` for every object matching `pattern`.
    ///
    /// Registries are visited in order and names within a registry in name
    /// order. Iteration stops at the first failure, which is returned.
    ///
    /// # Errors
    ///
    /// Propagates registry query failures and the first callback error.
    pub fn for_each_matching<E, F>(&self, pattern: &NamePattern, mut callback: F) -> Result<(), E>
    where
        E: From<RegistryError>,
        F: FnMut(&dyn BackendRegistry, &ObjectName) -> Result<(), E>,
    {
        for registry in &self.registries {
            for name in registry.query_names(pattern)? {
                callback(registry.as_ref(), &name)?;
            }
        }
        Ok(())
    }

    /// Names matching `pattern` across all registries, sorted and
    /// de-duplicated.
    ///
    /// # Errors
    ///
    /// Returns the first registry query failure.
    pub fn query_names(&self, pattern: &NamePattern) -> Result<Vec<ObjectName>, RegistryError> {
        let mut names = Vec::new();
        for registry in &self.registries {
            names.extend(registry.query_names(pattern)?);
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Returns `true` when the generation has advanced strictly past
    /// `token`.
    #[must_use]
    pub fn changed_since(&self, token: u64) -> bool {
        self.generation.current() > token
    }

    /// Current change generation.
    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generation.current()
    }

    /// Records a mutation observed outside registry notifications.
    pub fn record_mutation(&self) -> u64 {
        self.generation.advance()
    }
}

impl Drop for RegistryExecutor {
    fn drop(&mut self) {
        for registry in &self.registries {
            registry.unsubscribe(&self.listener);
        }
    }
}

impl fmt::Debug for RegistryExecutor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self
            .registries
            .iter()
            .map(|registry| registry.label())
            .collect();
        formatter
            .debug_struct("RegistryExecutor")
            .field("registries", &labels)
            .field("generation", &self.current_generation())
            .finish_non_exhaustive()
    }
}
