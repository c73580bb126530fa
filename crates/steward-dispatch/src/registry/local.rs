//! In-process backend registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::debug;

use super::{
    BackendRegistry, ManageableObject, ObjectInfo, RegistrationEvent, RegistrationListener,
    RegistryError,
};
use crate::name::{NamePattern, ObjectName};

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

type ObjectMap = BTreeMap<ObjectName, Arc<dyn ManageableObject>>;

/// Thread-safe registry holding objects in the current process.
///
/// Objects are kept in name order. Listeners are notified after the object
/// map has been updated and its lock released, so a listener may query the
/// registry without deadlocking.
pub struct LocalRegistry {
    label: String,
    objects: RwLock<ObjectMap>,
    listeners: RwLock<Vec<Arc<dyn RegistrationListener>>>,
}

impl LocalRegistry {
    /// Creates an empty registry with the given label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            objects: RwLock::new(BTreeMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Number of registered objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_objects().map_or(0, |objects| objects.len())
    }

    /// Returns `true` when no objects are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of subscribed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        match self.listeners.read() {
            Ok(listeners) => listeners.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn read_objects(&self) -> Result<RwLockReadGuard<'_, ObjectMap>, RegistryError> {
        self.objects
            .read()
            .map_err(|_| RegistryError::internal("registry lock poisoned"))
    }

    fn write_objects(&self) -> Result<RwLockWriteGuard<'_, ObjectMap>, RegistryError> {
        self.objects
            .write()
            .map_err(|_| RegistryError::internal("registry lock poisoned"))
    }

    fn object(&self, name: &ObjectName) -> Result<Arc<dyn ManageableObject>, RegistryError> {
        self.read_objects()?
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::instance_not_found(name))
    }

    fn notify(&self, event: &RegistrationEvent) {
        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for listener in listeners {
            listener.on_registration(event);
        }
    }
}

impl fmt::Debug for LocalRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LocalRegistry")
            .field("label", &self.label)
            .field("objects", &self.len())
            .finish_non_exhaustive()
    }
}

impl BackendRegistry for LocalRegistry {
    fn label(&self) -> &str {
        self.label.as_str()
    }

    fn query_names(&self, pattern: &NamePattern) -> Result<Vec<ObjectName>, RegistryError> {
        let objects = self.read_objects()?;
        if let Some(exact) = pattern.as_exact() {
            return Ok(objects.contains_key(&exact).then_some(exact).into_iter().collect());
        }
        Ok(objects
            .keys()
            .filter(|name| pattern.matches(name))
            .cloned()
            .collect())
    }

    fn is_registered(&self, name: &ObjectName) -> bool {
        self.read_objects()
            .is_ok_and(|objects| objects.contains_key(name))
    }

    fn describe(&self, name: &ObjectName) -> Result<ObjectInfo, RegistryError> {
        Ok(self.object(name)?.describe())
    }

    fn attribute(&self, name: &ObjectName, attribute: &str) -> Result<Value, RegistryError> {
        self.object(name)?.attribute(attribute)
    }

    fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: &str,
        value: Value,
    ) -> Result<Value, RegistryError> {
        self.object(name)?.set_attribute(attribute, value)
    }

    fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        arguments: &[Value],
    ) -> Result<Value, RegistryError> {
        self.object(name)?.invoke(operation, arguments)
    }

    fn register(&self, object: Arc<dyn ManageableObject>) -> Result<ObjectName, RegistryError> {
        let name = object.object_name();
        if self.read_objects()?.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered {
                name: name.to_string(),
            });
        }
        object
            .pre_register()
            .map_err(|error| RegistryError::Vetoed {
                name: name.to_string(),
                reason: error.reason().to_owned(),
            })?;

        {
            let mut objects = self.write_objects()?;
            // Checked again: another caller may have won the race since.
            if objects.contains_key(&name) {
                return Err(RegistryError::AlreadyRegistered {
                    name: name.to_string(),
                });
            }
            objects.insert(name.clone(), object);
        }

        debug!(target: REGISTRY_TARGET, registry = %self.label, object = %name, "registered");
        self.notify(&RegistrationEvent::Registered(name.clone()));
        Ok(name)
    }

    fn unregister(&self, name: &ObjectName) -> Result<(), RegistryError> {
        let object = self.object(name)?;
        object
            .pre_deregister()
            .map_err(|error| RegistryError::object(name, error.reason()))?;

        if self.write_objects()?.remove(name).is_none() {
            // Removed concurrently between the lookup and the write lock.
            return Err(RegistryError::instance_not_found(name));
        }

        debug!(target: REGISTRY_TARGET, registry = %self.label, object = %name, "unregistered");
        self.notify(&RegistrationEvent::Unregistered(name.clone()));
        Ok(())
    }

    fn subscribe(&self, listener: Arc<dyn RegistrationListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    fn unsubscribe(&self, listener: &Arc<dyn RegistrationListener>) {
        let mut listeners = match self.listeners.write() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::tests::support::TestObject;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<RegistrationEvent>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<RegistrationEvent> {
            self.events.lock().expect("listener mutex poisoned").clone()
        }
    }

    impl RegistrationListener for RecordingListener {
        fn on_registration(&self, event: &RegistrationEvent) {
            self.events
                .lock()
                .expect("listener mutex poisoned")
                .push(event.clone());
        }
    }

    fn name(text: &str) -> ObjectName {
        ObjectName::parse(text).expect("object name")
    }

    #[fixture]
    fn registry() -> LocalRegistry {
        let registry = LocalRegistry::new("local");
        registry
            .register(TestObject::new("app:type=Cache").with_attribute("Size", json!(3)).shared())
            .expect("register cache");
        registry
            .register(TestObject::new("app:type=Pool").shared())
            .expect("register pool");
        registry
            .register(TestObject::new("sys:type=Clock").shared())
            .expect("register clock");
        registry
    }

    #[rstest]
    fn queries_in_name_order(registry: LocalRegistry) {
        let pattern = NamePattern::parse("app:*").expect("pattern");
        let names = registry.query_names(&pattern).expect("query");
        assert_eq!(names, vec![name("app:type=Cache"), name("app:type=Pool")]);
    }

    #[rstest]
    fn exact_query_returns_at_most_one(registry: LocalRegistry) {
        let hit = NamePattern::parse("sys:type=Clock").expect("pattern");
        let miss = NamePattern::parse("sys:type=Calendar").expect("pattern");
        assert_eq!(registry.query_names(&hit).expect("query").len(), 1);
        assert!(registry.query_names(&miss).expect("query").is_empty());
    }

    #[rstest]
    fn reads_attributes_through_the_registry(registry: LocalRegistry) {
        let value = registry
            .attribute(&name("app:type=Cache"), "Size")
            .expect("read attribute");
        assert_eq!(value, json!(3));

        let missing = registry.attribute(&name("app:type=Cache"), "Nope");
        assert!(matches!(missing, Err(RegistryError::AttributeNotFound { .. })));
    }

    #[rstest]
    fn rejects_duplicate_registration(registry: LocalRegistry) {
        let error = registry
            .register(TestObject::new("app:type=Pool").shared())
            .expect_err("duplicate");
        assert!(matches!(error, RegistryError::AlreadyRegistered { .. }));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn veto_prevents_registration() {
        let registry = LocalRegistry::new("local");
        let error = registry
            .register(TestObject::new("app:type=Vetoed").vetoing("not today").shared())
            .expect_err("veto");
        assert_eq!(
            error,
            RegistryError::Vetoed {
                name: String::from("app:type=Vetoed"),
                reason: String::from("not today"),
            }
        );
        assert!(registry.is_empty());
    }

    #[rstest]
    fn unregister_of_missing_object_is_instance_not_found(registry: LocalRegistry) {
        let error = registry
            .unregister(&name("app:type=Gone"))
            .expect_err("missing");
        assert!(error.is_instance_not_found());
    }

    #[rstest]
    fn failing_deregistration_hook_keeps_object(registry: LocalRegistry) {
        let stuck = name("app:type=Stuck");
        registry
            .register(TestObject::new("app:type=Stuck").failing_deregistration("busy").shared())
            .expect("register");
        let error = registry.unregister(&stuck).expect_err("hook failure");
        assert!(matches!(error, RegistryError::Object { ref message, .. } if message == "busy"));
        assert!(registry.is_registered(&stuck));
    }

    #[test]
    fn notifies_listeners_of_each_mutation() {
        let registry = LocalRegistry::new("local");
        let listener = Arc::new(RecordingListener::default());
        registry.subscribe(listener.clone());

        let cache = registry
            .register(TestObject::new("app:type=Cache").shared())
            .expect("register");
        registry
            .register(TestObject::new("app:type=Cache").shared())
            .expect_err("duplicate");
        registry.unregister(&cache).expect("unregister");

        assert_eq!(
            listener.events(),
            vec![
                RegistrationEvent::Registered(cache.clone()),
                RegistrationEvent::Unregistered(cache),
            ]
        );
    }

    #[rstest]
    fn duplicate_is_rejected_before_the_veto_hook(registry: LocalRegistry) {
        let error = registry
            .register(TestObject::new("app:type=Pool").vetoing("never asked").shared())
            .expect_err("duplicate");
        assert!(
            matches!(error, RegistryError::AlreadyRegistered { .. }),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn unsubscribed_listeners_hear_nothing() {
        let registry = LocalRegistry::new("local");
        let listener = Arc::new(RecordingListener::default());
        let subscribed: Arc<dyn RegistrationListener> = listener.clone();
        registry.subscribe(Arc::clone(&subscribed));
        assert_eq!(registry.listener_count(), 1);

        registry.unsubscribe(&subscribed);
        registry
            .register(TestObject::new("app:type=Cache").shared())
            .expect("register");

        assert_eq!(registry.listener_count(), 0);
        assert!(listener.events().is_empty());
    }
}
