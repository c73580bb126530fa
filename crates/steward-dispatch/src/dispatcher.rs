//! Request entry point and handler table.
//!
//! The [`Dispatcher`] owns one handler per [`CommandType`], the executor
//! fronting every registry and the policy context. Transports hand it parsed
//! [`Request`]s; it picks the handler, chooses single or aggregate mode from
//! the request's shape and runs the matching pipeline.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::{CatalogError, ObjectCatalog};
use crate::command::CommandType;
use crate::errors::{DispatchError, TeardownError, TeardownFailure};
use crate::executor::RegistryExecutor;
use crate::handler::{
    CommandHandler, ExecHandler, HandlerContext, ListHandler, ReadHandler, SearchHandler,
    VersionHandler, WriteHandler,
};
use crate::policy::PolicySource;
use crate::request::Request;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

type HandlerTable = [Option<Arc<dyn CommandHandler>>; CommandType::ALL.len()];

/// Routes requests to the handler installed for their command type.
pub struct Dispatcher {
    handlers: HandlerTable,
    installed: Vec<Arc<dyn CommandHandler>>,
    executor: Arc<RegistryExecutor>,
    context: HandlerContext,
    catalog: Option<Arc<ObjectCatalog>>,
    shut_down: AtomicBool,
}

impl Dispatcher {
    /// Starts building a dispatcher over `executor`, gated by `policy`.
    #[must_use]
    pub fn builder(
        executor: Arc<RegistryExecutor>,
        policy: Arc<dyn PolicySource>,
    ) -> DispatcherBuilder {
        DispatcherBuilder {
            executor,
            policy,
            handlers: Vec::new(),
            catalog: None,
        }
    }

    /// Executor fronting every registry.
    #[must_use]
    pub fn executor(&self) -> &RegistryExecutor {
        self.executor.as_ref()
    }

    /// Handler installed for `command`, if any.
    #[must_use]
    pub fn handler(&self, command: CommandType) -> Option<&dyn CommandHandler> {
        self.handlers
            .get(command.index())
            .and_then(Option::as_deref)
    }

    /// Dispatches `request`, mapping an empty aggregate result to
    /// [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownCommand`] when no handler serves the
    /// request's command type, or any failure raised by the pipeline.
    pub fn dispatch(&self, request: &Request) -> Result<Value, DispatchError> {
        self.dispatch_with_previous(request, None)
            .map(Option::unwrap_or_default)
    }

    /// Dispatches `request`, threading `previous` through aggregate handlers.
    ///
    /// Single-target requests ignore `previous` and always yield `Some`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownCommand`] when no handler serves the
    /// request's command type, or any failure raised by the pipeline.
    pub fn dispatch_with_previous(
        &self,
        request: &Request,
        previous: Option<Value>,
    ) -> Result<Option<Value>, DispatchError> {
        let command = request.command();
        let handler = self
            .handler(command)
            .ok_or(DispatchError::UnknownCommand { command })?;

        let aggregate = handler.handles_all_at_once(request);
        debug!(
            target: DISPATCH_TARGET,
            %command,
            object = ?request.target().map(ToString::to_string),
            aggregate,
            generation = self.executor.current_generation(),
            "dispatching request"
        );

        let result = if aggregate {
            self.context
                .handle_all(handler, &self.executor, request, previous)
        } else {
            self.context
                .handle_single(handler, &self.executor, request)
                .map(Some)
        };

        if let Err(error) = &result {
            if error.is_expected() {
                debug!(target: DISPATCH_TARGET, %command, %error, "request refused");
            } else {
                warn!(target: DISPATCH_TARGET, %command, %error, "dispatch failed");
            }
        }
        result
    }

    /// Releases every handler, then the catalog.
    ///
    /// Teardown never stops early: each failure is logged and collected in
    /// the returned report. Calls after the first return an empty report.
    #[must_use]
    pub fn shutdown(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!(target: DISPATCH_TARGET, "dispatcher already shut down");
            return report;
        }

        for handler in &self.installed {
            if let Err(error) = handler.destroy() {
                warn!(
                    target: DISPATCH_TARGET,
                    command = %handler.command_type(),
                    %error,
                    "handler teardown failed"
                );
                report.failures.extend(error.into_failures());
            }
        }

        if let Some(catalog) = &self.catalog {
            match catalog.destroy() {
                Ok(()) => {}
                Err(CatalogError::Teardown(error)) => {
                    warn!(target: DISPATCH_TARGET, %error, "catalog teardown failed");
                    report.failures.extend(error.into_failures());
                }
                Err(CatalogError::IllegalState { message }) => {
                    warn!(target: DISPATCH_TARGET, %message, "catalog teardown refused");
                    report
                        .failures
                        .push(TeardownFailure::release("object catalog", message));
                }
            }
        }

        debug!(
            target: DISPATCH_TARGET,
            failures = report.failures.len(),
            "dispatcher shut down"
        );
        report
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed: Vec<CommandType> = self
            .installed
            .iter()
            .map(|handler| handler.command_type())
            .collect();
        formatter
            .debug_struct("Dispatcher")
            .field("handlers", &installed)
            .field("executor", &self.executor)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    executor: Arc<RegistryExecutor>,
    policy: Arc<dyn PolicySource>,
    handlers: Vec<Arc<dyn CommandHandler>>,
    catalog: Option<Arc<ObjectCatalog>>,
}

impl DispatcherBuilder {
    /// Installs a handler.
    #[must_use]
    pub fn handler(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Installs a shared handler.
    #[must_use]
    pub fn shared_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Installs the READ, WRITE, EXEC, LIST, SEARCH and VERSION handlers.
    #[must_use]
    pub fn with_standard_handlers(self) -> Self {
        self.handler(ReadHandler)
            .handler(WriteHandler)
            .handler(ExecHandler)
            .handler(ListHandler)
            .handler(SearchHandler)
            .handler(VersionHandler)
    }

    /// Attaches a catalog torn down after the handlers on shutdown.
    #[must_use]
    pub fn catalog(mut self, catalog: Arc<ObjectCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Builds the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateHandler`] when two handlers serve
    /// the same command type.
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        let mut handlers: HandlerTable = std::array::from_fn(|_| None);
        for handler in &self.handlers {
            let command = handler.command_type();
            let slot = handlers
                .get_mut(command.index())
                .ok_or(DispatchError::UnknownCommand { command })?;
            if slot.is_some() {
                return Err(DispatchError::DuplicateHandler { command });
            }
            *slot = Some(Arc::clone(handler));
        }

        Ok(Dispatcher {
            handlers,
            installed: self.handlers,
            executor: self.executor,
            context: HandlerContext::new(self.policy),
            catalog: self.catalog,
            shut_down: AtomicBool::new(false),
        })
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DispatcherBuilder")
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

/// Outcome of [`Dispatcher::shutdown`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    failures: Vec<TeardownFailure>,
}

impl ShutdownReport {
    /// Returns `true` when every resource was released.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures in the order they occurred.
    #[must_use]
    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    /// Converts the report into an aggregate error, if anything failed.
    #[must_use]
    pub fn into_error(self) -> Option<TeardownError> {
        TeardownError::from_failures(self.failures)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::policy::{AllowAllPolicy, ConfigPolicy};
    use crate::registry::{BackendRegistry, LocalRegistry};
    use crate::tests::support::{RecordingHandler, SilentHandler, TestObject, name};

    struct Setup {
        registry: Arc<LocalRegistry>,
        executor: Arc<RegistryExecutor>,
    }

    #[fixture]
    fn setup() -> Setup {
        let registry = Arc::new(LocalRegistry::new("local"));
        let executor = Arc::new(RegistryExecutor::new(vec![
            registry.clone() as Arc<dyn BackendRegistry>
        ]));
        Setup { registry, executor }
    }

    #[rstest]
    fn unknown_command_without_handler(setup: Setup) {
        let dispatcher = Dispatcher::builder(setup.executor, Arc::new(AllowAllPolicy))
            .handler(ListHandler)
            .build()
            .expect("dispatcher");
        let request = Request::builder(CommandType::Search)
            .target("*:*")
            .build()
            .expect("request");

        let error = dispatcher.dispatch(&request).expect_err("no handler");
        assert!(matches!(
            error,
            DispatchError::UnknownCommand {
                command: CommandType::Search
            }
        ));
    }

    #[rstest]
    fn duplicate_handlers_are_rejected(setup: Setup) {
        let error = Dispatcher::builder(setup.executor, Arc::new(AllowAllPolicy))
            .handler(ReadHandler)
            .handler(RecordingHandler::single(CommandType::Read))
            .build()
            .expect_err("duplicate");
        assert!(matches!(
            error,
            DispatchError::DuplicateHandler {
                command: CommandType::Read
            }
        ));
    }

    #[rstest]
    fn routes_by_request_shape(setup: Setup) {
        setup
            .registry
            .register(TestObject::new("app:type=Cache").with_attribute("Size", json!(4)).shared())
            .expect("register");
        let dispatcher = Dispatcher::builder(setup.executor, Arc::new(AllowAllPolicy))
            .with_standard_handlers()
            .build()
            .expect("dispatcher");

        let exact = Request::builder(CommandType::Read)
            .target("app:type=Cache")
            .attribute("Size")
            .build()
            .expect("request");
        assert_eq!(dispatcher.dispatch(&exact).expect("read"), json!(4));

        let wildcard = Request::builder(CommandType::Read)
            .target("app:*")
            .attribute("Size")
            .build()
            .expect("request");
        assert_eq!(
            dispatcher.dispatch(&wildcard).expect("read"),
            json!({ "app:type=Cache": 4 })
        );
    }

    #[rstest]
    fn empty_aggregate_result_becomes_null(setup: Setup) {
        let handler = Arc::new(RecordingHandler::aggregate(CommandType::Version));
        let dispatcher = Dispatcher::builder(setup.executor, Arc::new(AllowAllPolicy))
            .shared_handler(handler.clone())
            .build()
            .expect("dispatcher");
        let request = Request::builder(CommandType::Version).build().expect("request");

        assert_eq!(
            dispatcher
                .dispatch_with_previous(&request, Some(json!(2)))
                .expect("dispatch"),
            Some(json!(3))
        );
        assert_eq!(handler.calls().len(), 1);

        let bare = Dispatcher::builder(
            Arc::new(RegistryExecutor::new(Vec::new())),
            Arc::new(AllowAllPolicy),
        )
        .handler(SilentHandler)
        .build()
        .expect("dispatcher");
        assert_eq!(bare.dispatch(&request).expect("dispatch"), Value::Null);
    }

    #[rstest]
    fn policy_violations_surface_unchanged(setup: Setup) {
        let dispatcher = Dispatcher::builder(
            setup.executor,
            Arc::new(ConfigPolicy::default().deny_type(CommandType::Write)),
        )
        .with_standard_handlers()
        .build()
        .expect("dispatcher");
        let request = Request::builder(CommandType::Write)
            .target("app:type=Cache")
            .attribute("Size")
            .value(json!(1))
            .build()
            .expect("request");

        let error = dispatcher.dispatch(&request).expect_err("denied");
        assert!(error.is_policy_violation());
    }

    #[rstest]
    fn shutdown_collects_every_failure(setup: Setup) {
        let catalog = Arc::new(ObjectCatalog::new(setup.registry.clone()));
        let stuck = catalog
            .register(TestObject::new("app:type=Stuck").failing_deregistration("busy").shared())
            .expect("register");
        catalog
            .register(TestObject::new("app:type=Free").shared())
            .expect("register");

        let failing = Arc::new(
            RecordingHandler::aggregate(CommandType::List).failing_teardown("cache open"),
        );
        let clean = Arc::new(RecordingHandler::single(CommandType::Read));
        let dispatcher = Dispatcher::builder(setup.executor, Arc::new(AllowAllPolicy))
            .shared_handler(failing.clone())
            .shared_handler(clean.clone())
            .catalog(catalog.clone())
            .build()
            .expect("dispatcher");

        let report = dispatcher.shutdown();
        assert!(!report.is_clean());
        let subjects: Vec<&str> = report
            .failures()
            .iter()
            .map(|failure| failure.subject.as_str())
            .collect();
        assert_eq!(subjects, vec!["handler list", stuck.as_str()]);
        assert_eq!(clean.calls(), vec![String::from("destroy")]);
        assert!(!setup.registry.is_registered(&name("app:type=Free")));

        assert!(dispatcher.shutdown().is_clean());
        assert_eq!(failing.calls().len(), 1);
    }
}
