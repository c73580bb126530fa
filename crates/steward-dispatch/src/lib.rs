//! Dispatch core for the Steward management gateway.
//!
//! A transport decodes a client message into a [`Request`] and hands it to
//! the [`Dispatcher`]. The dispatcher looks up the [`CommandHandler`] for the
//! request's [`CommandType`], consults the [`PolicySource`] and either
//! resolves the target to exactly one object or lets the handler work
//! across every registry at once.
//!
//! # Architecture
//!
//! - [`registry`] defines [`BackendRegistry`] and [`ManageableObject`], plus
//!   the in-process [`LocalRegistry`].
//! - [`RegistryExecutor`] fronts the registries, resolves name patterns and
//!   keeps the change generation used by conditional LIST requests.
//! - [`HandlerContext`] owns the fixed pipeline: policy first, then target
//!   location, then execution.
//! - [`ObjectCatalog`] tracks objects the gateway registers itself and
//!   removes them all at shutdown, reporting every failure together.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use steward_dispatch::{
//!     AllowAllPolicy, CommandType, Dispatcher, LocalRegistry, RegistryExecutor, Request,
//! };
//!
//! let registry = Arc::new(LocalRegistry::new("local"));
//! let executor = Arc::new(RegistryExecutor::new(vec![registry]));
//! let dispatcher = Dispatcher::builder(executor, Arc::new(AllowAllPolicy))
//!     .with_standard_handlers()
//!     .build()?;
//!
//! let version = dispatcher.dispatch(&Request::builder(CommandType::Version).build()?)?;
//! ```

pub mod catalog;
pub mod command;
pub mod dispatcher;
pub mod errors;
pub mod executor;
pub mod handler;
pub mod name;
pub mod policy;
pub mod registry;
pub mod request;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use self::catalog::{CatalogError, CatalogState, ObjectCatalog};
pub use self::command::{CommandType, TransportMethod};
pub use self::dispatcher::{Dispatcher, DispatcherBuilder, ShutdownReport};
pub use self::errors::{DispatchError, TeardownCause, TeardownError, TeardownFailure};
pub use self::executor::{ChangeGeneration, RegistryExecutor, Target};
pub use self::handler::{
    CommandHandler, ExecHandler, HandlerContext, ListHandler, ReadHandler, SearchHandler,
    VersionHandler, WriteHandler, check_for_modified_since,
};
pub use self::name::{NameError, NamePattern, ObjectName};
pub use self::policy::{AllowAllPolicy, ConfigPolicy, PolicyError, PolicySource};
pub use self::registry::{
    AttributeInfo, BackendRegistry, HookError, LocalRegistry, ManageableObject, ObjectInfo,
    OperationInfo, RegistrationEvent, RegistrationListener, RegistryError,
};
pub use self::request::{Request, RequestBuilder};
