//! Wrapp Lifecycle builds graphs of interdependent components, such as database
//! handles or servers, and drives them through their lifecycle.
//!
//! - Components declare their dependencies and a create step receiving the dependency values.
//! - [`Initializer`] validates the reachable graph for cycles, then creates every component
//!   exactly once, as soon as its dependencies are available. Independent branches run concurrently.
//! - [`Destroyer`] tears components down in reverse order - a component only after everything
//!   depending on it.
//! - [`Scope`] caches components per declaration site, giving singleton semantics to accessors.
//!
//! # Examples
//!
//! ```rust
//! use std::{convert::Infallible, sync::Arc};
//! use wrapp_lifecycle::{component_info, Component, Resolved};
//!
//! struct Database { url: String }
//! struct Server { db: Arc<Database> }
//!
//! let database = Component::builder(component_info!("database"))
//!     .create(|_: Resolved| async {
//!         Ok::<_, Infallible>(Database { url: "postgres://localhost".into() })
//!     });
//!
//! let server = Component::builder(component_info!("server"))
//!     .dependency(&database)
//!     .create(|deps: Resolved| async move {
//!         Ok::<_, wrapp_lifecycle::ResolveError>(Server { db: deps.get(0)? })
//!     });
//!
//! futures::executor::block_on(async {
//!     let server = server.init().await.unwrap();
//!     assert_eq!(server.db.url, "postgres://localhost");
//!     assert!(database.get_if_ready().is_some());
//! });
//! ```
//!
//! Wrapp Lifecycle consists of the following parts:
//!
//! 1. Component, Builder - for declaring components
//! 2. Dependency Graph - for walking graphs and rejecting cycles
//! 3. Initiator, Destroyer - for driving the lifecycle
//! 4. Container - for scope level caching of components
//! 5. Errors - for lifecycle errors

pub mod builder;
pub mod component;
pub mod container;
pub mod dependency_graph;
pub mod destroyer;
pub mod errors;
pub mod initiator;
pub mod resolver;
pub mod types;

pub use builder::ComponentBuilder;
pub use component::{AnyComponent, CellState, Component, DynComponent};
pub use container::{Scope, WeakScope};
pub use dependency_graph::{validate, DependencyGraph};
pub use destroyer::Destroyer;
pub use errors::{CycleError, DestroyError, DestroyErrors, InitError, ResolveError};
pub use initiator::Initializer;
pub use resolver::{Resolve, Resolved};
pub use types::{ComponentInfo, DynError, Injectable, Instance};
