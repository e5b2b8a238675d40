use std::{future::Future, sync::Arc};

use futures::FutureExt;

use crate::{
    component::{
        Component, CreateFn, DeclareFn, Dependencies, DestroyFn, DynComponent, ResultCell,
    },
    resolver::Resolved,
    types::{ComponentInfo, DynError, Injectable},
};

//////////////////////////////////////////////////////////////////////
///
/// Declaring a component consists of three parts.
/// 1. Its info and the dependencies whose values the create step receives
/// 2. Optionally a destroy step, run once the component is torn down
/// 3. The create step, which finishes the declaration
pub struct ComponentBuilder<T: Injectable> {
    info: ComponentInfo,
    dependencies: Vec<DynComponent>,
    declare: Option<Box<DeclareFn>>,
    destroy: Option<Arc<DestroyFn<T>>>,
}

impl<T: Injectable> ComponentBuilder<T> {
    pub fn new(info: ComponentInfo) -> Self {
        ComponentBuilder {
            info,
            dependencies: Vec::new(),
            declare: None,
            destroy: None,
        }
    }
}

impl<T: Injectable> ComponentBuilder<T> {
    /// Adds a dependency - its value is passed to the create step at the next position
    pub fn dependency(mut self, dependency: impl Into<DynComponent>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Declares the dependencies lazily
    ///
    /// `declare` runs at most once, the first time the graph is walked. This allows
    /// declarations to refer to each other through a [`Scope`](crate::container::Scope),
    /// which is also how cycles become possible, and detectable.
    /// Replaces dependencies added through [`ComponentBuilder::dependency`].
    pub fn dependencies_with<F>(mut self, declare: F) -> Self
    where
        F: Fn() -> Vec<DynComponent> + Send + Sync + 'static,
    {
        self.dependencies.clear();
        self.declare = Some(Box::new(declare));
        self
    }

    /// Step run on teardown with the created value
    pub fn destroy<F, Fut, E>(mut self, destroy: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<DynError>,
    {
        let destroy: Arc<DestroyFn<T>> = Arc::new(move |value| {
            destroy(value)
                .map(|result| result.map_err(Into::<DynError>::into))
                .boxed()
        });
        self.destroy = Some(destroy);
        self
    }

    /// Finishes the declaration with the step creating the value
    ///
    /// `create` receives the values of the declared dependencies in declared order.
    pub fn create<F, Fut, E>(self, create: F) -> Component<T>
    where
        F: Fn(Resolved) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<DynError>,
    {
        let create: Arc<CreateFn<T>> = Arc::new(move |resolved| {
            create(resolved)
                .map(|result| result.map_err(Into::<DynError>::into))
                .boxed()
        });

        let dependencies = match self.declare {
            Some(declare) => Dependencies::lazy(declare),
            None => Dependencies::eager(self.dependencies),
        };

        Component {
            info: self.info,
            dependencies: Arc::new(dependencies),
            ordering: Arc::from(Vec::new()),
            create,
            destroy: self.destroy,
            cell: Arc::new(ResultCell::new()),
            cached: false,
        }
    }
}
