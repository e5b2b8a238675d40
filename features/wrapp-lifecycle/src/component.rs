//! Component nodes and their shared result cells.
//!
//! A [`Component<T>`] is a cheap, clonable handle. All clones, and every wrapper
//! a [`Scope`](crate::container::Scope) hands out for the same declaration, point at one
//! [`ResultCell`]; that cell is what makes two handles the same component.
//!
//! The cell goes `empty -> pending -> settled`. Only the caller winning the
//! `empty -> pending` compare-and-swap installs the creation future, every other
//! caller awaits that same shared future, so a create step runs at most once per fill.
//! A creation future is only ever installed once all dependencies have settled; it
//! carries their results and never polls another component's future.
//! A successful value is cleared again by [`Destroyer`](crate::destroyer::Destroyer).

use std::{
    future::Future,
    sync::{Arc, OnceLock},
};

use arc_swap::ArcSwapOption;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};

use crate::{
    builder::ComponentBuilder,
    destroyer::Destroyer,
    errors::{DestroyError, DestroyErrors, InitError},
    initiator::Initializer,
    resolver::Resolved,
    types::{CellId, ComponentInfo, DynError, Injectable, Instance},
};

pub(crate) type CreateFn<T> =
    dyn Fn(Resolved) -> BoxFuture<'static, Result<T, DynError>> + Send + Sync;
pub(crate) type DestroyFn<T> =
    dyn Fn(Arc<T>) -> BoxFuture<'static, Result<(), DynError>> + Send + Sync;
pub(crate) type DeclareFn = dyn Fn() -> Vec<DynComponent> + Send + Sync;

type InitFuture<T> = Shared<BoxFuture<'static, Result<Arc<T>, InitError>>>;

/// Type erased component, used wherever heterogeneous components meet
pub type DynComponent = Arc<dyn AnyComponent>;

/// Observable state of a result cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Never initialized, or destroyed since
    Empty,
    /// Creation is in flight
    Pending,
    /// Created successfully
    Ready,
    /// Creation failed - the failure stays cached
    Failed,
}

/// Shared slot holding the deferred result of a component
pub(crate) struct ResultCell<T> {
    slot: ArcSwapOption<InitFuture<T>>,
}

impl<T: Injectable> ResultCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
        }
    }

    fn state(&self) -> CellState {
        match self.slot.load().as_deref().map(Shared::peek) {
            None => CellState::Empty,
            Some(None) => CellState::Pending,
            Some(Some(Ok(_))) => CellState::Ready,
            Some(Some(Err(_))) => CellState::Failed,
        }
    }

    fn ready(&self) -> Option<Arc<T>> {
        match self.slot.load().as_deref().and_then(Shared::peek) {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the pending or settled future, installing `start()` if the cell is empty
    fn get_or_start(
        &self,
        info: &ComponentInfo,
        start: impl FnOnce() -> InitFuture<T>,
    ) -> InitFuture<T> {
        let current = self.slot.load();
        if let Some(existing) = current.as_deref() {
            return existing.clone();
        }

        // Futures are lazy - losing the race below drops `pending` before it ever ran
        let pending = start();
        let previous = self
            .slot
            .compare_and_swap(&current, Some(Arc::new(pending.clone())));

        match (*previous).as_deref() {
            None => {
                tracing::trace!("'{info}' claimed its result cell");
                pending
            }
            Some(winner) => {
                tracing::trace!("'{info}' joined an in-flight initialization");
                winner.clone()
            }
        }
    }

    /// Clears a successfully settled cell, returning the value it held
    ///
    /// Empty, pending and failed cells are left alone.
    fn take_ready(&self) -> Option<Arc<T>> {
        let current: Option<Arc<InitFuture<T>>> = self.slot.load_full();
        let settled = current.as_ref()?;
        let value = match settled.peek() {
            Some(Ok(value)) => value.clone(),
            _ => return None,
        };

        let previous = self
            .slot
            .compare_and_swap(&current, None::<Arc<InitFuture<T>>>);
        match &*previous {
            Some(observed) if Arc::ptr_eq(observed, settled) => Some(value),
            // Someone else cleared or refilled the cell in between
            _ => None,
        }
    }
}

/// Lazily declared dependency list, evaluated at most once
pub(crate) struct Dependencies {
    declared: OnceLock<Vec<DynComponent>>,
    declare: Option<Box<DeclareFn>>,
}

impl Dependencies {
    pub(crate) fn eager(dependencies: Vec<DynComponent>) -> Self {
        Self {
            declared: OnceLock::from(dependencies),
            declare: None,
        }
    }

    pub(crate) fn lazy(declare: Box<DeclareFn>) -> Self {
        Self {
            declared: OnceLock::new(),
            declare: Some(declare),
        }
    }

    fn get(&self) -> &[DynComponent] {
        self.declared
            .get_or_init(|| self.declare.as_ref().map(|declare| declare()).unwrap_or_default())
    }
}

/// A lazily created, possibly stateful value with declared dependencies
///
/// Build one with [`ComponentBuilder`], initialize it with [`Component::init`] and tear it
/// down with [`Component::destroy`].
pub struct Component<T: Injectable> {
    pub(crate) info: ComponentInfo,
    pub(crate) dependencies: Arc<Dependencies>,
    /// Ordering-only dependencies added through [`Component::depends_on`]
    pub(crate) ordering: Arc<[DynComponent]>,
    pub(crate) create: Arc<CreateFn<T>>,
    pub(crate) destroy: Option<Arc<DestroyFn<T>>>,
    pub(crate) cell: Arc<ResultCell<T>>,
    pub(crate) cached: bool,
}

impl<T: Injectable> Clone for Component<T> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            dependencies: self.dependencies.clone(),
            ordering: self.ordering.clone(),
            create: self.create.clone(),
            destroy: self.destroy.clone(),
            cell: self.cell.clone(),
            cached: self.cached,
        }
    }
}

impl<T: Injectable> std::fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("info", &self.info)
            .field("state", &self.state())
            .field("cached", &self.cached)
            .finish()
    }
}

impl<T: Injectable> Component<T> {
    /// Starts declaring a component
    pub fn builder(info: ComponentInfo) -> ComponentBuilder<T> {
        ComponentBuilder::new(info)
    }

    pub fn info(&self) -> &ComponentInfo {
        &self.info
    }

    /// Whether the result cell is owned by a [`Scope`](crate::container::Scope)
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn cell_id(&self) -> CellId {
        CellId::of(&self.cell)
    }

    pub fn state(&self) -> CellState {
        self.cell.state()
    }

    /// The value, if the component has been created successfully and not destroyed since
    pub fn get_if_ready(&self) -> Option<Arc<T>> {
        self.cell.ready()
    }

    /// All dependencies - declared ones first, then ordering-only ones
    pub fn dependencies(&self) -> Vec<DynComponent> {
        self.dependencies
            .get()
            .iter()
            .chain(self.ordering.iter())
            .cloned()
            .collect()
    }

    /// Same component with extra dependencies that must be initialized first
    ///
    /// The extra components only order initialization and teardown; their values are
    /// not passed to the create step.
    pub fn depends_on<I, D>(&self, extra: I) -> Component<T>
    where
        I: IntoIterator<Item = D>,
        D: Into<DynComponent>,
    {
        let ordering = self
            .ordering
            .iter()
            .cloned()
            .chain(extra.into_iter().map(Into::into))
            .collect();

        Component {
            ordering,
            ..self.clone()
        }
    }

    /// Type erased handle to this component
    pub fn erase(&self) -> DynComponent {
        Arc::new(self.clone())
    }

    /// Validates the graph and initializes this component and everything it depends on
    ///
    /// Returns the cached value if the component is already initialized.
    pub async fn init(&self) -> Result<Arc<T>, InitError> {
        let mut values = Initializer::new().init(&[self.erase()]).await?;
        match values.pop().map(|instance| instance.downcast::<T>()) {
            Some(Ok(value)) => Ok(value),
            _ => unreachable!("a root settles to a value of its own type"),
        }
    }

    /// Tears down this component after everything depending on it inside its own graph
    pub async fn destroy(&self) -> Result<(), DestroyErrors> {
        Destroyer::new().destroy_all(&[self.erase()]).await
    }

    /// Joins or starts the creation of this component
    ///
    /// `settled` holds the results of [`Component::dependencies`], in the same order.
    /// Callers only get here once every dependency has settled, so the creation future
    /// never waits on another component and polling it never recurses through the graph.
    pub(crate) fn initialize(&self, settled: Vec<Result<Instance, InitError>>) -> InitFuture<T> {
        self.cell.get_or_start(&self.info, || {
            let info = self.info.clone();
            let declared = self.dependencies.get().len();
            let create = self.create.clone();

            async move {
                tracing::debug!("Initializing '{info}' after {} dependencies", settled.len());

                let mut values = Vec::with_capacity(declared);
                for result in settled {
                    match result {
                        Ok(instance) => values.push(instance),
                        Err(error) => {
                            tracing::warn!("'{info}' not created, a dependency failed: {error}");
                            return Err(InitError::dependency_failed(info, error));
                        }
                    }
                }
                // Ordering-only dependencies are not handed to the create step
                values.truncate(declared);

                match create(Resolved::new(values)).await {
                    Ok(value) => {
                        tracing::debug!("Constructed '{info}'");
                        Ok(Arc::new(value))
                    }
                    Err(error) => {
                        tracing::error!("Create step of '{info}' failed - error: {error}");
                        Err(InitError::create_failed(info, error))
                    }
                }
            }
            .boxed()
            .shared()
        })
    }

    fn teardown(&self) -> impl Future<Output = Result<(), DestroyError>> + Send + 'static {
        let taken = self.cell.take_ready();
        let destroy = self.destroy.clone();
        let info = self.info.clone();

        async move {
            let Some(value) = taken else {
                tracing::trace!("'{info}' holds no value, nothing to destroy");
                return Ok(());
            };

            tracing::debug!("Destroying '{info}'");
            if let Some(destroy) = destroy {
                if let Err(error) = destroy(value).await {
                    tracing::error!("Destroy step of '{info}' failed - error: {error}");
                    return Err(DestroyError::Failed {
                        info,
                        source: Arc::from(error),
                    });
                }
            }

            Ok(())
        }
    }
}

/// Object safe view on a [`Component`], regardless of the value it produces
pub trait AnyComponent: Send + Sync {
    fn info(&self) -> &ComponentInfo;

    /// Identity of the result cell
    fn cell_id(&self) -> CellId;

    fn is_cached(&self) -> bool;

    fn state(&self) -> CellState;

    /// Declared dependencies followed by ordering-only dependencies
    fn dependencies(&self) -> Vec<DynComponent>;

    /// Joins or starts creation, given the settled results of [`AnyComponent::dependencies`]
    fn init_instance(
        &self,
        settled: Vec<Result<Instance, InitError>>,
    ) -> BoxFuture<'static, Result<Instance, InitError>>;

    /// Clears the result cell and runs the destroy step, if the component is ready
    fn destroy_instance(&self) -> BoxFuture<'static, Result<(), DestroyError>>;
}

// Impl AnyComponent for any Component
impl<T: Injectable> AnyComponent for Component<T> {
    fn info(&self) -> &ComponentInfo {
        &self.info
    }

    fn cell_id(&self) -> CellId {
        Component::cell_id(self)
    }

    fn is_cached(&self) -> bool {
        self.cached
    }

    fn state(&self) -> CellState {
        Component::state(self)
    }

    fn dependencies(&self) -> Vec<DynComponent> {
        Component::dependencies(self)
    }

    fn init_instance(
        &self,
        settled: Vec<Result<Instance, InitError>>,
    ) -> BoxFuture<'static, Result<Instance, InitError>> {
        self.initialize(settled)
            .map(|result| result.map(Instance::from_arc))
            .boxed()
    }

    fn destroy_instance(&self) -> BoxFuture<'static, Result<(), DestroyError>> {
        self.teardown().boxed()
    }
}

impl std::fmt::Debug for dyn AnyComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyComponent")
            .field("info", self.info())
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Injectable> From<Component<T>> for DynComponent {
    fn from(component: Component<T>) -> Self {
        Arc::new(component)
    }
}

impl<T: Injectable> From<&Component<T>> for DynComponent {
    fn from(component: &Component<T>) -> Self {
        component.erase()
    }
}
