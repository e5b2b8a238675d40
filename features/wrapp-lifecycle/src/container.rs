use std::{
    any::{Any, TypeId},
    fmt::Debug,
    sync::{Arc, Weak},
};

use dashmap::DashMap;

use crate::{
    component::{Component, DynComponent, ResultCell},
    destroyer::Destroyer,
    errors::DestroyErrors,
    types::{ComponentInfo, Injectable},
};

/// Cache key - a declaration site producing a given type
type ScopeKey = (ComponentInfo, TypeId);

struct CachedEntry {
    cell: Arc<dyn Any + Send + Sync>,
    /// Component with the most ordering edges handed out so far, used for scope wide teardown
    component: DynComponent,
    ordering: usize,
}

/// Owner of singleton components
///
/// Declarations passed through [`Scope::cached`] share one result cell per
/// [`ComponentInfo`], so evaluating the same accessor twice yields the same component.
///
/// The scope owns its components, so lazy dependency declarations must not hold a
/// strong [`Scope`]. Capture a [`WeakScope`] instead:
///
/// ```rust
/// use std::convert::Infallible;
/// use wrapp_lifecycle::{component_info, Component, Resolved, Scope};
///
/// fn config(scope: &Scope) -> Component<u16> {
///     scope.cached(
///         Component::builder(component_info!("config"))
///             .create(|_: Resolved| async { Ok::<_, Infallible>(8080) }),
///     )
/// }
///
/// fn server(scope: &Scope) -> Component<String> {
///     let weak = scope.downgrade();
///     scope.cached(
///         Component::builder(component_info!("server"))
///             .dependencies_with(move || weak.with(|scope| vec![config(scope).erase()]))
///             .create(|deps: Resolved| async move {
///                 let port = deps.get::<u16>(0)?;
///                 Ok::<_, wrapp_lifecycle::ResolveError>(format!("listening on {port}"))
///             }),
///     )
/// }
///
/// let scope = Scope::new();
/// let started = futures::executor::block_on(server(&scope).init()).unwrap();
/// assert_eq!(*started, "listening on 8080");
/// ```
#[derive(Clone, Default)]
pub struct Scope(pub Arc<ScopeInner>);
#[derive(Default)]
pub struct ScopeInner {
    cells: DashMap<ScopeKey, CachedEntry>,
}
impl Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for entry in self.0.cells.iter() {
            map.entry(&entry.key().0.name, &entry.value().component.state());
        }
        map.finish()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that does not keep the scope alive
    pub fn downgrade(&self) -> WeakScope {
        WeakScope(Arc::downgrade(&self.0))
    }

    /// Binds `component` to the cell cached for its info
    ///
    /// The first call for an info stores the component's own cell; every later call
    /// returns a component sharing that cell, regardless of the cell it was declared with.
    ///
    /// [`Scope::destroy`] orders teardown by the dependencies of the stored component.
    /// Edges added with [`Component::depends_on`] only count there once the extended
    /// component is passed through `cached` again; it then replaces the stored one.
    pub fn cached<T: Injectable>(&self, component: Component<T>) -> Component<T> {
        let key = (component.info.clone(), TypeId::of::<T>());
        let ordering = component.ordering.len();
        let component = Component {
            cached: true,
            ..component
        };

        let mut entry = self.0.cells.entry(key).or_insert_with(|| CachedEntry {
            cell: component.cell.clone(),
            component: component.erase(),
            ordering,
        });

        let cell = match entry.cell.clone().downcast::<ResultCell<T>>() {
            Ok(cell) => cell,
            Err(_) => unreachable!("cells are keyed by the type they produce"),
        };
        let component = Component { cell, ..component };

        if ordering > entry.ordering {
            tracing::trace!("'{}' gained ordering edges in its scope", component.info);
            entry.component = component.erase();
            entry.ordering = ordering;
        }

        component
    }

    pub fn len(&self) -> usize {
        self.0.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.cells.is_empty()
    }

    /// All components cached so far
    pub fn components(&self) -> Vec<DynComponent> {
        self.0
            .cells
            .iter()
            .map(|entry| entry.value().component.clone())
            .collect()
    }

    /// Destroys all cached components, dependents first
    pub async fn destroy(&self) -> Result<(), DestroyErrors> {
        let components = self.components();
        tracing::debug!("Destroying scope with {} cached component(s)", components.len());
        Destroyer::new().destroy_all(&components).await
    }
}

/// Non-owning handle to a [`Scope`], for use inside lazy dependency declarations
#[derive(Clone, Default)]
pub struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(Scope)
    }

    /// Declares dependencies through the scope, or none once the scope is gone
    pub fn with<F>(&self, declare: F) -> Vec<DynComponent>
    where
        F: FnOnce(&Scope) -> Vec<DynComponent>,
    {
        match self.upgrade() {
            Some(scope) => declare(&scope),
            None => {
                tracing::warn!("Declaring dependencies through a scope that was dropped");
                Vec::new()
            }
        }
    }
}

impl Debug for WeakScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(scope) => f.debug_tuple("WeakScope").field(&scope).finish(),
            None => f.write_str("WeakScope(<dropped>)"),
        }
    }
}
