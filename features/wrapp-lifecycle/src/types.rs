use std::{
    any::{Any, TypeId},
    borrow::Cow,
    sync::Arc,
};

/// Boxed error returned by create and destroy steps
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// We assume that we are using a multithreaded async runtime
/// So anything a component produces needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// Identity and source location of a component declaration
///
/// Only used for display, diagnostics and as the key of a [`Scope`](crate::container::Scope) cache.
/// Two components are the same component iff they share a result cell, never because their infos match.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ComponentInfo {
    pub name: Cow<'static, str>,
    pub file_path: Cow<'static, str>,
    pub file_name: Cow<'static, str>,
    pub line: u32,
}

impl ComponentInfo {
    /// Info without a source location
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            file_path: Cow::Borrowed(""),
            file_name: Cow::Borrowed("<unknown>"),
            line: 0,
        }
    }

    /// Info pointing at a source location, see [`component_info!`](crate::component_info)
    pub fn at(name: impl Into<Cow<'static, str>>, file_path: &'static str, line: u32) -> Self {
        let file_name = file_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_path);

        Self {
            name: name.into(),
            file_path: Cow::Borrowed(file_path),
            file_name: Cow::Borrowed(file_name),
            line,
        }
    }
}

impl std::fmt::Display for ComponentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.file_name, self.line)
    }
}

/// Builds a [`ComponentInfo`] for the calling source location
///
/// ```
/// let info = wrapp_lifecycle::component_info!("database");
/// assert_eq!(info.name, "database");
/// ```
#[macro_export]
macro_rules! component_info {
    ($name:expr) => {
        $crate::types::ComponentInfo::at($name, file!(), line!())
    };
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// Type erased value produced by a component
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub(crate) fn from_arc<T: Injectable>(instance: Arc<T>) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance,
        }
    }

    /// Returns the shared value, or the name of the actual type on mismatch
    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Identity of a result cell
///
/// Derived from the address of the shared cell allocation, so every wrapper around
/// the same cell yields the same id.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellId(pub(crate) usize);

impl CellId {
    pub(crate) fn of<C>(cell: &Arc<C>) -> Self {
        CellId(Arc::as_ptr(cell) as *const () as usize)
    }
}
