use crate::{errors::ResolveError, types::Instance};

pub mod arc;
pub mod tuple;

/// Values of the declared dependencies, in declared order, handed to a create step
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    values: Vec<Instance>,
}

impl Resolved {
    pub(crate) fn new(values: Vec<Instance>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the dependency at `index`
    pub fn get<T: crate::types::Injectable>(
        &self,
        index: usize,
    ) -> Result<std::sync::Arc<T>, ResolveError> {
        arc::downcast_at(&self.values, index)
    }

    /// Typed view on the leading dependencies, e.g. `(Arc<Db>, Arc<Cache>)`
    pub fn extract<R: Resolve>(&self) -> Result<R, ResolveError> {
        R::resolve(&self.values)
    }

    pub fn into_inner(self) -> Vec<Instance> {
        self.values
    }
}

/// Allows typed extraction of resolved dependency values
pub trait Resolve: Sized {
    fn resolve(values: &[Instance]) -> Result<Self, ResolveError>;
}
