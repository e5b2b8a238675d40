use std::{any::type_name, sync::Arc};

use crate::{
    errors::ResolveError,
    resolver::Resolve,
    types::{Injectable, Instance},
};

pub(crate) fn downcast_at<T: Injectable>(
    values: &[Instance],
    index: usize,
) -> Result<Arc<T>, ResolveError> {
    let instance = values.get(index).ok_or(ResolveError::Missing {
        index,
        len: values.len(),
    })?;

    instance
        .downcast::<T>()
        .map_err(|actual_type| ResolveError::DowncastFailed {
            index,
            required_type: type_name::<T>(),
            actual_type,
        })
}

impl<T: Injectable> Resolve for Arc<T> {
    fn resolve(values: &[Instance]) -> Result<Self, ResolveError> {
        downcast_at(values, 0)
    }
}

impl Resolve for () {
    fn resolve(_values: &[Instance]) -> Result<Self, ResolveError> {
        Ok(())
    }
}
