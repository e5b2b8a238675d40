//! [`Resolve`] for tuples of `Arc`s, one element per declared dependency.

use std::sync::Arc;

use crate::{
    errors::ResolveError,
    resolver::{arc::downcast_at, Resolve},
    types::{Injectable, Instance},
};

macro_rules! impl_resolve_tuple {
    ($($ty:ident $index:tt),+) => {
        impl<$($ty: Injectable),+> Resolve for ($(Arc<$ty>,)+) {
            fn resolve(values: &[Instance]) -> Result<Self, ResolveError> {
                Ok(($(downcast_at::<$ty>(values, $index)?,)+))
            }
        }
    };
}

impl_resolve_tuple!(A 0);
impl_resolve_tuple!(A 0, B 1);
impl_resolve_tuple!(A 0, B 1, C 2);
impl_resolve_tuple!(A 0, B 1, C 2, D 3);
impl_resolve_tuple!(A 0, B 1, C 2, D 3, E 4);
impl_resolve_tuple!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_resolve_tuple!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_resolve_tuple!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
