use alloc::boxed::Box;

use super::{instantiate::InstantiateErrorKind, instantiator::InstantiatorErrorKind};
use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Binding for {type_info} not found in container chain")]
    NotFound { type_info: TypeInfo },
    #[error("Can't resolve {type_info}: {unit} is disposed")]
    Disposed { type_info: TypeInfo, unit: &'static str },
    #[error("No constructor of {type_info} has all of its parameters resolvable")]
    NoConstructorResolvable { type_info: TypeInfo },
    #[error("Incorrect provided type. Actual: {actual}, expected: {expected}")]
    IncorrectType { expected: TypeInfo, actual: TypeInfo },
    #[error(transparent)]
    Instantiator(InstantiatorErrorKind<Box<ResolveErrorKind>, InstantiateErrorKind>),
}

impl ResolveErrorKind {
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[inline]
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed { .. })
    }
}
