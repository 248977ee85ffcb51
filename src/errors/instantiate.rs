use alloc::boxed::Box;

use super::dependency_resolver::ResolveErrorKind;

/// Failure raised by user code while building a value.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
    /// A dependency resolved by hand inside a provider failed.
    #[error(transparent)]
    Resolve(Box<ResolveErrorKind>),
}

impl From<ResolveErrorKind> for InstantiateErrorKind {
    #[inline]
    fn from(err: ResolveErrorKind) -> Self {
        Self::Resolve(Box::new(err))
    }
}
