use alloc::sync::Arc;
use tracing::error;

use crate::{
    any::{Instance, TypeInfo},
    errors::ResolveErrorKind,
    registry::Binding,
    scope::Scope,
};

/// What a container chain answers when asked by a child: implemented by containers and aggregates.
pub(crate) trait Lookup: Send + Sync {
    fn contains_key(&self, type_info: &TypeInfo, include_parent: bool) -> Result<bool, ResolveErrorKind>;

    fn try_lookup_key(&self, type_info: &TypeInfo) -> Result<Option<Binding>, ResolveErrorKind>;

    fn try_singleton_instance(self: Arc<Self>, type_info: &TypeInfo) -> Result<Option<Instance>, ResolveErrorKind>;
}

/// Read side shared by [`crate::Container`] and [`crate::CombinedContainer`].
pub trait Resolver {
    /// # Errors
    /// Returns [`ResolveErrorKind::Disposed`] if the container is disposed.
    fn contains_key(&self, type_info: &TypeInfo, include_parent: bool) -> Result<bool, ResolveErrorKind>;

    /// Finds the binding for `type_info` without invoking its factory.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::Disposed`] if the container is disposed.
    fn try_lookup_key(&self, type_info: &TypeInfo) -> Result<Option<Binding>, ResolveErrorKind>;

    /// # Errors
    /// Returns [`ResolveErrorKind::NotFound`] after exhausting the parent chain.
    fn lookup_key(&self, type_info: &TypeInfo) -> Result<Binding, ResolveErrorKind> {
        match self.try_lookup_key(type_info)? {
            Some(binding) => Ok(binding),
            None => {
                let err = ResolveErrorKind::NotFound { type_info: *type_info };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Gets the singleton registered for `T`, building and caching it in the owning container on first access.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::NotFound`] if no container in the chain binds `T`.
    fn get_singleton_instance<T>(&self) -> Result<Arc<T>, ResolveErrorKind>
    where
        Self: Sized,
        T: ?Sized + Send + Sync + 'static;

    /// # Errors
    /// Returns [`ResolveErrorKind::Disposed`] if the container is disposed.
    fn create_session(&self) -> Result<Scope, ResolveErrorKind>;

    #[inline]
    #[allow(clippy::missing_errors_doc)]
    fn contains<T: ?Sized + 'static>(&self, include_parent: bool) -> Result<bool, ResolveErrorKind>
    where
        Self: Sized,
    {
        self.contains_key(&TypeInfo::of::<T>(), include_parent)
    }

    #[inline]
    #[allow(clippy::missing_errors_doc)]
    fn try_lookup<T: ?Sized + 'static>(&self) -> Result<Option<Binding>, ResolveErrorKind>
    where
        Self: Sized,
    {
        self.try_lookup_key(&TypeInfo::of::<T>())
    }

    #[inline]
    #[allow(clippy::missing_errors_doc)]
    fn lookup<T: ?Sized + 'static>(&self) -> Result<Binding, ResolveErrorKind>
    where
        Self: Sized,
    {
        self.lookup_key(&TypeInfo::of::<T>())
    }
}

/// Downcasts a singleton found under `type_info`, or reports it missing.
pub(crate) fn expect_singleton<T>(type_info: TypeInfo, instance: Option<Instance>) -> Result<Arc<T>, ResolveErrorKind>
where
    T: ?Sized + Send + Sync + 'static,
{
    let Some(instance) = instance else {
        let err = ResolveErrorKind::NotFound { type_info };
        error!("{}", err);
        return Err(err);
    };
    match instance.downcast::<T>() {
        Some(value) => Ok(value),
        None => {
            let err = ResolveErrorKind::IncorrectType {
                expected: type_info,
                actual: instance.type_info(),
            };
            error!("{}", err);
            Err(err)
        }
    }
}
