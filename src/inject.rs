use alloc::{sync::Arc, vec, vec::Vec};

use crate::{any::TypeInfo, dependency_resolver::DependencyResolver, errors::ResolveErrorKind, scope::Scope};

/// Constructor parameter resolved through the current scope.
///
/// `Dep` may be a trait object, e.g. `Inject<dyn Storage>`.
pub struct Inject<Dep: ?Sized>(pub Arc<Dep>);

impl<Dep: ?Sized + Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(scope: &Scope) -> Result<Self, Self::Error> {
        scope.resolve().map(Self)
    }

    #[inline]
    fn parameters() -> Vec<TypeInfo> {
        vec![TypeInfo::of::<Dep>()]
    }
}
