use alloc::{
    sync::{Arc, Weak},
    vec::Vec,
};
use tracing::{debug, info_span};

use crate::{
    any::{Instance, TypeInfo},
    container::{ChildContainerBuilder, Container},
    dispose::Dispose,
    errors::{AggregateDisposalFailure, ResolveErrorKind},
    registry::Binding,
    resolver::{expect_singleton, Lookup, Resolver},
    scope::Scope,
};

/// Read-only view over several containers: the first container that knows a key answers.
///
/// Registries are not merged and the containers are not owned: disposing the aggregate leaves them alone, and a
/// member disposed on its own is skipped.
#[derive(Clone)]
pub struct CombinedContainer {
    inner: Arc<CombinedInner>,
}

impl CombinedContainer {
    #[must_use]
    pub fn new<I>(containers: I) -> Self
    where
        I: IntoIterator<Item = Container>,
    {
        Self {
            inner: Arc::new(CombinedInner {
                containers: containers.into_iter().collect(),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn containers(&self) -> &[Container] {
        &self.inner.containers
    }

    /// Starts building a child container that falls back to this aggregate for unknown keys.
    #[inline]
    #[must_use]
    pub fn enter(&self) -> ChildContainerBuilder {
        ChildContainerBuilder::new(Arc::downgrade(&self.inner) as Weak<dyn Lookup>)
    }
}

impl Resolver for CombinedContainer {
    #[inline]
    fn contains_key(&self, type_info: &TypeInfo, include_parent: bool) -> Result<bool, ResolveErrorKind> {
        self.inner.contains_key(type_info, include_parent)
    }

    fn try_lookup_key(&self, type_info: &TypeInfo) -> Result<Option<Binding>, ResolveErrorKind> {
        let span = info_span!("lookup", dependency = type_info.name, aggregate = true);
        let _guard = span.enter();

        self.inner.try_lookup_key(type_info)
    }

    fn get_singleton_instance<T>(&self) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_info = TypeInfo::of::<T>();

        let span = info_span!("get_singleton_instance", dependency = type_info.name, aggregate = true);
        let _guard = span.enter();

        expect_singleton(type_info, self.inner.clone().try_singleton_instance(&type_info)?)
    }

    #[inline]
    fn create_session(&self) -> Result<Scope, ResolveErrorKind> {
        Ok(Scope::new(Arc::downgrade(&self.inner) as Weak<dyn Lookup>))
    }
}

/// Members are not owned: nothing to tear down.
impl Dispose for CombinedContainer {
    #[inline]
    fn try_dispose(&self) -> Result<(), AggregateDisposalFailure> {
        Ok(())
    }
}

pub(crate) struct CombinedInner {
    containers: Vec<Container>,
}

impl CombinedInner {
    /// Runs `f` on each member in order until one answers. Disposed members are skipped.
    fn first<R>(
        &self,
        mut f: impl FnMut(&Container) -> Result<Option<R>, ResolveErrorKind>,
    ) -> Result<Option<R>, ResolveErrorKind> {
        for (index, container) in self.containers.iter().enumerate() {
            match f(container) {
                Ok(Some(found)) => {
                    debug!(index, "Found in member");
                    return Ok(Some(found));
                }
                Ok(None) => {}
                Err(err) if err.is_disposed() && container.is_disposed() => {
                    debug!(index, "Member disposed, skipped");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

impl Lookup for CombinedInner {
    fn contains_key(&self, type_info: &TypeInfo, include_parent: bool) -> Result<bool, ResolveErrorKind> {
        self.first(|container| Ok(container.contains_key(type_info, include_parent)?.then_some(())))
            .map(|found| found.is_some())
    }

    fn try_lookup_key(&self, type_info: &TypeInfo) -> Result<Option<Binding>, ResolveErrorKind> {
        self.first(|container| container.inner.try_lookup_key(type_info))
    }

    fn try_singleton_instance(self: Arc<Self>, type_info: &TypeInfo) -> Result<Option<Instance>, ResolveErrorKind> {
        self.first(|container| container.inner.singleton_instance(type_info))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::CombinedContainer;
    use crate::{dispose::Dispose as _, registration::Registration, resolver::Resolver as _, Container};

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
    };
    use core::sync::atomic::{AtomicU8, Ordering};
    use tracing_test::traced_test;

    struct Left;
    struct Right;
    struct Shared(&'static str);

    #[test]
    #[traced_test]
    fn test_short_circuit() {
        let a = Container::new();
        a.register(Registration::value(Left)).unwrap();
        a.register(Registration::value(Shared("a"))).unwrap();

        let b = Container::new();
        b.register(Registration::value(Right)).unwrap();
        b.register(Registration::value(Shared("b"))).unwrap();

        let combined = CombinedContainer::new([a.clone(), b.clone()]);

        assert!(combined.contains::<Left>(false).unwrap());
        assert!(combined.contains::<Right>(false).unwrap());
        assert!(!combined.contains::<u8>(true).unwrap());

        assert_eq!(combined.get_singleton_instance::<Shared>().unwrap().0, "a");
        assert!(combined.lookup::<u8>().unwrap_err().is_not_found());
        assert!(combined.try_lookup::<u8>().unwrap().is_none());

        let scope = combined.create_session().unwrap();
        scope.resolve::<Left>().unwrap();
        scope.resolve::<Right>().unwrap();
        assert_eq!(scope.resolve::<Shared>().unwrap().0, "a");
    }

    #[test]
    #[traced_test]
    fn test_dispose_is_noop_and_disposed_members_skipped() {
        let teardown_call_count = Arc::new(AtomicU8::new(0));

        let a = Container::new();
        a.register(Registration::value(Shared("a"))).unwrap();

        let b = Container::new();
        b.register(Registration::provider(|_| Ok(Shared("b"))).singleton().finalizer({
            let teardown_call_count = teardown_call_count.clone();
            move |_: Arc<Shared>| {
                teardown_call_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
        .unwrap();

        let combined = CombinedContainer::new([a.clone(), b.clone()]);
        b.get_singleton_instance::<Shared>().unwrap();

        combined.try_dispose().unwrap();
        assert!(!a.is_disposed());
        assert!(!b.is_disposed());
        assert_eq!(teardown_call_count.load(Ordering::SeqCst), 0);

        a.dispose();
        assert_eq!(combined.get_singleton_instance::<Shared>().unwrap().0, "b");
    }

    #[test]
    #[traced_test]
    fn test_child_of_aggregate() {
        let a = Container::new();
        a.register(Registration::value(Left)).unwrap();
        let b = Container::new();
        b.register(Registration::value(Right)).unwrap();

        let combined = CombinedContainer::new([a, b]);
        let child = combined.enter().build();

        assert!(child.contains::<Right>(true).unwrap());
        assert!(!child.contains::<Right>(false).unwrap());
        child.get_singleton_instance::<Left>().unwrap();
    }
}
