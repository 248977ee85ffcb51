use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicBool, Ordering};
use parking_lot::Mutex;
use tracing::{debug, error, info_span, warn};

use crate::{
    any::{Instance, TypeInfo},
    cache::Cache,
    container::Container,
    dispose::{DisposalStack, Dispose},
    errors::{AggregateDisposalFailure, DisposeErrorKind, ResolveErrorKind},
    resolver::{Lookup, Resolver as _},
};

/// Resolution context of one logical operation.
///
/// Transients resolved through a scope are built once per scope and torn down, most recent first, when the scope is
/// disposed. Singletons are shared with the container and outlive the scope.
/// The scope is disposed by [`Scope::dispose`] or when the last handle drops.
#[derive(Clone)]
pub struct Scope {
    pub(crate) inner: Arc<ScopeInner>,
}

impl core::fmt::Debug for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scope").finish_non_exhaustive()
    }
}

impl Scope {
    #[must_use]
    pub(crate) fn new(parent: Weak<dyn Lookup>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                container: Container::child_of(parent, true),
                cache: Mutex::new(Cache::new()),
                disposables: DisposalStack::new(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Gets the value bound to `T`: from this scope's cache, or built through the container chain.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NotFound`] if no container in the chain binds `T`.
    /// - Returns [`ResolveErrorKind::Disposed`] if the scope or its container chain is disposed.
    /// - Returns construction errors as they are.
    pub fn resolve<T>(&self) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_info = TypeInfo::of::<T>();
        match self.try_resolve::<T>()? {
            Some(value) => Ok(value),
            None => {
                let err = ResolveErrorKind::NotFound { type_info };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Same as [`Self::resolve`], but an unbound `T` is `Ok(None)`.
    ///
    /// # Errors
    /// See [`Self::resolve`].
    pub fn try_resolve<T>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_info = TypeInfo::of::<T>();
        let Some(instance) = self.resolve_instance(&type_info)? else {
            return Ok(None);
        };
        match instance.downcast::<T>() {
            Some(value) => Ok(Some(value)),
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

    fn resolve_instance(&self, type_info: &TypeInfo) -> Result<Option<Instance>, ResolveErrorKind> {
        let span = info_span!("resolve", dependency = type_info.name);
        let _guard = span.enter();

        self.inner.ensure_active(type_info)?;

        if let Some(instance) = self.inner.cache.lock().get(type_info) {
            debug!("Found in scope cache");
            return Ok(Some(instance));
        }
        debug!("Not found in scope cache");

        let Some(binding) = self.inner.container.inner.try_lookup_key(type_info)? else {
            debug!("Binding not found");
            return Ok(None);
        };

        let item = binding.create(self)?;
        let instance = {
            let mut cache = self.inner.cache.lock();
            let instance = cache.get_or_insert(*type_info, item.instance().clone());
            debug!(cached = cache.len(), "Cached");
            instance
        };

        if !item.is_singleton() {
            if let Err(rejected) = self.inner.disposables.push(Arc::new(item)) {
                if let Err(failure) = rejected.try_dispose() {
                    warn!("{}", failure);
                }
                let err = ResolveErrorKind::Disposed {
                    type_info: *type_info,
                    unit: "scope",
                };
                error!("{}", err);
                return Err(err);
            }
            debug!(pending = self.inner.disposables.len(), "Pushed to disposal stack");
        }

        Ok(Some(instance))
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::Disposed`] if the scope or its container chain is disposed.
    #[inline]
    pub fn contains<T: ?Sized + 'static>(&self, include_parent: bool) -> Result<bool, ResolveErrorKind> {
        self.contains_key(&TypeInfo::of::<T>(), include_parent)
    }

    /// With `include_parent` off, only keys registered on this scope's own container count: keys memoized from
    /// the parent chain by earlier resolves don't.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::Disposed`] if the scope or its container chain is disposed.
    pub fn contains_key(&self, type_info: &TypeInfo, include_parent: bool) -> Result<bool, ResolveErrorKind> {
        self.inner.ensure_active(type_info)?;
        self.inner.container.contains_key(type_info, include_parent)
    }

    /// Hands `disposable` to this scope: it's torn down with the scope's own values.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::Disposed`] if the scope is disposed. The disposable is torn down right away.
    pub fn add_disposable(&self, disposable: Arc<dyn Dispose>) -> Result<(), ResolveErrorKind> {
        if let Err(rejected) = self.inner.disposables.push(disposable) {
            if let Err(failure) = rejected.try_dispose() {
                warn!("{}", failure);
            }
            let err = ResolveErrorKind::Disposed {
                type_info: TypeInfo::of::<dyn Dispose>(),
                unit: "scope",
            };
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    /// The scope's private container. Registrations made on it are visible to this scope only.
    #[inline]
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.inner.container
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Disposes the scope, logging failures instead of returning them.
    pub fn dispose(&self) {
        if let Err(failure) = self.inner.try_dispose() {
            warn!("{}", failure);
        }
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Dispose for Scope {
    #[inline]
    fn try_dispose(&self) -> Result<(), AggregateDisposalFailure> {
        self.inner.try_dispose()
    }
}

pub(crate) struct ScopeInner {
    container: Container,
    cache: Mutex<Cache>,
    disposables: DisposalStack,
    disposed: AtomicBool,
}

impl ScopeInner {
    #[inline]
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_active(&self, type_info: &TypeInfo) -> Result<(), ResolveErrorKind> {
        if self.is_disposed() {
            let err = ResolveErrorKind::Disposed {
                type_info: *type_info,
                unit: "scope",
            };
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    fn try_dispose(&self) -> Result<(), AggregateDisposalFailure> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(DisposeErrorKind::AlreadyDisposed { unit: "scope" }.into());
        }

        let span = info_span!("dispose", unit = "scope");
        let _guard = span.enter();

        let mut failure = AggregateDisposalFailure::new();
        if let Err(err) = self.disposables.drain() {
            failure.extend(err);
        }
        let cached = self.cache.lock().take();
        drop(cached);
        if let Err(err) = self.container.try_dispose() {
            failure.extend(err);
        }

        match failure.into_result() {
            Ok(()) => {
                debug!("Scope disposed");
                Ok(())
            }
            Err(failure) => {
                error!("{}", failure);
                Err(failure)
            }
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if self.is_disposed() {
            return;
        }
        if let Err(failure) = self.try_dispose() {
            warn!("{}", failure);
        }
        debug!("Scope disposed on drop");
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{Scope, ScopeInner};
    use crate::{
        dispose::{Dispose, Teardown, TeardownCell},
        errors::{AggregateDisposalFailure, DisposeErrorKind},
        inject::Inject,
        instantiator::{Constructible, Constructors},
        registration::Registration,
        resolver::Resolver as _,
        Container,
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
        vec::Vec,
    };
    use core::sync::atomic::{AtomicU8, Ordering};
    use parking_lot::Mutex;
    use tracing::debug;
    use tracing_test::traced_test;

    #[derive(Debug)]
    struct Request(u8);
    struct Session(#[allow(dead_code)] Arc<Request>);

    #[test]
    fn test_thread_safe() {
        fn impl_bounds<T: Send + Sync + 'static>() {}
        impl_bounds::<(Scope, ScopeInner)>();
    }

    #[test]
    #[traced_test]
    fn test_transient_idempotent_in_scope() {
        let instantiator_call_count = Arc::new(AtomicU8::new(0));

        let container = Container::new();
        container
            .register(Registration::provider({
                let instantiator_call_count = instantiator_call_count.clone();
                move |_| {
                    let id = instantiator_call_count.fetch_add(1, Ordering::SeqCst);

                    debug!("Call instantiator");
                    Ok(Request(id))
                }
            }))
            .unwrap();

        let first_scope = container.create_session().unwrap();
        let second_scope = container.create_session().unwrap();

        let a = first_scope.resolve::<Request>().unwrap();
        let b = first_scope.resolve::<Request>().unwrap();
        let c = second_scope.resolve::<Request>().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_ne!(a.0, c.0);
        assert_eq!(instantiator_call_count.load(Ordering::SeqCst), 2);
        assert!(logs_contain("Found in scope cache"));
    }

    #[test]
    #[traced_test]
    fn test_dispose_transients_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let container = Container::new();
        container
            .register(Registration::provider(|_| Ok(Request(0))).finalizer({
                let order = order.clone();
                move |_: Arc<Request>| {
                    order.lock().push("request");
                    Ok(())
                }
            }))
            .unwrap();
        container
            .register(
                Registration::provider(|scope| Ok(Session(scope.resolve()?))).finalizer({
                    let order = order.clone();
                    move |_: Arc<Session>| {
                        order.lock().push("session");
                        Ok(())
                    }
                }),
            )
            .unwrap();

        let scope = container.create_session().unwrap();
        scope.resolve::<Session>().unwrap();
        assert!(order.lock().is_empty());

        scope.try_dispose().unwrap();
        assert_eq!(*order.lock(), ["session", "request"]);
        assert!(scope.is_disposed());
    }

    #[test]
    #[traced_test]
    fn test_disposed_scope_rejects_operations() {
        let container = Container::new();
        container.register(Registration::provider(|_| Ok(Request(1)))).unwrap();

        let scope = container.create_session().unwrap();
        scope.resolve::<Request>().unwrap();
        scope.dispose();

        assert!(scope.resolve::<Request>().unwrap_err().is_disposed());
        assert!(scope.contains::<Request>(true).unwrap_err().is_disposed());

        let failure = scope.try_dispose().unwrap_err();
        assert!(matches!(failure.errors[..], [DisposeErrorKind::AlreadyDisposed { unit: "scope" }]));
    }

    #[test]
    #[traced_test]
    fn test_add_disposable() {
        let teardown_call_count = Arc::new(AtomicU8::new(0));
        let cell = |teardown_call_count: &Arc<AtomicU8>| -> Arc<dyn Dispose> {
            let teardown_call_count = teardown_call_count.clone();
            Arc::new(TeardownCell::new(
                "extra",
                Some(Teardown::new::<Request, _>(move || {
                    teardown_call_count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })),
            ))
        };

        let container = Container::new();
        let scope = container.create_session().unwrap();

        scope.add_disposable(cell(&teardown_call_count)).unwrap();
        assert_eq!(teardown_call_count.load(Ordering::SeqCst), 0);

        scope.dispose();
        assert_eq!(teardown_call_count.load(Ordering::SeqCst), 1);

        assert!(scope.add_disposable(cell(&teardown_call_count)).unwrap_err().is_disposed());
        assert_eq!(teardown_call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_scope_local_registration() {
        let container = Container::new();
        container.register(Registration::value(Request(1))).unwrap();

        let scope = container.create_session().unwrap();
        assert!(scope.container().register(Registration::value(Request(2))).unwrap());

        assert_eq!(scope.resolve::<Request>().unwrap().0, 2);
        assert_eq!(container.create_session().unwrap().resolve::<Request>().unwrap().0, 1);
    }

    #[test]
    #[traced_test]
    fn test_contains_ignores_resolve_history() {
        let container = Container::new();
        container.register(Registration::value(Request(1))).unwrap();

        let scope = container.create_session().unwrap();
        assert!(!scope.contains::<Request>(false).unwrap());
        assert!(scope.contains::<Request>(true).unwrap());

        scope.resolve::<Request>().unwrap();
        assert!(!scope.contains::<Request>(false).unwrap());
        assert!(scope.contains::<Request>(true).unwrap());

        scope.container().register(Registration::value(Request(2))).unwrap();
        assert!(scope.contains::<Request>(false).unwrap());
    }

    #[test]
    #[traced_test]
    fn test_constructor_trial_skips_unresolvable() {
        struct Plan(Option<Arc<Request>>);

        impl Constructible for Plan {
            fn constructors() -> Constructors<Self> {
                Constructors::new()
                    .with(|| Ok(Plan(None)))
                    .with(|Inject(request): Inject<Request>, Inject(_): Inject<Session>| Ok(Plan(Some(request))))
            }
        }

        let container = Container::new();
        container.register(Registration::<Plan>::reflective()).unwrap();
        container.register(Registration::provider(|_| Ok(Request(5)))).unwrap();

        let scope = container.create_session().unwrap();
        assert!(scope.resolve::<Plan>().unwrap().0.is_none());
        // A failed trial resolves nothing
        assert!(scope.inner.cache.lock().get(&crate::TypeInfo::of::<Request>()).is_none());
    }

    #[test]
    #[traced_test]
    fn test_no_constructor_resolvable() {
        #[derive(Debug)]
        struct Plan;

        impl Constructible for Plan {
            fn constructors() -> Constructors<Self> {
                Constructors::new().with(|Inject(_): Inject<Session>| Ok(Plan))
            }
        }

        let container = Container::new();
        container.register(Registration::<Plan>::reflective()).unwrap();

        let scope = container.create_session().unwrap();
        assert!(matches!(
            scope.resolve::<Plan>().unwrap_err(),
            crate::ResolveErrorKind::NoConstructorResolvable { .. }
        ));
    }

    struct Failing;

    impl Dispose for Failing {
        fn try_dispose(&self) -> Result<(), AggregateDisposalFailure> {
            Err(DisposeErrorKind::AlreadyDisposed { unit: "failing" }.into())
        }
    }

    #[test]
    #[traced_test]
    fn test_drop_logs_failures() {
        let container = Container::new();
        container.register(Registration::provider(|_| Ok(Failing)).disposable()).unwrap();

        let scope = container.create_session().unwrap();
        scope.resolve::<Failing>().unwrap();
        drop(scope);

        assert!(logs_contain("Scope disposed on drop"));
        assert!(logs_contain("failing is already disposed"));
    }
}
