use alloc::{
    collections::{btree_map::Entry, BTreeMap},
    sync::{Arc, Weak},
};
use core::{
    mem,
    sync::atomic::{AtomicBool, Ordering},
};
use parking_lot::RwLock;
use tracing::{debug, error, info_span, warn};

use crate::{
    any::{Instance, TypeInfo},
    config::Config,
    dispose::{DisposalStack, Dispose, TeardownCell},
    errors::{AggregateDisposalFailure, DisposeErrorKind, RegisterErrorKind, ResolveErrorKind},
    factory::{discard, Constructed, Factory, FactoryId, Strategy},
    instantiator::Constructible,
    manifest::Manifest,
    registration::Registration,
    registry::{Binding, Registry},
    resolver::{expect_singleton, Lookup, Resolver},
    scope::Scope,
};

/// Long-lived registry of bindings with the singletons built from them.
///
/// Handles are cheap to clone. The container is disposed by [`Container::dispose`] or when the last handle drops.
///
/// # Examples
/// ```rust
/// use holdfast::{Container, Registration, Resolver as _};
///
/// struct Settings(u16);
/// struct Server(u16);
///
/// let container = Container::new();
/// container.register(Registration::value(Settings(8080))).unwrap();
/// container
///     .register(Registration::provider(|scope| Ok(Server(scope.resolve::<Settings>()?.0))))
///     .unwrap();
///
/// let scope = container.create_session().unwrap();
/// assert_eq!(scope.resolve::<Server>().unwrap().0, 8080);
/// ```
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: ContainerInner::new(None, false),
        }
    }

    /// Starts building a child container that falls back to this one for unknown keys.
    #[inline]
    #[must_use]
    pub fn enter(&self) -> ChildContainerBuilder {
        ChildContainerBuilder::new(Arc::downgrade(&self.inner) as Weak<dyn Lookup>)
    }

    /// Binds the registration under its key, and under its declared interfaces unless propagation is off.
    ///
    /// Returns whether the binding under the primary key took effect: a binding with higher priority is kept.
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::InvalidArgument`] if the registration can't produce a value,
    ///   or if a fixed instance is given a finalizer.
    /// - Returns [`RegisterErrorKind::Disposed`] if the container is disposed.
    pub fn register<T>(&self, registration: Registration<T>) -> Result<bool, RegisterErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_info = TypeInfo::of::<T>();

        let span = info_span!("register", dependency = type_info.name);
        let _guard = span.enter();

        if self.inner.is_disposed() {
            let err = RegisterErrorKind::Disposed {
                type_info,
                unit: "container",
            };
            error!("{}", err);
            return Err(err);
        }

        let Registration {
            strategy,
            finalizer,
            config,
            interfaces,
        } = registration;

        if matches!(&strategy, Strategy::Constructors(constructors) if constructors.is_empty()) {
            let err = RegisterErrorKind::InvalidArgument {
                type_info,
                reason: "no constructors declared",
            };
            error!("{}", err);
            return Err(err);
        }
        if matches!(strategy, Strategy::Instance(_)) && finalizer.is_some() {
            let err = RegisterErrorKind::InvalidArgument {
                type_info,
                reason: "fixed instances carry no teardown",
            };
            error!("{}", err);
            return Err(err);
        }

        let (key, upcast) = match config.alias_as {
            Some(alias) if alias != type_info => match interfaces.upcast_for(&alias) {
                Some(upcast) => (alias, Some(upcast)),
                None => {
                    let err = RegisterErrorKind::InvalidArgument {
                        type_info,
                        reason: "alias is not a declared interface",
                    };
                    error!("{}", err);
                    return Err(err);
                }
            },
            _ => (type_info, None),
        };

        let factory = Arc::new(Factory::new(type_info, strategy, config.singleton, finalizer));
        let owner = Arc::downgrade(&self.inner);

        let took_effect = self.inner.registry.insert(
            key,
            Binding::new(key, config.priority, factory.clone(), upcast, owner.clone()),
        );
        if config.include_base {
            for (interface, upcast) in interfaces.upcasts {
                if interface == key {
                    continue;
                }
                self.inner.registry.insert(
                    interface,
                    Binding::new(interface, config.priority, factory.clone(), Some(upcast), owner.clone()),
                );
                debug!(interface = interface.name, "Propagated to interface");
            }
        }

        debug!(key = key.name, took_effect, singleton = factory.is_singleton(), "Registered");
        Ok(took_effect)
    }

    /// Binds `T` for construction from its declared constructors.
    ///
    /// # Errors
    /// See [`Self::register`].
    #[inline]
    pub fn register_type<T: Constructible>(&self, config: Config) -> Result<bool, RegisterErrorKind> {
        self.register(Registration::<T>::reflective().with_config(config))
    }

    /// Registers every entry of the manifest, in order. Returns how many primary bindings took effect.
    ///
    /// # Errors
    /// Stops at the first entry that fails to register.
    pub fn load_manifest(&self, manifest: &Manifest) -> Result<usize, RegisterErrorKind> {
        let span = info_span!("load_manifest", entries = manifest.len());
        let _guard = span.enter();

        let mut took_effect = 0;
        for entry in manifest.entries() {
            if entry.register(self)? {
                took_effect += 1;
            }
        }

        debug!(took_effect, "Manifest loaded");
        Ok(took_effect)
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Disposes the container, logging failures instead of returning them.
    pub fn dispose(&self) {
        if let Err(failure) = self.inner.try_dispose() {
            warn!("{}", failure);
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn child_of(parent: Weak<dyn Lookup>, cache_from_parent: bool) -> Self {
        Self {
            inner: ContainerInner::new(Some(parent), cache_from_parent),
        }
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for Container {
    #[inline]
    fn contains_key(&self, type_info: &TypeInfo, include_parent: bool) -> Result<bool, ResolveErrorKind> {
        self.inner.contains_key(type_info, include_parent)
    }

    fn try_lookup_key(&self, type_info: &TypeInfo) -> Result<Option<Binding>, ResolveErrorKind> {
        let span = info_span!("lookup", dependency = type_info.name);
        let _guard = span.enter();

        self.inner.try_lookup_key(type_info)
    }

    fn get_singleton_instance<T>(&self) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_info = TypeInfo::of::<T>();

        let span = info_span!("get_singleton_instance", dependency = type_info.name);
        let _guard = span.enter();

        expect_singleton(type_info, self.inner.singleton_instance(&type_info)?)
    }

    fn create_session(&self) -> Result<Scope, ResolveErrorKind> {
        self.inner.ensure_active(&TypeInfo::of::<Scope>())?;
        Ok(Scope::new(Arc::downgrade(&self.inner) as Weak<dyn Lookup>))
    }
}

impl Dispose for Container {
    #[inline]
    fn try_dispose(&self) -> Result<(), AggregateDisposalFailure> {
        self.inner.try_dispose()
    }
}

/// Builder of a child container
/// ## Options
/// - `cache_from_parent`:
///   If `true`, bindings found in the parent chain are memoized locally.
///   Memoized bindings never defeat a later registration on the child.
pub struct ChildContainerBuilder {
    parent: Weak<dyn Lookup>,
    cache_from_parent: bool,
}

impl ChildContainerBuilder {
    #[inline]
    #[must_use]
    pub(crate) fn new(parent: Weak<dyn Lookup>) -> Self {
        Self {
            parent,
            cache_from_parent: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn cache_from_parent(mut self, cache_from_parent: bool) -> Self {
        self.cache_from_parent = cache_from_parent;
        self
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> Container {
        Container::child_of(self.parent, self.cache_from_parent)
    }
}

pub(crate) struct ContainerInner {
    registry: Registry,
    parent: Option<Weak<dyn Lookup>>,
    cache_from_parent: bool,
    singletons: RwLock<BTreeMap<FactoryId, Instance>>,
    disposables: DisposalStack,
    disposed: AtomicBool,
}

impl ContainerInner {
    fn new(parent: Option<Weak<dyn Lookup>>, cache_from_parent: bool) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let registry = Registry::new();
            let type_info = TypeInfo::of::<Container>();
            registry.insert(
                type_info,
                Binding::new(type_info, 0, Arc::new(Factory::self_handle(this.clone())), None, this.clone()),
            );

            Self {
                registry,
                parent,
                cache_from_parent,
                singletons: RwLock::new(BTreeMap::new()),
                disposables: DisposalStack::new(),
                disposed: AtomicBool::new(false),
            }
        })
    }

    #[inline]
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_active(&self, type_info: &TypeInfo) -> Result<(), ResolveErrorKind> {
        if self.is_disposed() {
            let err = ResolveErrorKind::Disposed {
                type_info: *type_info,
                unit: "container",
            };
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    /// The parent, if this container has one. A parent that's gone is reported as disposed.
    fn parent(&self, type_info: &TypeInfo) -> Result<Option<Arc<dyn Lookup>>, ResolveErrorKind> {
        let Some(parent) = &self.parent else {
            return Ok(None);
        };
        match parent.upgrade() {
            Some(parent) => Ok(Some(parent)),
            None => {
                let err = ResolveErrorKind::Disposed {
                    type_info: *type_info,
                    unit: "parent container",
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Tracks a disposable for container teardown. If the container got disposed meanwhile, tears it down now.
    fn track(&self, disposable: Arc<dyn Dispose>, type_info: &TypeInfo) -> Result<(), ResolveErrorKind> {
        if let Err(rejected) = self.disposables.push(disposable) {
            if let Err(failure) = rejected.try_dispose() {
                warn!("{}", failure);
            }
            let err = ResolveErrorKind::Disposed {
                type_info: *type_info,
                unit: "container",
            };
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Gets the singleton built by `factory`, building it in a private scope on first access.
    ///
    /// The cache slot belongs to the registration: keys propagated from it share the value, a replacing
    /// registration gets its own.
    ///
    /// Concurrent first accesses may build more than once: the first cached result wins and the others are torn down.
    pub(crate) fn singleton_of(self: &Arc<Self>, factory: &Factory) -> Result<Instance, ResolveErrorKind> {
        if let Some(fixed) = factory.fixed() {
            return fixed;
        }

        let id = factory.id();
        let type_info = factory.type_info();

        let span = info_span!("singleton", dependency = type_info.name);
        let _guard = span.enter();

        self.ensure_active(&type_info)?;

        if let Some(instance) = self.singletons.read().get(&id) {
            debug!("Found in singleton cache");
            return Ok(instance.clone());
        }
        debug!("Not found in singleton cache");

        let session = Scope::new(Arc::downgrade(self) as Weak<dyn Lookup>);
        let (instance, teardown) = match factory.construct(&session) {
            Ok(constructed) => constructed,
            Err(err) => {
                session.dispose();
                return Err(err);
            }
        };

        let existing = match self.singletons.write().entry(id) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(instance.clone());
                None
            }
        };
        if let Some(existing) = existing {
            debug!("Lost construction race, discarding");
            discard(teardown);
            session.dispose();
            return Ok(existing);
        }

        // Construction scope first: LIFO tears the singleton down before its dependencies
        if let Err(err) = self.track(Arc::new(session), &type_info) {
            discard(teardown);
            self.singletons.write().remove(&id);
            return Err(err);
        }
        if teardown.is_some() {
            self.track(Arc::new(TeardownCell::new("singleton", teardown)), &type_info)?;
            debug!("Pushed to disposal stack");
        }

        debug!("Cached");
        Ok(instance)
    }

    /// Singleton lookup: a genuine local binding is built here, anything else is the parent's call.
    pub(crate) fn singleton_instance(self: &Arc<Self>, type_info: &TypeInfo) -> Result<Option<Instance>, ResolveErrorKind> {
        self.ensure_active(type_info)?;

        if let Some(binding) = self.registry.get_genuine(type_info) {
            let instance = self.singleton_of(&binding.factory)?;
            return binding.apply_upcast(Constructed::shared(instance)).map(|constructed| Some(constructed.instance));
        }

        match self.parent(type_info)? {
            Some(parent) => parent.try_singleton_instance(type_info),
            None => Ok(None),
        }
    }

    pub(crate) fn try_dispose(&self) -> Result<(), AggregateDisposalFailure> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(DisposeErrorKind::AlreadyDisposed { unit: "container" }.into());
        }

        let span = info_span!("dispose", unit = "container");
        let _guard = span.enter();

        let result = self.disposables.drain();

        let singletons = mem::take(&mut *self.singletons.write());
        debug!(singletons = singletons.len(), bindings = self.registry.len(), "Releasing");
        drop(singletons);
        self.registry.clear();

        match &result {
            Ok(()) => debug!("Container disposed"),
            Err(failure) => error!("{}", failure),
        }
        result
    }
}

impl Lookup for ContainerInner {
    fn contains_key(&self, type_info: &TypeInfo, include_parent: bool) -> Result<bool, ResolveErrorKind> {
        self.ensure_active(type_info)?;

        if self.registry.contains_genuine(type_info) {
            return Ok(true);
        }
        if !include_parent {
            return Ok(false);
        }
        // Memoized from the parent
        if self.registry.contains(type_info) {
            return Ok(true);
        }
        match self.parent(type_info)? {
            Some(parent) => parent.contains_key(type_info, true),
            None => Ok(false),
        }
    }

    fn try_lookup_key(&self, type_info: &TypeInfo) -> Result<Option<Binding>, ResolveErrorKind> {
        self.ensure_active(type_info)?;

        if let Some(binding) = self.registry.get(type_info) {
            debug!("Found in registry");
            return Ok(Some(binding));
        }

        let Some(parent) = self.parent(type_info)? else {
            return Ok(None);
        };
        let Some(binding) = parent.try_lookup_key(type_info)? else {
            return Ok(None);
        };
        debug!("Found in parent");

        if self.cache_from_parent {
            self.registry.insert_inherited(*type_info, binding.clone());
        }
        Ok(Some(binding))
    }

    #[inline]
    fn try_singleton_instance(self: Arc<Self>, type_info: &TypeInfo) -> Result<Option<Instance>, ResolveErrorKind> {
        self.singleton_instance(type_info)
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if self.is_disposed() {
            return;
        }
        if let Err(failure) = self.try_dispose() {
            warn!("{}", failure);
        }
        debug!("Container disposed on drop");
    }
}
