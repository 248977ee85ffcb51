use alloc::{
    boxed::Box,
    sync::{Arc, Weak},
    vec::Vec,
};
use core::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, warn};

use crate::{
    any::{Instance, TypeInfo},
    container::{Container, ContainerInner},
    dispose::{Dispose, Teardown, TeardownCell},
    errors::{AggregateDisposalFailure, InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    finalizer::{bind_finalizer, BoxedFinalizer},
    instantiator::{BoxedInstantiator, Constructor},
    scope::Scope,
    service::{service_fn, BoxService, Service as _},
};

pub(crate) type BoxedProvider = BoxService<Scope, (Instance, Option<Teardown>), InstantiateErrorKind>;

pub(crate) struct ErasedConstructor {
    parameters: Vec<TypeInfo>,
    instantiator: BoxedInstantiator<Instance>,
}

impl ErasedConstructor {
    pub(crate) fn new<T: Send + Sync + 'static>(constructor: Constructor<T>) -> Self {
        let Constructor { parameters, instantiator } = constructor;
        Self {
            parameters,
            instantiator: BoxService::new(service_fn(move |scope: Scope| {
                instantiator.call(scope).map(|value| Instance::new(Arc::new(value)))
            })),
        }
    }

    /// All-or-nothing: no parameter is resolved unless every one of them can be.
    fn is_resolvable(&self, scope: &Scope) -> Result<bool, ResolveErrorKind> {
        for parameter in &self.parameters {
            if !scope.contains_key(parameter, true)? {
                debug!(parameter = parameter.name, "Parameter not resolvable");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub(crate) enum Strategy {
    /// Pre-built value, owned by whoever registered it
    Instance(Instance),
    /// The owning container itself
    SelfHandle(Weak<ContainerInner>),
    Provider(BoxedProvider),
    Constructors(Vec<ErasedConstructor>),
}

/// A value built by a factory, before it's handed to the resolving scope.
pub(crate) struct Constructed {
    pub(crate) instance: Instance,
    pub(crate) teardown: Option<Teardown>,
    pub(crate) is_singleton: bool,
}

impl Constructed {
    #[inline]
    pub(crate) const fn shared(instance: Instance) -> Self {
        Self {
            instance,
            teardown: None,
            is_singleton: true,
        }
    }
}

static NEXT_FACTORY_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of one registration. Singleton caches are keyed by it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct FactoryId(usize);

/// Building strategy of one registration, shared by every key it's bound under.
pub(crate) struct Factory {
    id: FactoryId,
    type_info: TypeInfo,
    strategy: Strategy,
    singleton: bool,
    finalizer: Option<BoxedFinalizer>,
}

impl Factory {
    #[inline]
    #[must_use]
    pub(crate) fn new(type_info: TypeInfo, strategy: Strategy, singleton: bool, finalizer: Option<BoxedFinalizer>) -> Self {
        Self {
            id: FactoryId(NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed)),
            type_info,
            strategy,
            singleton,
            finalizer,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn self_handle(inner: Weak<ContainerInner>) -> Self {
        Self::new(TypeInfo::of::<Container>(), Strategy::SelfHandle(inner), true, None)
    }

    #[inline]
    #[must_use]
    pub(crate) const fn id(&self) -> FactoryId {
        self.id
    }

    #[inline]
    #[must_use]
    pub(crate) const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub(crate) const fn is_singleton(&self) -> bool {
        self.singleton || matches!(self.strategy, Strategy::Instance(_) | Strategy::SelfHandle(_))
    }

    /// Values that exist outside of any cache: registered instances and the container handle.
    pub(crate) fn fixed(&self) -> Option<Result<Instance, ResolveErrorKind>> {
        match &self.strategy {
            Strategy::Instance(instance) => Some(Ok(instance.clone())),
            Strategy::SelfHandle(inner) => Some(self.container_handle(inner)),
            Strategy::Provider(_) | Strategy::Constructors(_) => None,
        }
    }

    fn container_handle(&self, inner: &Weak<ContainerInner>) -> Result<Instance, ResolveErrorKind> {
        match inner.upgrade() {
            Some(inner) => Ok(Instance::new(Arc::new(Container { inner }))),
            None => Err(ResolveErrorKind::Disposed {
                type_info: self.type_info,
                unit: "container",
            }),
        }
    }

    /// Gets a value for `scope`: singletons come from the owning container's cache, everything else is built anew.
    pub(crate) fn create(&self, scope: &Scope, owner: &Weak<ContainerInner>) -> Result<Constructed, ResolveErrorKind> {
        if let Some(fixed) = self.fixed() {
            return fixed.map(Constructed::shared);
        }
        if self.singleton {
            let Some(owner) = owner.upgrade() else {
                let err = ResolveErrorKind::Disposed {
                    type_info: self.type_info,
                    unit: "container",
                };
                error!("{}", err);
                return Err(err);
            };
            return owner.singleton_of(self).map(Constructed::shared);
        }

        let (instance, teardown) = self.construct(scope)?;
        Ok(Constructed {
            instance,
            teardown,
            is_singleton: false,
        })
    }

    /// Builds a new value, binding the finalizer to it.
    pub(crate) fn construct(&self, scope: &Scope) -> Result<(Instance, Option<Teardown>), ResolveErrorKind> {
        let (instance, teardown) = match &self.strategy {
            Strategy::Instance(instance) => return Ok((instance.clone(), None)),
            Strategy::SelfHandle(inner) => return self.container_handle(inner).map(|instance| (instance, None)),
            Strategy::Provider(provider) => match provider.call(scope.clone()) {
                Ok(constructed) => constructed,
                Err(err) => {
                    error!("{}", err);
                    return Err(ResolveErrorKind::Instantiator(InstantiatorErrorKind::Factory(err)));
                }
            },
            Strategy::Constructors(constructors) => (self.construct_with(constructors, scope)?, None),
        };

        let teardown = match &self.finalizer {
            Some(finalizer) => Teardown::chain_optional(Some(bind_finalizer(finalizer, &instance)), teardown),
            None => teardown,
        };
        Ok((instance, teardown))
    }

    fn construct_with(&self, constructors: &[ErasedConstructor], scope: &Scope) -> Result<Instance, ResolveErrorKind> {
        let mut selected = None;
        for constructor in constructors {
            if constructor.is_resolvable(scope)? {
                selected = Some(constructor);
                break;
            }
            debug!(arity = constructor.parameters.len(), "Constructor skipped");
        }
        let Some(constructor) = selected else {
            let err = ResolveErrorKind::NoConstructorResolvable { type_info: self.type_info };
            error!("{}", err);
            return Err(err);
        };

        match constructor.instantiator.call(scope.clone()) {
            Ok(instance) => Ok(instance),
            Err(InstantiatorErrorKind::Deps(err)) => {
                error!("{}", err);
                Err(ResolveErrorKind::Instantiator(InstantiatorErrorKind::Deps(Box::new(err))))
            }
            Err(InstantiatorErrorKind::Factory(err)) => {
                error!("{}", err);
                Err(ResolveErrorKind::Instantiator(InstantiatorErrorKind::Factory(err)))
            }
        }
    }
}

/// A value produced for one resolution, with the teardown its scope owns.
///
/// Singletons carry no teardown here: their container tears them down.
pub struct ResolvedItem {
    type_info: TypeInfo,
    instance: Instance,
    is_singleton: bool,
    teardown: TeardownCell,
}

impl ResolvedItem {
    pub(crate) fn new(type_info: TypeInfo, constructed: Constructed) -> Self {
        let Constructed {
            instance,
            teardown,
            is_singleton,
        } = constructed;
        Self {
            type_info,
            instance,
            is_singleton,
            teardown: TeardownCell::new("resolved item", teardown),
        }
    }

    /// The value viewed as `T`, if that's what it is.
    #[inline]
    #[must_use]
    pub fn value<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.instance.downcast()
    }

    #[inline]
    #[must_use]
    pub const fn is_singleton(&self) -> bool {
        self.is_singleton
    }

    /// Key the item was resolved under.
    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    pub(crate) const fn instance(&self) -> &Instance {
        &self.instance
    }
}

impl Dispose for ResolvedItem {
    fn try_dispose(&self) -> Result<(), AggregateDisposalFailure> {
        self.teardown.try_dispose()
    }
}

/// Runs a teardown whose value never reached a scope.
pub(crate) fn discard(teardown: Option<Teardown>) {
    if let Some(teardown) = teardown {
        if let Err(failure) = teardown.run() {
            warn!("{}", failure);
        }
    }
}
