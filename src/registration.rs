use alloc::{sync::Arc, vec::Vec};
use core::marker::PhantomData;

use crate::{
    any::{Instance, TypeInfo},
    config::Config,
    dispose::{Dispose, Teardown},
    errors::InstantiateErrorKind,
    factory::{ErasedConstructor, Strategy},
    finalizer::{boxed_dispose_finalizer, boxed_finalizer_factory, BoxedFinalizer, Finalizer},
    instantiator::{Constructible, Constructors},
    scope::Scope,
    service::{service_fn, BoxService},
};

pub(crate) type Upcast = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// Trait objects a type can be viewed as, each with its upcast.
pub struct Interfaces<T: ?Sized> {
    pub(crate) upcasts: Vec<(TypeInfo, Upcast)>,
    _marker: PhantomData<fn(Arc<T>)>,
}

impl<T: ?Sized + Send + Sync + 'static> Interfaces<T> {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            upcasts: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares `U` as an interface of `T`. Redeclaring `U` replaces its upcast.
    #[must_use]
    pub fn with<U>(mut self, upcast: fn(Arc<T>) -> Arc<U>) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
    {
        let type_info = TypeInfo::of::<U>();
        self.upcasts.retain(|(existing, _)| *existing != type_info);
        self.upcasts.push((
            type_info,
            Arc::new(move |instance: &Instance| instance.downcast::<T>().map(|value| Instance::new(upcast(value)))),
        ));
        self
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, type_info: &TypeInfo) -> bool {
        self.upcasts.iter().any(|(existing, _)| existing == type_info)
    }

    #[inline]
    pub fn type_infos(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.upcasts.iter().map(|(type_info, _)| *type_info)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.upcasts.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upcasts.is_empty()
    }

    pub(crate) fn upcast_for(&self, type_info: &TypeInfo) -> Option<Upcast> {
        self.upcasts
            .iter()
            .find(|(existing, _)| existing == type_info)
            .map(|(_, upcast)| upcast.clone())
    }

    fn append(&mut self, other: Interfaces<T>) {
        for (type_info, upcast) in other.upcasts {
            self.upcasts.retain(|(existing, _)| *existing != type_info);
            self.upcasts.push((type_info, upcast));
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for Interfaces<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Value returned by a provider, with the teardown it wants run when the value's owner is disposed.
pub struct Provided<T: ?Sized> {
    pub(crate) value: Arc<T>,
    pub(crate) teardown: Option<Teardown>,
}

impl<T: ?Sized> Provided<T> {
    #[inline]
    #[must_use]
    pub const fn new(value: Arc<T>) -> Self {
        Self { value, teardown: None }
    }

    #[inline]
    #[must_use]
    pub fn with_teardown(mut self, teardown: Teardown) -> Self {
        self.teardown = Teardown::chain_optional(self.teardown.take(), Some(teardown));
        self
    }
}

impl<T> From<T> for Provided<T> {
    #[inline]
    fn from(value: T) -> Self {
        Self::new(Arc::new(value))
    }
}

/// Everything one register call binds: how to build `T`, its lifetime, priority and interfaces.
///
/// # Examples
/// ```rust
/// use holdfast::{Container, Registration};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> &'static str;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> &'static str {
///         "hello"
///     }
/// }
///
/// let container = Container::new();
/// container
///     .register(
///         Registration::provider(|_| Ok(English))
///             .singleton()
///             .implements(|english| english as Arc<dyn Greeter>),
///     )
///     .unwrap();
/// ```
#[must_use]
pub struct Registration<T: ?Sized> {
    pub(crate) strategy: Strategy,
    pub(crate) finalizer: Option<BoxedFinalizer>,
    pub(crate) config: Config,
    pub(crate) interfaces: Interfaces<T>,
}

impl<T: ?Sized + Send + Sync + 'static> Registration<T> {
    /// Binds an existing value. It's always a singleton and its teardown stays with the caller.
    pub fn instance(value: Arc<T>) -> Self {
        Self::with_strategy(
            Strategy::Instance(Instance::new(value)),
            Config {
                singleton: true,
                ..Config::default()
            },
        )
    }

    pub fn provider_with_teardown<F>(provider: F) -> Self
    where
        F: Fn(&Scope) -> Result<Provided<T>, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self::with_strategy(
            Strategy::Provider(BoxService::new(service_fn(move |scope: Scope| match provider(&scope) {
                Ok(Provided { value, teardown }) => Ok((Instance::new(value), teardown)),
                Err(err) => Err(err),
            }))),
            Config::default(),
        )
    }

    fn with_strategy(strategy: Strategy, config: Config) -> Self {
        Self {
            strategy,
            finalizer: None,
            config,
            interfaces: Interfaces::new(),
        }
    }

    pub fn singleton(mut self) -> Self {
        self.config.singleton = true;
        self
    }

    pub fn transient(mut self) -> Self {
        self.config.singleton = false;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.config.priority = priority;
        self
    }

    pub fn include_base(mut self, include_base: bool) -> Self {
        self.config.include_base = include_base;
        self
    }

    /// Registers under `U` instead of `T`. `U` must be declared with [`Self::implements`].
    pub fn alias_as<U: ?Sized + 'static>(mut self) -> Self {
        self.config.alias_as = Some(TypeInfo::of::<U>());
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn implements<U>(mut self, upcast: fn(Arc<T>) -> Arc<U>) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
    {
        self.interfaces = self.interfaces.with(upcast);
        self
    }

    pub fn with_interfaces(mut self, interfaces: Interfaces<T>) -> Self {
        self.interfaces.append(interfaces);
        self
    }

    /// Runs `finalizer` on every value this registration builds, when the value's owner is disposed.
    pub fn finalizer<Fin: Finalizer<T>>(mut self, finalizer: Fin) -> Self {
        self.finalizer = Some(boxed_finalizer_factory(finalizer));
        self
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> Config {
        self.config
    }

    #[inline]
    #[must_use]
    pub fn interfaces(&self) -> &Interfaces<T> {
        &self.interfaces
    }
}

impl<T: Send + Sync + 'static> Registration<T> {
    pub fn value(value: T) -> Self {
        Self::instance(Arc::new(value))
    }

    pub fn provider<F>(provider: F) -> Self
    where
        F: Fn(&Scope) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self::provider_with_teardown(move |scope| provider(scope).map(Provided::from))
    }

    pub fn constructed(constructors: Constructors<T>) -> Self {
        let constructors = constructors.items.into_iter().map(ErasedConstructor::new).collect();
        Self::with_strategy(Strategy::Constructors(constructors), Config::default())
    }

    /// Tears values down through their own [`Dispose`] impl.
    pub fn disposable(mut self) -> Self
    where
        T: Dispose,
    {
        self.finalizer = Some(boxed_dispose_finalizer::<T>());
        self
    }
}

impl<T: Constructible> Registration<T> {
    /// Builds `T` from its declared constructors, reachable under its declared interfaces.
    pub fn reflective() -> Self {
        Self::constructed(T::constructors()).with_interfaces(T::interfaces())
    }
}
