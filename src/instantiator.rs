use alloc::vec::Vec;
use tracing::debug;

use crate::{
    any::TypeInfo,
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    registration::Interfaces,
    scope::Scope,
    service::{service_fn, BoxService},
};

pub trait Instantiator<Deps>: Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    #[allow(clippy::missing_errors_doc)]
    fn instantiate(&self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

pub(crate) type BoxedInstantiator<T> = BoxService<Scope, T, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>>;

/// One way to build `T`: the keys it needs and the function that builds it from them.
pub struct Constructor<T> {
    pub(crate) parameters: Vec<TypeInfo>,
    pub(crate) instantiator: BoxedInstantiator<T>,
}

impl<T: 'static> Constructor<T> {
    #[must_use]
    pub fn new<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = T, Error = InstantiateErrorKind>,
        Deps: DependencyResolver + 'static,
    {
        Self {
            parameters: Deps::parameters(),
            instantiator: BoxService::new(service_fn(move |scope: Scope| {
                let dependencies = match Deps::resolve(&scope) {
                    Ok(dependencies) => dependencies,
                    Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
                };
                let dependency = match instantiator.instantiate(dependencies) {
                    Ok(dependency) => dependency,
                    Err(err) => return Err(InstantiatorErrorKind::Factory(err)),
                };

                debug!("Instantiated");

                Ok(dependency)
            })),
        }
    }

    /// Keys this constructor resolves before it runs.
    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[TypeInfo] {
        &self.parameters
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// Candidate constructors of `T`, tried with the most parameters first.
pub struct Constructors<T> {
    pub(crate) items: Vec<Constructor<T>>,
}

impl<T: 'static> Constructors<T> {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    #[inline]
    #[must_use]
    pub fn with<Inst, Deps>(self, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = T, Error = InstantiateErrorKind>,
        Deps: DependencyResolver + 'static,
    {
        self.with_constructor(Constructor::new(instantiator))
    }

    #[must_use]
    pub fn with_constructor(mut self, constructor: Constructor<T>) -> Self {
        self.items.push(constructor);
        // Stable: constructors with equal arity keep declaration order
        self.items.sort_by(|a, b| b.arity().cmp(&a.arity()));
        self
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: 'static> Default for Constructors<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A type the container can build on its own, from declared constructors.
///
/// # Examples
/// ```rust
/// use holdfast::{Constructible, Constructors, Inject, Interfaces};
/// use std::sync::Arc;
///
/// trait Engine: Send + Sync {}
///
/// struct Piston;
/// struct Motor(Arc<Piston>);
///
/// impl Engine for Motor {}
///
/// impl Constructible for Motor {
///     fn constructors() -> Constructors<Self> {
///         Constructors::new().with(|Inject(piston): Inject<Piston>| Ok(Motor(piston)))
///     }
///
///     fn interfaces() -> Interfaces<Self> {
///         Interfaces::new().with(|motor| motor as Arc<dyn Engine>)
///     }
/// }
/// ```
pub trait Constructible: Sized + Send + Sync + 'static {
    fn constructors() -> Constructors<Self>;

    /// Trait objects this type is also reachable under when registered with base propagation.
    #[inline]
    #[must_use]
    fn interfaces() -> Interfaces<Self> {
        Interfaces::new()
    }
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Result<Response, Err> + Send + Sync + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);
