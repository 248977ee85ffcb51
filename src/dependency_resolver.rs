use alloc::vec::Vec;

use crate::{any::TypeInfo, errors::ResolveErrorKind, scope::Scope};

pub trait DependencyResolver: Sized {
    type Error: Into<ResolveErrorKind>;

    #[allow(clippy::missing_errors_doc)]
    fn resolve(scope: &Scope) -> Result<Self, Self::Error>;

    /// Keys that must be resolvable before [`Self::resolve`] is attempted.
    #[must_use]
    fn parameters() -> Vec<TypeInfo>;
}

/// The scope doing the resolution.
impl DependencyResolver for Scope {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(scope: &Scope) -> Result<Self, Self::Error> {
        Ok(scope.clone())
    }

    #[inline]
    fn parameters() -> Vec<TypeInfo> {
        Vec::new()
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ResolveErrorKind;

            #[inline]
            #[allow(unused_variables)]
            fn resolve(scope: &Scope) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(scope).map_err(Into::into)?,)*))
            }

            fn parameters() -> Vec<TypeInfo> {
                let mut parameters = Vec::new();
                $( parameters.extend($ty::parameters()); )*
                parameters
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
