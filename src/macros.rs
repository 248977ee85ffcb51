macro_rules! all_the_tuples {
    ($name:ident) => {
        $name!([]);
        $name!([T1]);
        $name!([T1, T2]);
        $name!([T1, T2, T3]);
        $name!([T1, T2, T3, T4]);
        $name!([T1, T2, T3, T4, T5]);
        $name!([T1, T2, T3, T4, T5, T6]);
        $name!([T1, T2, T3, T4, T5, T6, T7]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12]);
    };
}

/// Builds a [`crate::Manifest`] of constructible types with their registration metadata.
///
/// # Syntax
/// ```text
/// manifest![Type [=> { field: value, ... }], ...]
/// ```
/// Fields are the ones of [`crate::Config`]; omitted fields keep their defaults.
///
/// # Examples
/// ```rust
/// use holdfast::{manifest, Constructible, Constructors};
///
/// struct Clock;
///
/// impl Constructible for Clock {
///     fn constructors() -> Constructors<Self> {
///         Constructors::new().with(|| Ok(Clock))
///     }
/// }
///
/// let manifest = manifest![Clock => { singleton: true, priority: 1 }];
/// assert_eq!(manifest.len(), 1);
/// ```
#[macro_export]
macro_rules! manifest {
    (
        $(
            $ty:ty $( => { $( $field:ident : $value:expr ),* $(,)? } )?
        ),* $(,)?
    ) => {{
        let manifest = $crate::Manifest::new();
        $(
            let manifest = manifest.entry::<$ty>({
                #[allow(unused_mut)]
                let mut config = $crate::Config::default();
                $( $( config.$field = $value; )* )?
                config
            });
        )*
        manifest
    }};
}
