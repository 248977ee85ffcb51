use alloc::sync::Arc;

use crate::{
    any::{Instance, TypeInfo},
    dispose::{Dispose, Teardown},
    service::{service_fn, BoxService, Service as _},
};

/// User teardown for a resolved value.
///
/// Runs at most once, when the unit that owns the value (its scope, or the container for singletons) is disposed.
pub trait Finalizer<Dep: ?Sized>: Send + Sync + 'static {
    #[allow(clippy::missing_errors_doc)]
    fn finalize(&self, dependency: Arc<Dep>) -> anyhow::Result<()>;
}

impl<F, Dep> Finalizer<Dep> for F
where
    F: Fn(Arc<Dep>) -> anyhow::Result<()> + Send + Sync + 'static,
    Dep: ?Sized,
{
    #[inline]
    fn finalize(&self, dependency: Arc<Dep>) -> anyhow::Result<()> {
        self(dependency)
    }
}

pub(crate) type BoxedFinalizer = BoxService<Instance, (), anyhow::Error>;

#[must_use]
pub(crate) fn boxed_finalizer_factory<Dep, Fin>(finalizer: Fin) -> BoxedFinalizer
where
    Dep: ?Sized + Send + Sync + 'static,
    Fin: Finalizer<Dep>,
{
    BoxService::new(service_fn(move |instance: Instance| {
        let Some(dependency) = instance.downcast::<Dep>() else {
            return Err(anyhow::anyhow!(
                "finalizer of {} got a value of {}",
                TypeInfo::of::<Dep>(),
                instance.type_info()
            ));
        };
        finalizer.finalize(dependency)
    }))
}

/// Finalizer that forwards to the value's own [`Dispose`] impl.
#[must_use]
pub(crate) fn boxed_dispose_finalizer<Dep>() -> BoxedFinalizer
where
    Dep: Dispose + 'static,
{
    boxed_finalizer_factory(|dependency: Arc<Dep>| dependency.try_dispose().map_err(anyhow::Error::new))
}

/// Binds the finalizer to the concrete value it must tear down.
#[must_use]
pub(crate) fn bind_finalizer(finalizer: &BoxedFinalizer, instance: &Instance) -> Teardown {
    let finalizer = finalizer.clone();
    let instance = instance.clone();
    Teardown::with_type_info(instance.type_info(), move || finalizer.call(instance))
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{bind_finalizer, boxed_dispose_finalizer, boxed_finalizer_factory};
    use crate::{
        any::Instance,
        dispose::Dispose,
        errors::{AggregateDisposalFailure, DisposeErrorKind},
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
    };
    use core::sync::atomic::{AtomicU8, Ordering};
    use tracing::debug;
    use tracing_test::traced_test;

    struct Connection(u8);

    #[test]
    #[traced_test]
    fn test_bound_finalizer_gets_value() {
        let finalizer_call_count = Arc::new(AtomicU8::new(0));
        let finalizer = boxed_finalizer_factory({
            let finalizer_call_count = finalizer_call_count.clone();
            move |connection: Arc<Connection>| {
                finalizer_call_count.fetch_add(connection.0, Ordering::SeqCst);

                debug!("Finalizer called");
                Ok(())
            }
        });

        let teardown = bind_finalizer(&finalizer, &Instance::new(Arc::new(Connection(3))));
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 0);

        teardown.run().unwrap();
        assert_eq!(finalizer_call_count.load(Ordering::SeqCst), 3);
    }

    #[test]
    #[traced_test]
    fn test_finalizer_with_wrong_value_fails() {
        let finalizer = boxed_finalizer_factory(|_: Arc<Connection>| Ok(()));

        let failure = bind_finalizer(&finalizer, &Instance::new(Arc::new(1u8))).run().unwrap_err();
        assert!(matches!(failure.errors[..], [DisposeErrorKind::Teardown { .. }]));
    }

    struct Pool(AtomicU8);

    impl Dispose for Pool {
        fn try_dispose(&self) -> Result<(), AggregateDisposalFailure> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    #[traced_test]
    fn test_dispose_finalizer() {
        let pool = Arc::new(Pool(AtomicU8::new(0)));

        bind_finalizer(&boxed_dispose_finalizer::<Pool>(), &Instance::new(pool.clone()))
            .run()
            .unwrap();

        assert_eq!(pool.0.load(Ordering::SeqCst), 1);
    }
}
