use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::{
    mem,
    sync::atomic::{AtomicBool, Ordering},
};
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    any::TypeInfo,
    errors::{AggregateDisposalFailure, DisposeErrorKind},
};

/// Something a scope or container tears down when it is disposed.
///
/// A second call on the same unit must report [`DisposeErrorKind::AlreadyDisposed`] instead of running teardown again.
pub trait Dispose: Send + Sync {
    #[allow(clippy::missing_errors_doc)]
    fn try_dispose(&self) -> Result<(), AggregateDisposalFailure>;
}

impl<T: Dispose + ?Sized> Dispose for Arc<T> {
    #[inline]
    fn try_dispose(&self) -> Result<(), AggregateDisposalFailure> {
        (**self).try_dispose()
    }
}

/// Disposes every item in order, even after failures, and returns all failures at once.
///
/// # Errors
/// Returns the collected failures if at least one item failed.
pub fn dispose_all<I>(disposables: I) -> Result<(), AggregateDisposalFailure>
where
    I: IntoIterator,
    I::Item: Dispose,
{
    let mut failure = AggregateDisposalFailure::new();
    for disposable in disposables {
        if let Err(err) = disposable.try_dispose() {
            failure.extend(err);
        }
    }
    failure.into_result()
}

type TeardownAction = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// One-shot teardown actions bound to a resolved value.
///
/// Actions run in the order they were chained and all of them run, whatever fails before.
#[must_use]
pub struct Teardown {
    actions: Vec<(TypeInfo, TeardownAction)>,
}

impl Teardown {
    #[inline]
    pub fn new<T, F>(action: F) -> Self
    where
        T: ?Sized + 'static,
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self::with_type_info(TypeInfo::of::<T>(), action)
    }

    #[inline]
    pub fn with_type_info<F>(type_info: TypeInfo, action: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            actions: alloc::vec![(type_info, Box::new(action) as TeardownAction)],
        }
    }

    #[inline]
    pub fn chain(mut self, mut next: Teardown) -> Self {
        self.actions.append(&mut next.actions);
        self
    }

    pub(crate) fn chain_optional(first: Option<Teardown>, second: Option<Teardown>) -> Option<Teardown> {
        match (first, second) {
            (Some(first), Some(second)) => Some(first.chain(second)),
            (first, None) => first,
            (None, second) => second,
        }
    }

    pub(crate) fn run(self) -> Result<(), AggregateDisposalFailure> {
        let mut failure = AggregateDisposalFailure::new();
        for (type_info, action) in self.actions {
            match action() {
                Ok(()) => debug!(dependency = type_info.name, "Teardown called"),
                Err(error) => failure.push(DisposeErrorKind::Teardown { type_info, error }),
            }
        }
        failure.into_result()
    }
}

/// A teardown that can be taken exactly once.
pub(crate) struct TeardownCell {
    unit: &'static str,
    disposed: AtomicBool,
    teardown: Mutex<Option<Teardown>>,
}

impl TeardownCell {
    #[inline]
    #[must_use]
    pub(crate) fn new(unit: &'static str, teardown: Option<Teardown>) -> Self {
        Self {
            unit,
            disposed: AtomicBool::new(false),
            teardown: Mutex::new(teardown),
        }
    }
}

impl Dispose for TeardownCell {
    fn try_dispose(&self) -> Result<(), AggregateDisposalFailure> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(DisposeErrorKind::AlreadyDisposed { unit: self.unit }.into());
        }
        match self.teardown.lock().take() {
            Some(teardown) => teardown.run(),
            None => Ok(()),
        }
    }
}

struct StackState {
    entries: Vec<Arc<dyn Dispose>>,
    closed: bool,
}

/// LIFO record of owned disposables.
///
/// Once drained the stack is closed: later pushes are rejected and handed back, so the pusher
/// tears the item down itself and nothing is torn down twice or leaked.
pub(crate) struct DisposalStack {
    state: Mutex<StackState>,
}

impl DisposalStack {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(StackState {
                entries: Vec::new(),
                closed: false,
            }),
        }
    }

    pub(crate) fn push(&self, disposable: Arc<dyn Dispose>) -> Result<(), Arc<dyn Dispose>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(disposable);
        }
        state.entries.push(disposable);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Closes the stack and disposes every entry, most recent first.
    pub(crate) fn drain(&self) -> Result<(), AggregateDisposalFailure> {
        let entries = {
            let mut state = self.state.lock();
            state.closed = true;
            mem::take(&mut state.entries)
        };
        debug!(count = entries.len(), "Draining disposal stack");

        dispose_all(entries.into_iter().rev())
    }
}
