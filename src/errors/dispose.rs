use alloc::vec::Vec;
use core::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum DisposeErrorKind {
    #[error("{unit} is already disposed")]
    AlreadyDisposed { unit: &'static str },
    #[error("Teardown of {type_info} failed: {error}")]
    Teardown { type_info: TypeInfo, error: anyhow::Error },
}

/// Every failure collected during one dispose sweep.
#[derive(thiserror::Error, Debug, Default)]
pub struct AggregateDisposalFailure {
    pub errors: Vec<DisposeErrorKind>,
}

impl AggregateDisposalFailure {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    #[inline]
    pub fn push(&mut self, error: DisposeErrorKind) {
        self.errors.push(error);
    }

    #[inline]
    pub fn extend(&mut self, other: AggregateDisposalFailure) {
        self.errors.extend(other.errors);
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok` when nothing was collected.
    #[inline]
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<DisposeErrorKind> for AggregateDisposalFailure {
    fn from(error: DisposeErrorKind) -> Self {
        Self { errors: alloc::vec![error] }
    }
}

impl Display for AggregateDisposalFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} disposal failure(s)", self.errors.len())?;
        for (index, error) in self.errors.iter().enumerate() {
            write!(f, "{}{error}", if index == 0 { ": " } else { "; " })?;
        }
        Ok(())
    }
}
