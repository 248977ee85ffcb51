mod container;
mod dependency_resolver;
mod dispose;
mod instantiate;
mod instantiator;

pub use container::RegisterErrorKind;
pub use dependency_resolver::ResolveErrorKind;
pub use dispose::{AggregateDisposalFailure, DisposeErrorKind};
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;
