#![no_std]

extern crate alloc;

#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod cache;
pub(crate) mod combined;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod dependency_resolver;
pub(crate) mod dispose;
pub(crate) mod errors;
pub(crate) mod factory;
pub(crate) mod finalizer;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod manifest;
pub(crate) mod registration;
pub(crate) mod registry;
pub(crate) mod resolver;
pub(crate) mod scope;
pub(crate) mod service;

pub use any::TypeInfo;
pub use combined::CombinedContainer;
pub use config::Config;
pub use container::{ChildContainerBuilder, Container};
pub use dependency_resolver::DependencyResolver;
pub use dispose::{dispose_all, Dispose, Teardown};
pub use errors::{
    AggregateDisposalFailure, DisposeErrorKind, InstantiateErrorKind, InstantiatorErrorKind, RegisterErrorKind,
    ResolveErrorKind,
};
pub use factory::ResolvedItem;
pub use finalizer::Finalizer;
pub use inject::Inject;
pub use instantiator::{Constructible, Constructor, Constructors, Instantiator};
pub use manifest::{Manifest, ManifestEntry};
pub use registration::{Interfaces, Provided, Registration};
pub use registry::Binding;
pub use resolver::Resolver;
pub use scope::Scope;

/// Alias kept for code that speaks of sessions rather than scopes.
pub type Session = Scope;
