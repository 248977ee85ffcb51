use alloc::vec::Vec;

use crate::{any::TypeInfo, config::Config, container::Container, errors::RegisterErrorKind, instantiator::Constructible};

type RegisterFn = fn(&Container, Config) -> Result<bool, RegisterErrorKind>;

/// A type to register by its declared constructors, with the config to register it under.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct ManifestEntry {
    type_info: TypeInfo,
    config: Config,
    register: RegisterFn,
}

impl ManifestEntry {
    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> Config {
        self.config
    }

    #[inline]
    pub(crate) fn register(&self, container: &Container) -> Result<bool, RegisterErrorKind> {
        (self.register)(container, self.config)
    }
}

fn register_entry<T: Constructible>(container: &Container, config: Config) -> Result<bool, RegisterErrorKind> {
    container.register_type::<T>(config)
}

/// Ordered list of types to bind in one go. Usually built with [`crate::manifest!`].
#[derive(Clone, Default)]
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    #[must_use]
    pub fn entry<T: Constructible>(mut self, config: Config) -> Self {
        self.entries.push(ManifestEntry {
            type_info: TypeInfo::of::<T>(),
            config,
            register: register_entry::<T>,
        });
        self
    }

    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
