use alloc::{boxed::Box, collections::BTreeMap};

use crate::any::{Instance, TypeInfo};

pub(crate) type Map = BTreeMap<TypeInfo, Instance>;

/// Values a scope already resolved, by requested key.
#[derive(Default)]
pub(crate) struct Cache {
    map: Option<Box<Map>>,
}

impl Cache {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self { map: None }
    }

    #[must_use]
    pub(crate) fn get(&self, type_info: &TypeInfo) -> Option<Instance> {
        self.map.as_ref().and_then(|map| map.get(type_info)).cloned()
    }

    /// First writer wins: returns the value that ends up cached.
    pub(crate) fn get_or_insert(&mut self, type_info: TypeInfo, instance: Instance) -> Instance {
        self.map
            .get_or_insert_with(Box::default)
            .entry(type_info)
            .or_insert(instance)
            .clone()
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |map| map.len())
    }

    /// Releases the cached values.
    pub(crate) fn take(&mut self) -> Option<Box<Map>> {
        self.map.take()
    }
}
