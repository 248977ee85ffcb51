use alloc::{
    collections::{btree_map::Entry, BTreeMap},
    sync::{Arc, Weak},
};
use core::mem;
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::{
    any::TypeInfo,
    container::ContainerInner,
    errors::ResolveErrorKind,
    factory::{discard, Constructed, Factory, ResolvedItem},
    registration::Upcast,
    scope::Scope,
};

/// A key's entry in a container: the factory that builds it and the container that owns its singletons.
#[derive(Clone)]
pub struct Binding {
    pub(crate) type_info: TypeInfo,
    pub(crate) priority: i32,
    pub(crate) factory: Arc<Factory>,
    pub(crate) upcast: Option<Upcast>,
    pub(crate) owner: Weak<ContainerInner>,
    pub(crate) inherited: bool,
}

impl core::fmt::Debug for Binding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Binding")
            .field("type_info", &self.type_info)
            .field("priority", &self.priority)
            .field("inherited", &self.inherited)
            .finish_non_exhaustive()
    }
}

impl Binding {
    #[inline]
    #[must_use]
    pub(crate) fn new(type_info: TypeInfo, priority: i32, factory: Arc<Factory>, upcast: Option<Upcast>, owner: Weak<ContainerInner>) -> Self {
        Self {
            type_info,
            priority,
            factory,
            upcast,
            owner,
            inherited: false,
        }
    }

    /// Local copy of a parent's binding. Singletons stay with the parent.
    #[inline]
    #[must_use]
    pub(crate) fn inherit(&self) -> Self {
        Self {
            priority: 0,
            inherited: true,
            ..self.clone()
        }
    }

    /// Key this binding answers to.
    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// Type the factory builds, which differs from [`Self::type_info`] for interface bindings.
    #[inline]
    #[must_use]
    pub fn implementation(&self) -> TypeInfo {
        self.factory.type_info()
    }

    #[inline]
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    #[inline]
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.factory.is_singleton()
    }

    /// Produces a value for `scope`, viewed as this binding's key.
    ///
    /// The item isn't tracked anywhere; the caller owns its teardown.
    ///
    /// # Errors
    /// Returns an error if the factory fails, or if the owning container is gone.
    pub fn create(&self, scope: &Scope) -> Result<ResolvedItem, ResolveErrorKind> {
        let constructed = self.factory.create(scope, &self.owner)?;
        let constructed = self.apply_upcast(constructed)?;
        Ok(ResolvedItem::new(self.type_info, constructed))
    }

    pub(crate) fn apply_upcast(&self, constructed: Constructed) -> Result<Constructed, ResolveErrorKind> {
        let Some(upcast) = &self.upcast else {
            return Ok(constructed);
        };
        match upcast(&constructed.instance) {
            Some(instance) => Ok(Constructed { instance, ..constructed }),
            None => {
                let err = ResolveErrorKind::IncorrectType {
                    expected: self.type_info,
                    actual: constructed.instance.type_info(),
                };
                error!("{}", err);
                discard(constructed.teardown);
                Err(err)
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    bindings: RwLock<BTreeMap<TypeInfo, Binding>>,
}

impl Registry {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            bindings: RwLock::new(BTreeMap::new()),
        }
    }

    /// Binds `type_info` unless a genuine binding with higher priority is there. Inherited bindings always yield.
    pub(crate) fn insert(&self, type_info: TypeInfo, binding: Binding) -> bool {
        match self.bindings.write().entry(type_info) {
            Entry::Vacant(entry) => {
                entry.insert(binding);
                true
            }
            Entry::Occupied(mut entry) => {
                let existing = entry.get();
                if existing.inherited || binding.priority >= existing.priority {
                    entry.insert(binding);
                    true
                } else {
                    warn!(
                        dependency = type_info.name,
                        priority = binding.priority,
                        existing = existing.priority,
                        "Registration ignored: lower priority"
                    );
                    false
                }
            }
        }
    }

    pub(crate) fn insert_inherited(&self, type_info: TypeInfo, binding: Binding) {
        if let Entry::Vacant(entry) = self.bindings.write().entry(type_info) {
            entry.insert(binding.inherit());
            debug!(dependency = type_info.name, "Cached binding from parent");
        }
    }

    #[must_use]
    pub(crate) fn get(&self, type_info: &TypeInfo) -> Option<Binding> {
        self.bindings.read().get(type_info).cloned()
    }

    #[must_use]
    pub(crate) fn get_genuine(&self, type_info: &TypeInfo) -> Option<Binding> {
        self.bindings.read().get(type_info).filter(|binding| !binding.inherited).cloned()
    }

    /// Whether `type_info` is bound here by a registration of this container, not memoized from a parent.
    #[must_use]
    pub(crate) fn contains_genuine(&self, type_info: &TypeInfo) -> bool {
        self.bindings.read().get(type_info).is_some_and(|binding| !binding.inherited)
    }

    #[must_use]
    pub(crate) fn contains(&self, type_info: &TypeInfo) -> bool {
        self.bindings.read().contains_key(type_info)
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.bindings.read().len()
    }

    /// Drops every binding outside of the lock: factories may own values whose drop reenters a container.
    pub(crate) fn clear(&self) {
        let bindings = mem::take(&mut *self.bindings.write());
        drop(bindings);
    }
}
