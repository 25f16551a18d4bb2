//! Instance lifetime scopes and the singleton cache.
//!
//! Scopes determine how long a resolved bean lives:
//! - [`BeanScope::Singleton`] — one shared instance for the container lifetime
//! - [`BeanScope::Prototype`] — new instance on every request
//!
//! Singleton slots are per-definition [`OnceCell`]s held in a [`DashMap`]:
//! concurrent first requests for the same uncached singleton serialize on
//! the cell and observe exactly one construction.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::trace;

use crate::container::ContainerCore;
use crate::definition::BeanDefinition;
use crate::error::Result;
use crate::lifecycle::ResolvedInstance;
use crate::resolver::ConstructionStack;

/// Defines the lifetime of a bean within the container.
///
/// # Examples
/// ```
/// use weft_container::scope::BeanScope;
///
/// assert!(BeanScope::Singleton.is_singleton());
/// assert!(!BeanScope::Prototype.is_singleton());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BeanScope {
    /// One instance shared across the entire container.
    ///
    /// Created eagerly at bootstrap unless the definition is lazy,
    /// cached until the container shuts down, destroyed in reverse
    /// creation order.
    #[default]
    Singleton,

    /// New instance created on every request.
    ///
    /// Never cached and never tracked for teardown; the caller owns it.
    Prototype,
}

impl BeanScope {
    /// Returns `true` if this scope caches and shares one instance.
    #[inline]
    pub fn is_singleton(&self) -> bool {
        matches!(self, BeanScope::Singleton)
    }
}

impl fmt::Display for BeanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanScope::Singleton => write!(f, "Singleton"),
            BeanScope::Prototype => write!(f, "Prototype"),
        }
    }
}

/// Per-definition singleton slots.
///
/// The slot is looked up (or created) under the map's shard lock, but
/// construction itself runs on the [`OnceCell`] after the shard lock is
/// released, so unrelated singletons never serialize on each other.
#[derive(Default)]
pub(crate) struct SingletonCache {
    slots: DashMap<String, Arc<OnceCell<ResolvedInstance>>>,
}

impl SingletonCache {
    pub(crate) fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    pub(crate) fn slot(&self, id: &str) -> Arc<OnceCell<ResolvedInstance>> {
        self.slots
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }
}

impl ContainerCore {
    /// Acquires an instance for a definition, honoring its scope.
    ///
    /// The construction stack is entered before the singleton slot is
    /// touched, so a cycle is reported as [`CircularDependencyError`]
    /// instead of deadlocking on the cell.
    ///
    /// [`CircularDependencyError`]: crate::error::CircularDependencyError
    pub(crate) fn acquire(
        &self,
        definition: &Arc<BeanDefinition>,
        stack: &mut ConstructionStack,
    ) -> Result<ResolvedInstance> {
        stack.enter(definition.id())?;
        let result = self.acquire_in_scope(definition, stack);
        stack.exit();
        result
    }

    fn acquire_in_scope(
        &self,
        definition: &Arc<BeanDefinition>,
        stack: &mut ConstructionStack,
    ) -> Result<ResolvedInstance> {
        match definition.scope() {
            BeanScope::Singleton => {
                let slot = self.singletons.slot(definition.id());
                if let Some(cached) = slot.get() {
                    trace!(id = definition.id(), "Returning cached singleton");
                    return Ok(cached.clone());
                }
                slot.get_or_try_init(|| self.construct(definition, stack))
                    .cloned()
            }
            BeanScope::Prototype => self.construct(definition, stack),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_default_is_singleton() {
        assert_eq!(BeanScope::default(), BeanScope::Singleton);
    }

    #[test]
    fn scope_equality() {
        assert_eq!(BeanScope::Singleton, BeanScope::Singleton);
        assert_ne!(BeanScope::Singleton, BeanScope::Prototype);
    }

    #[test]
    fn scope_display() {
        assert_eq!(format!("{}", BeanScope::Singleton), "Singleton");
        assert_eq!(format!("{}", BeanScope::Prototype), "Prototype");
    }

    #[test]
    fn cache_returns_same_slot() {
        let cache = SingletonCache::new();
        let a = cache.slot("mailService");
        let b = cache.slot("mailService");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn cache_distinct_slots_per_id() {
        let cache = SingletonCache::new();
        let a = cache.slot("mailService");
        let b = cache.slot("userService");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
