//! Instance lifecycle — construction pipeline and teardown.
//!
//! Every bean moves through the same phases:
//!
//! ```text
//! Created → Injected → Initialized → Ready ⇢ Destroying → Destroyed
//! ```
//!
//! Construction (factory, value points, injection points, the
//! post-construct hook, capability casts) happens here; teardown runs
//! pre-destroy hooks over tracked singletons in reverse creation order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::container::ContainerCore;
use crate::definition::{BeanDefinition, DestroyHookFn, SharedInstance};
use crate::error::{ContainerError, Result};
use crate::key::CapabilityKey;
use crate::resolver::ConstructionStack;

/// Phase of a bean within its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Factory ran; fields hold factory defaults.
    Created,
    /// Value and dependency injection completed.
    Injected,
    /// Post-construct hook completed.
    Initialized,
    /// Frozen and shared; capability casts produced.
    Ready,
    /// Pre-destroy hook running.
    Destroying,
    /// Hook finished; instance dropped when the last clone goes.
    Destroyed,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            LifecyclePhase::Created => "Created",
            LifecyclePhase::Injected => "Injected",
            LifecyclePhase::Initialized => "Initialized",
            LifecyclePhase::Ready => "Ready",
            LifecyclePhase::Destroying => "Destroying",
            LifecyclePhase::Destroyed => "Destroyed",
        };
        f.write_str(phase)
    }
}

/// A fully constructed bean in its `Ready` phase.
///
/// Cheap to clone; the instance and its capability values are shared.
#[derive(Clone)]
pub(crate) struct ResolvedInstance {
    pub(crate) definition_id: Arc<str>,
    pub(crate) value: SharedInstance,
    pub(crate) capabilities: Arc<HashMap<CapabilityKey, SharedInstance>>,
    pub(crate) sequence: u64,
}

impl ResolvedInstance {
    pub(crate) fn definition_id(&self) -> &str {
        &self.definition_id
    }

    /// Returns the value for one declared capability, or `None` when
    /// the definition never declared it.
    pub(crate) fn capability<P: Clone + Send + Sync + 'static>(&self) -> Option<P> {
        self.capabilities
            .get(&CapabilityKey::of::<P>())
            .and_then(|value| value.downcast_ref::<P>())
            .cloned()
    }

    /// The stored concrete instance, for property accessors.
    pub(crate) fn raw_value(&self) -> &(dyn std::any::Any + Send + Sync) {
        self.value.as_ref()
    }
}

impl fmt::Debug for ResolvedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedInstance")
            .field("definition_id", &self.definition_id)
            .field("capabilities", &self.capabilities.len())
            .field("sequence", &self.sequence)
            .finish()
    }
}

struct TeardownEntry {
    id: Arc<str>,
    sequence: u64,
    value: SharedInstance,
    hook: Option<DestroyHookFn>,
}

/// Singletons awaiting teardown, recorded in creation order.
#[derive(Default)]
pub(crate) struct TeardownLedger {
    entries: Mutex<Vec<TeardownEntry>>,
}

impl TeardownLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: TeardownEntry) {
        self.entries.lock().push(entry);
    }

    /// Runs pre-destroy hooks in reverse creation order and drains the
    /// ledger. Hook failures are logged, never raised; one failing
    /// bean must not block the rest of the teardown.
    pub(crate) fn destroy_all(&self) {
        let mut entries = std::mem::take(&mut *self.entries.lock());
        entries.sort_by(|a, b| b.sequence.cmp(&a.sequence));

        for entry in entries {
            debug!(id = %entry.id, phase = %LifecyclePhase::Destroying, "Destroying singleton");
            if let Some(hook) = &entry.hook {
                if let Err(error) = hook(entry.value.as_ref()) {
                    warn!(id = %entry.id, error = %error, "Pre-destroy hook failed");
                }
            }
            trace!(id = %entry.id, phase = %LifecyclePhase::Destroyed, "Destroyed");
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl ContainerCore {
    /// Runs the full construction pipeline for one definition.
    pub(crate) fn construct(
        &self,
        definition: &Arc<BeanDefinition>,
        stack: &mut ConstructionStack,
    ) -> Result<ResolvedInstance> {
        let id = definition.id();

        let mut instance =
            (definition.factory)().map_err(|source| ContainerError::ConstructionFailed {
                bean_id: id.to_string(),
                source,
            })?;
        trace!(id, phase = %LifecyclePhase::Created, "Factory produced instance");

        for point in definition.value_points() {
            let raw = self.resolve_value(definition, point, stack)?;
            (point.assign)(instance.as_mut(), &raw)?;
        }

        for point in definition.injection_points() {
            if let Some(dependency) = self.resolve_dependency(point, stack)? {
                (point.assign)(instance.as_mut(), &dependency)?;
            }
        }
        for point in definition.aggregate_points() {
            let dependencies = self.resolve_all(definition.id(), point, stack)?;
            (point.assign)(instance.as_mut(), &dependencies)?;
        }
        trace!(id, phase = %LifecyclePhase::Injected, "Injection complete");

        if let Some(hook) = &definition.post_construct {
            hook(instance.as_mut()).map_err(|source| ContainerError::LifecycleHook {
                bean_id: id.to_string(),
                hook: "post_construct",
                source,
            })?;
        }
        trace!(id, phase = %LifecyclePhase::Initialized, "Post-construct complete");

        // Freeze. The Arc keeps the concrete TypeId, so capability
        // casts can still downcast to the factory's type.
        let value: SharedInstance = Arc::from(instance);

        let mut capabilities = HashMap::with_capacity(definition.bindings.len());
        for binding in &definition.bindings {
            let produced = (binding.cast)(&value, &self.advice).ok_or_else(|| {
                ContainerError::ConstructionFailed {
                    bean_id: id.to_string(),
                    source: format!("capability cast failed for {}", binding.capability).into(),
                }
            })?;
            capabilities.insert(binding.capability, produced);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let resolved = ResolvedInstance {
            definition_id: Arc::from(id),
            value,
            capabilities: Arc::new(capabilities),
            sequence,
        };

        if definition.scope().is_singleton() {
            self.teardown.record(TeardownEntry {
                id: resolved.definition_id.clone(),
                sequence,
                value: resolved.value.clone(),
                hook: definition.pre_destroy.clone(),
            });
        }

        debug!(id, scope = %definition.scope(), phase = %LifecyclePhase::Ready, "Bean ready");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_display() {
        assert_eq!(LifecyclePhase::Created.to_string(), "Created");
        assert_eq!(LifecyclePhase::Destroying.to_string(), "Destroying");
    }

    #[test]
    fn capability_lookup_downcasts() {
        let value: SharedInstance = Arc::new(Arc::new(42u32));
        let mut capabilities = HashMap::new();
        capabilities.insert(CapabilityKey::of::<Arc<u32>>(), value.clone());

        let resolved = ResolvedInstance {
            definition_id: Arc::from("answer"),
            value,
            capabilities: Arc::new(capabilities),
            sequence: 0,
        };

        let shared: Arc<u32> = resolved.capability::<Arc<u32>>().unwrap();
        assert_eq!(*shared, 42);
        assert!(resolved.capability::<Arc<String>>().is_none());
    }

    #[test]
    fn teardown_runs_in_reverse_creation_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let ledger = TeardownLedger::new();

        for (sequence, id) in ["first", "second", "third"].iter().enumerate() {
            let order = order.clone();
            let hook: DestroyHookFn = Arc::new(move |_| {
                order.lock().push(sequence);
                Ok(())
            });
            ledger.record(TeardownEntry {
                id: Arc::from(*id),
                sequence: sequence as u64,
                value: Arc::new(()),
                hook: Some(hook),
            });
        }

        ledger.destroy_all();
        assert_eq!(*order.lock(), vec![2, 1, 0]);
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn failing_hook_does_not_stop_teardown() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let ledger = TeardownLedger::new();

        let failing: DestroyHookFn = Arc::new(|_| Err("connection already closed".into()));
        ledger.record(TeardownEntry {
            id: Arc::from("flaky"),
            sequence: 1,
            value: Arc::new(()),
            hook: Some(failing),
        });

        let order_clone = order.clone();
        let tracking: DestroyHookFn = Arc::new(move |_| {
            order_clone.lock().push("stable");
            Ok(())
        });
        ledger.record(TeardownEntry {
            id: Arc::from("stable"),
            sequence: 0,
            value: Arc::new(()),
            hook: Some(tracking),
        });

        ledger.destroy_all();
        assert_eq!(*order.lock(), vec!["stable"]);
    }

    #[test]
    fn destroy_all_is_idempotent() {
        let ledger = TeardownLedger::new();
        ledger.record(TeardownEntry {
            id: Arc::from("once"),
            sequence: 0,
            value: Arc::new(()),
            hook: None,
        });

        ledger.destroy_all();
        ledger.destroy_all();
        assert_eq!(ledger.len(), 0);
    }
}
