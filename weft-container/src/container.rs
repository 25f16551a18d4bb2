//! # The Container — heart of Weft
//!
//! Owns the frozen registry, the property sources, the advice engine
//! and the singleton cache, and drives bean resolution.
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──build()──> Container
//!       │                          │
//!  definitions,              get_instance()
//!  properties,               get_qualified()
//!  profiles, advice          get_all() … shutdown()
//! ```
//!
//! # Examples
//! ```rust
//! use weft_container::prelude::*;
//! use std::sync::Arc;
//!
//! struct Clock;
//!
//! struct UserService {
//!     clock: Option<Arc<Clock>>,
//! }
//!
//! let container = Container::builder()
//!     .bean(
//!         BeanDefinition::builder::<Clock>("clock").construct(|| Clock),
//!     )
//!     .bean(
//!         BeanDefinition::builder::<UserService>("userService")
//!             .construct(|| UserService { clock: None })
//!             .inject("clock", |s: &mut UserService, c: Arc<Clock>| {
//!                 s.clock = Some(c)
//!             }),
//!     )
//!     .build()
//!     .expect("container bootstrap");
//!
//! let service: Arc<UserService> = container.get_instance().expect("resolve");
//! assert!(service.clock.is_some());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info, instrument, trace};

use crate::advice::{Advice, AdviceEngine};
use crate::config::{PropertySource, PropertySources};
use crate::definition::{BeanDefinition, DefinitionBuilder};
use crate::error::{ContainerError, NoSuchDefinitionError, Result};
use crate::key::CapabilityKey;
use crate::profile::ActiveProfiles;
use crate::registry::{DefinitionRegistry, FrozenRegistry};
use crate::resolver::ConstructionStack;
use crate::scope::SingletonCache;
use crate::source::DefinitionSource;
use crate::lifecycle::TeardownLedger;

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a [`Container`] from definitions, properties, profiles and
/// advice.
///
/// Registration is infallible fluent calls; all errors are deferred to
/// [`build()`](ContainerBuilder::build), which reports the first one.
pub struct ContainerBuilder {
    definitions: Vec<BeanDefinition>,
    pending: Option<ContainerError>,
    properties: PropertySources,
    profiles: ActiveProfiles,
    advices: Vec<Advice>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            definitions: Vec::new(),
            pending: None,
            properties: PropertySources::new(),
            profiles: ActiveProfiles::empty(),
            advices: Vec::new(),
        }
    }

    /// Registers a bean from its typed builder.
    pub fn bean<T: Send + Sync + 'static>(self, builder: DefinitionBuilder<T>) -> Self {
        match builder.build() {
            Ok(definition) => self.definition(definition),
            Err(error) => self.fail(error),
        }
    }

    /// Registers an already-built definition.
    pub fn definition(mut self, definition: BeanDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Drains a definition source module into the builder.
    pub fn source(self, source: &dyn DefinitionSource) -> Self {
        debug!(source = source.name(), "Adding definition source");
        match source.definitions() {
            Ok(definitions) => definitions
                .into_iter()
                .fold(self, |builder, definition| builder.definition(definition)),
            Err(error) => self.fail(error),
        }
    }

    /// Appends a property source; earlier sources win lookups.
    pub fn property_source(mut self, source: impl PropertySource + 'static) -> Self {
        self.properties.push(source);
        self
    }

    /// Sets the active profiles used to gate definitions.
    pub fn profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.profiles = ActiveProfiles::new(profiles);
        self
    }

    /// Reads active profiles from a comma-separated environment variable.
    pub fn profiles_from_env(mut self, var: &str) -> Self {
        self.profiles = ActiveProfiles::from_env(var);
        self
    }

    /// Registers an advice; registration order is the execution order
    /// within each advice kind.
    pub fn advice(mut self, advice: Advice) -> Self {
        self.advices.push(advice);
        self
    }

    fn fail(mut self, error: ContainerError) -> Self {
        if self.pending.is_none() {
            self.pending = Some(error);
        }
        self
    }

    /// Builds the container: registers all definitions, finalizes the
    /// registry (gating, disambiguation, cycle checks) and eagerly
    /// constructs non-lazy singletons.
    ///
    /// # Errors
    /// The first registration error, any finalization error, or the
    /// first bootstrap failure. On bootstrap failure every singleton
    /// already constructed is destroyed before returning; a container
    /// never comes up half-built.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        if let Some(error) = self.pending {
            return Err(error);
        }

        info!(definitions = self.definitions.len(), "Building container");

        let mut registry = DefinitionRegistry::new();
        for definition in self.definitions {
            registry.register(definition)?;
        }
        let registry = registry.finalize(&self.profiles, &self.properties)?;

        let core = Arc::new(ContainerCore {
            registry,
            config: self.properties,
            advice: Arc::new(AdviceEngine::new(self.advices)),
            singletons: SingletonCache::new(),
            teardown: TeardownLedger::new(),
            sequence: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });

        for definition in core.registry.definitions() {
            if definition.scope().is_singleton() && !definition.is_lazy() {
                let mut stack = ConstructionStack::new();
                if let Err(error) = core.acquire(definition, &mut stack) {
                    core.teardown.destroy_all();
                    return Err(error);
                }
            }
        }

        info!("Container ready");
        Ok(Container { core })
    }
}

// ============================================================
// Container
// ============================================================

/// Shared state behind a [`Container`].
pub(crate) struct ContainerCore {
    pub(crate) registry: FrozenRegistry,
    pub(crate) config: PropertySources,
    pub(crate) advice: Arc<AdviceEngine>,
    pub(crate) singletons: SingletonCache,
    pub(crate) teardown: TeardownLedger,
    pub(crate) sequence: AtomicU64,
    closed: AtomicBool,
}

/// Immutable, thread-safe bean container.
///
/// Created by [`ContainerBuilder::build()`]; dropped or explicitly
/// [`shutdown()`](Container::shutdown) when the application stops.
pub struct Container {
    core: Arc<ContainerCore>,
}

impl Container {
    /// Creates a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Resolves the single bean satisfying capability `P`.
    ///
    /// `P` is typically `Arc<ConcreteType>` or `Arc<dyn Trait>`.
    ///
    /// # Errors
    /// `NoSuchDefinition` when nothing satisfies `P`,
    /// `NoUniqueDefinition` when several candidates remain after
    /// primary disambiguation, `ContainerClosed` after shutdown.
    pub fn get_instance<P: Clone + Send + Sync + 'static>(&self) -> Result<P> {
        self.resolve_request(None)
    }

    /// Resolves a bean by capability and qualifier (definition id or
    /// declared qualifier string).
    pub fn get_qualified<P: Clone + Send + Sync + 'static>(&self, qualifier: &str) -> Result<P> {
        self.resolve_request(Some(qualifier))
    }

    /// Like [`get_instance`](Container::get_instance), but an absent
    /// definition yields `Ok(None)` instead of an error. Ambiguity is
    /// still an error.
    pub fn get_optional<P: Clone + Send + Sync + 'static>(&self) -> Result<Option<P>> {
        self.ensure_open()?;
        let key = CapabilityKey::of::<P>();
        trace!(capability = %key, "Resolving optional");

        let definition = match self.core.registry.select(&key, None, false, None)? {
            Some(definition) => definition,
            None => return Ok(None),
        };

        let mut stack = ConstructionStack::new();
        let resolved = self.core.acquire(&definition, &mut stack)?;
        self.expect_capability(&definition, resolved.capability::<P>())
            .map(Some)
    }

    /// Resolves a bean by definition id.
    pub fn get_by_id<P: Clone + Send + Sync + 'static>(&self, id: &str) -> Result<P> {
        self.ensure_open()?;
        trace!(id, "Resolving by id");

        let definition = self.core.registry.get(id).cloned().ok_or_else(|| {
            ContainerError::NoSuchDefinition(NoSuchDefinitionError {
                requested: id.to_string(),
                qualifier: None,
                required_by: None,
                suggestions: self.core.registry.suggest(id),
            })
        })?;

        let mut stack = ConstructionStack::new();
        let resolved = self.core.acquire(&definition, &mut stack)?;
        self.expect_capability(&definition, resolved.capability::<P>())
    }

    /// Resolves every bean satisfying capability `P`, in registration
    /// order. An empty result is not an error.
    pub fn get_all<P: Clone + Send + Sync + 'static>(&self) -> Result<Vec<P>> {
        self.ensure_open()?;
        let key = CapabilityKey::of::<P>();
        trace!(capability = %key, "Resolving all");

        let candidates: Vec<_> = self.core.registry.candidates(&key).to_vec();
        let mut values = Vec::with_capacity(candidates.len());
        for definition in candidates {
            let mut stack = ConstructionStack::new();
            let resolved = self.core.acquire(&definition, &mut stack)?;
            values.push(self.expect_capability(&definition, resolved.capability::<P>())?);
        }
        Ok(values)
    }

    /// Runs pre-destroy hooks over all constructed singletons in
    /// reverse creation order and closes the container. Safe to call
    /// more than once; later calls are no-ops.
    pub fn shutdown(&self) {
        if self.core.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down container");
        self.core.teardown.destroy_all();
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::SeqCst)
    }

    fn resolve_request<P: Clone + Send + Sync + 'static>(
        &self,
        qualifier: Option<&str>,
    ) -> Result<P> {
        self.ensure_open()?;
        let key = CapabilityKey::of::<P>();
        trace!(capability = %key, qualifier, "Resolving");

        let definition = self.core.select_for_request(&key, qualifier)?;
        let mut stack = ConstructionStack::new();
        let resolved = self.core.acquire(&definition, &mut stack)?;
        self.expect_capability(&definition, resolved.capability::<P>())
    }

    fn expect_capability<P: Clone + Send + Sync + 'static>(
        &self,
        definition: &BeanDefinition,
        value: Option<P>,
    ) -> Result<P> {
        value.ok_or_else(|| ContainerError::ConstructionFailed {
            bean_id: definition.id().to_string(),
            source: format!(
                "bean does not expose capability {}",
                std::any::type_name::<P>()
            )
            .into(),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ContainerError::ContainerClosed);
        }
        Ok(())
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Convenient glob import for the common container API.
pub mod prelude {
    pub use crate::advice::{Advice, AdviceEngine, Invocation, Pointcut, Proceed, downcast_return};
    pub use crate::config::{EnvPropertySource, MapPropertySource, PropertySource};
    pub use crate::container::{Container, ContainerBuilder};
    pub use crate::definition::{BeanDefinition, DefinitionBuilder, FactoryBean};
    pub use crate::error::{BoxError, ContainerError, Result};
    pub use crate::lifecycle::LifecyclePhase;
    pub use crate::scope::BeanScope;
    pub use crate::source::DefinitionSource;
}
