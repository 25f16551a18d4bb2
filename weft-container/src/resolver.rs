//! Dependency resolution during construction.
//!
//! Resolution walks injection points depth-first; the
//! [`ConstructionStack`] tracks the chain of definitions currently
//! being built so a cycle surfaces as an error with the full chain
//! instead of a deadlock on a singleton slot.

use std::sync::Arc;

use tracing::trace;

use crate::container::ContainerCore;
use crate::definition::{AggregatePoint, BeanDefinition, InjectionPoint};
use crate::error::{CircularDependencyError, ContainerError, Result};
use crate::key::CapabilityKey;
use crate::lifecycle::ResolvedInstance;

/// Chain of definitions currently under construction, per resolution
/// request. Entering an id already on the chain is a cycle.
pub(crate) struct ConstructionStack {
    chain: Vec<String>,
}

impl ConstructionStack {
    pub(crate) fn new() -> Self {
        Self { chain: Vec::new() }
    }

    /// Pushes a definition onto the chain.
    ///
    /// # Errors
    /// [`ContainerError::CircularDependency`] when the id is already
    /// on the chain; the reported chain runs from the first occurrence
    /// back to the repeated id.
    pub(crate) fn enter(&mut self, id: &str) -> Result<()> {
        if let Some(start) = self.chain.iter().position(|entry| entry == id) {
            let mut chain: Vec<String> = self.chain[start..].to_vec();
            chain.push(id.to_string());
            return Err(ContainerError::CircularDependency(
                CircularDependencyError { chain },
            ));
        }

        self.chain.push(id.to_string());
        Ok(())
    }

    pub(crate) fn exit(&mut self) {
        self.chain.pop();
    }

    /// Id of the definition whose dependencies are being resolved.
    pub(crate) fn current(&self) -> Option<&str> {
        self.chain.last().map(String::as_str)
    }
}

impl ContainerCore {
    /// Resolves one injection point of the definition on top of the
    /// stack.
    ///
    /// Returns `Ok(None)` for an optional point with no candidate;
    /// every other failure propagates.
    pub(crate) fn resolve_dependency(
        &self,
        point: &InjectionPoint,
        stack: &mut ConstructionStack,
    ) -> Result<Option<ResolvedInstance>> {
        let required_by = stack.current().unwrap_or("<root>").to_string();

        let target = match self.registry.resolve_point(&required_by, point)? {
            Some(target) => target,
            None => {
                trace!(
                    field = point.field(),
                    capability = %point.capability(),
                    "Optional dependency absent, skipping"
                );
                return Ok(None);
            }
        };

        trace!(
            field = point.field(),
            target = target.id(),
            "Resolving dependency"
        );
        self.acquire(&target, stack).map(Some)
    }

    /// Resolves an aggregate point: every candidate of the capability,
    /// in registration order, excluding the consuming bean itself.
    pub(crate) fn resolve_all(
        &self,
        consumer: &str,
        point: &AggregatePoint,
        stack: &mut ConstructionStack,
    ) -> Result<Vec<ResolvedInstance>> {
        let candidates: Vec<Arc<BeanDefinition>> = self
            .registry
            .candidates(point.capability())
            .iter()
            .filter(|candidate| candidate.id() != consumer)
            .cloned()
            .collect();

        trace!(
            field = point.field(),
            capability = %point.capability(),
            count = candidates.len(),
            "Resolving aggregate dependency"
        );

        let mut resolved = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            resolved.push(self.acquire(candidate, stack)?);
        }
        Ok(resolved)
    }

    /// Selects the definition answering a public lookup request.
    pub(crate) fn select_for_request(
        &self,
        capability: &CapabilityKey,
        qualifier: Option<&str>,
    ) -> Result<Arc<BeanDefinition>> {
        let selected = self.registry.select(capability, qualifier, true, None)?;
        // `required = true` makes an empty candidate set an error.
        Ok(selected.expect("required selection always yields a definition"))
    }
}
