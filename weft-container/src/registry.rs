//! Definition registry — collects registrations and freezes them.
//!
//! Registration happens through [`ContainerBuilder`]; `finalize`
//! filters out gated definitions, indexes the survivors by id and by
//! capability, and validates the whole graph (ambiguity, missing
//! required dependencies, cycles) before any bean is constructed.
//!
//! [`ContainerBuilder`]: crate::container::ContainerBuilder

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use weft_support::rendering::{suggest_similar, CandidateEntry};

use crate::config::{PropertyExpr, PropertySources};
use crate::definition::{BeanDefinition, InjectionPoint};
use crate::error::{
    AmbiguousPrimaryError, CircularDependencyError, ContainerError, DuplicateDefinitionError,
    NoSuchDefinitionError, NoUniqueDefinitionError, Result,
};
use crate::key::CapabilityKey;
use crate::profile::{ActiveProfiles, ConditionContext};

/// Mutable collection phase of the registry.
pub(crate) struct DefinitionRegistry {
    definitions: Vec<BeanDefinition>,
    ids: HashSet<String>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self {
            definitions: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Registers a definition, preserving registration order.
    ///
    /// # Errors
    /// [`ContainerError::DuplicateDefinition`] when the id is taken.
    pub fn register(&mut self, definition: BeanDefinition) -> Result<()> {
        if !self.ids.insert(definition.id().to_string()) {
            return Err(ContainerError::DuplicateDefinition(
                DuplicateDefinitionError {
                    id: definition.id().to_string(),
                },
            ));
        }

        debug!(id = %definition.id(), scope = %definition.scope(), "Registered definition");
        self.definitions.push(definition);
        Ok(())
    }

    /// Filters gated definitions, indexes the rest, and validates the
    /// resulting graph.
    pub fn finalize(
        self,
        profiles: &ActiveProfiles,
        properties: &PropertySources,
    ) -> Result<FrozenRegistry> {
        let context = ConditionContext::new(properties, profiles);

        let mut active: Vec<Arc<BeanDefinition>> = Vec::new();
        for definition in self.definitions {
            if let Some(profile) = definition.profile() {
                if !profile.accepts(profiles) {
                    debug!(id = %definition.id(), "Skipped: profile not active");
                    continue;
                }
            }
            if let Some(condition) = &definition.condition {
                if !condition(&context) {
                    debug!(id = %definition.id(), "Skipped: condition not met");
                    continue;
                }
            }
            active.push(Arc::new(definition));
        }

        let mut by_id = HashMap::with_capacity(active.len());
        let mut by_capability: HashMap<CapabilityKey, Vec<Arc<BeanDefinition>>> = HashMap::new();
        for definition in &active {
            by_id.insert(definition.id().to_string(), definition.clone());
            for capability in definition.capabilities() {
                by_capability
                    .entry(*capability)
                    .or_default()
                    .push(definition.clone());
            }
        }

        let registry = FrozenRegistry {
            by_id,
            by_capability,
            definitions: active,
        };

        registry.validate_primaries()?;
        registry.validate_wiring()?;
        registry.validate_acyclic()?;

        debug!(definitions = registry.definitions.len(), "Registry finalized");
        Ok(registry)
    }
}

/// Immutable registry shared by the container core after bootstrap.
pub(crate) struct FrozenRegistry {
    by_id: HashMap<String, Arc<BeanDefinition>>,
    by_capability: HashMap<CapabilityKey, Vec<Arc<BeanDefinition>>>,
    definitions: Vec<Arc<BeanDefinition>>,
}

impl FrozenRegistry {
    pub fn get(&self, id: &str) -> Option<&Arc<BeanDefinition>> {
        self.by_id.get(id)
    }

    /// Active definitions able to satisfy a capability, in
    /// registration order.
    pub fn candidates(&self, capability: &CapabilityKey) -> &[Arc<BeanDefinition>] {
        self.by_capability
            .get(capability)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Active definitions in registration order.
    pub fn definitions(&self) -> &[Arc<BeanDefinition>] {
        &self.definitions
    }

    /// Ids similar to a requested one, for error hints.
    pub fn suggest(&self, requested: &str) -> Vec<String> {
        let available: Vec<&str> = self.definitions.iter().map(|d| d.id()).collect();
        suggest_similar(requested, &available, 3)
    }

    /// Every capability may carry at most one primary definition.
    fn validate_primaries(&self) -> Result<()> {
        for (capability, candidates) in &self.by_capability {
            let primaries: Vec<String> = candidates
                .iter()
                .filter(|d| d.is_primary())
                .map(|d| d.id().to_string())
                .collect();

            if primaries.len() > 1 {
                return Err(ContainerError::AmbiguousPrimary(AmbiguousPrimaryError {
                    capability: capability.type_name().to_string(),
                    primaries,
                }));
            }
        }
        Ok(())
    }

    /// Every injection point and bean-property reference must resolve
    /// to exactly one target (or none, for optional points).
    fn validate_wiring(&self) -> Result<()> {
        for definition in &self.definitions {
            for point in definition.injection_points() {
                self.resolve_point(definition.id(), point)?;
            }
            for point in definition.value_points() {
                if let PropertyExpr::BeanProperty { bean_id, .. } = point.expr() {
                    if !self.by_id.contains_key(bean_id) {
                        return Err(ContainerError::NoSuchDefinition(NoSuchDefinitionError {
                            requested: bean_id.clone(),
                            qualifier: None,
                            required_by: Some(definition.id().to_string()),
                            suggestions: self.suggest(bean_id),
                        }));
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolves one injection point to its single target definition.
    ///
    /// Returns `Ok(None)` only for optional points with no candidate.
    pub(crate) fn resolve_point(
        &self,
        required_by: &str,
        point: &InjectionPoint,
    ) -> Result<Option<Arc<BeanDefinition>>> {
        self.select(
            point.capability(),
            point.qualifier(),
            point.is_required(),
            Some(required_by),
        )
    }

    /// Selects the single definition satisfying a capability request.
    ///
    /// Disambiguation order: qualifier filter first, then a sole
    /// primary among the remaining candidates. When `required` is
    /// false an empty candidate set yields `Ok(None)` instead of an
    /// error; ambiguity is always an error.
    pub(crate) fn select(
        &self,
        capability: &CapabilityKey,
        qualifier: Option<&str>,
        required: bool,
        required_by: Option<&str>,
    ) -> Result<Option<Arc<BeanDefinition>>> {
        let candidates = self.candidates(capability);

        let matching: Vec<&Arc<BeanDefinition>> = match qualifier {
            Some(qualifier) => candidates
                .iter()
                .filter(|d| d.answers_to(qualifier))
                .collect(),
            None => candidates.iter().collect(),
        };

        match matching.len() {
            0 if !required => Ok(None),
            0 => Err(ContainerError::NoSuchDefinition(NoSuchDefinitionError {
                requested: capability.type_name().to_string(),
                qualifier: qualifier.map(str::to_string),
                required_by: required_by.map(str::to_string),
                suggestions: qualifier.map(|q| self.suggest(q)).unwrap_or_default(),
            })),
            1 => Ok(Some(matching[0].clone())),
            _ => {
                let primaries: Vec<&&Arc<BeanDefinition>> =
                    matching.iter().filter(|d| d.is_primary()).collect();
                if primaries.len() == 1 {
                    return Ok(Some((*primaries[0]).clone()));
                }
                Err(ContainerError::NoUniqueDefinition(NoUniqueDefinitionError {
                    capability: capability.type_name().to_string(),
                    candidates: candidate_entries(&matching),
                    required_by: required_by.map(str::to_string),
                }))
            }
        }
    }

    /// Depth-first cycle check over resolved wiring edges.
    fn validate_acyclic(&self) -> Result<()> {
        let mut state: HashMap<&str, VisitState> = HashMap::new();
        for definition in &self.definitions {
            if !state.contains_key(definition.id()) {
                let mut path = Vec::new();
                self.visit(definition, &mut state, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        definition: &'a Arc<BeanDefinition>,
        state: &mut HashMap<&'a str, VisitState>,
        path: &mut Vec<String>,
    ) -> Result<()> {
        state.insert(definition.id(), VisitState::OnStack);
        path.push(definition.id().to_string());

        let mut targets: Vec<Arc<BeanDefinition>> = Vec::new();
        for point in definition.injection_points() {
            if let Some(target) = self.resolve_point(definition.id(), point)? {
                targets.push(target);
            }
        }
        for point in definition.aggregate_points() {
            for candidate in self.candidates(point.capability()) {
                // A bean is excluded from its own aggregate, so there
                // is no edge back to itself.
                if candidate.id() != definition.id() {
                    targets.push(candidate.clone());
                }
            }
        }
        for point in definition.value_points() {
            if let PropertyExpr::BeanProperty { bean_id, .. } = point.expr() {
                if let Some(target) = self.by_id.get(bean_id) {
                    targets.push(target.clone());
                }
            }
        }

        for target in targets {
            // Re-borrow the target through the index so the reference
            // lives as long as the registry itself.
            let target = self
                .by_id
                .get(target.id())
                .expect("target indexed by id");
            match state.get(target.id()) {
                None => self.visit(target, state, path)?,
                Some(VisitState::OnStack) => {
                    let start = path.iter().position(|id| id == target.id()).unwrap_or(0);
                    let mut chain: Vec<String> = path[start..].to_vec();
                    chain.push(target.id().to_string());
                    return Err(ContainerError::CircularDependency(
                        CircularDependencyError { chain },
                    ));
                }
                Some(VisitState::Done) => {}
            }
        }

        path.pop();
        state.insert(definition.id(), VisitState::Done);
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    OnStack,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Widget;

    #[derive(Default)]
    struct Holder {
        widget: Option<Arc<Widget>>,
    }

    fn widget(id: &str) -> BeanDefinition {
        BeanDefinition::builder::<Widget>(id)
            .construct(Widget::default)
            .build()
            .unwrap()
    }

    fn holder(id: &str) -> BeanDefinition {
        BeanDefinition::builder::<Holder>(id)
            .construct(Holder::default)
            .inject("widget", |h: &mut Holder, w: Arc<Widget>| {
                h.widget = Some(w)
            })
            .build()
            .unwrap()
    }

    fn finalize(definitions: Vec<BeanDefinition>) -> Result<FrozenRegistry> {
        let mut registry = DefinitionRegistry::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        registry.finalize(&ActiveProfiles::empty(), &PropertySources::new())
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut registry = DefinitionRegistry::new();
        registry.register(widget("w")).unwrap();
        let result = registry.register(widget("w"));
        assert!(matches!(
            result,
            Err(ContainerError::DuplicateDefinition(_))
        ));
    }

    #[test]
    fn profile_gating_removes_definitions() {
        let mut registry = DefinitionRegistry::new();
        registry
            .register(
                BeanDefinition::builder::<Widget>("testWidget")
                    .profile("test")
                    .construct(Widget::default)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                BeanDefinition::builder::<Widget>("prodWidget")
                    .profile("!test")
                    .construct(Widget::default)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let frozen = registry
            .finalize(
                &ActiveProfiles::new(["test".to_string()]),
                &PropertySources::new(),
            )
            .unwrap();

        assert!(frozen.get("testWidget").is_some());
        assert!(frozen.get("prodWidget").is_none());
    }

    #[test]
    fn condition_gating_consults_properties() {
        use crate::config::MapPropertySource;

        let mut registry = DefinitionRegistry::new();
        registry
            .register(
                BeanDefinition::builder::<Widget>("gated")
                    .condition(|ctx| ctx.property("feature.widget").as_deref() == Some("on"))
                    .construct(Widget::default)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let mut sources = PropertySources::new();
        sources.push(MapPropertySource::new(
            "test",
            [("feature.widget".to_string(), "off".to_string())],
        ));

        let frozen = registry.finalize(&ActiveProfiles::empty(), &sources).unwrap();
        assert!(frozen.get("gated").is_none());
    }

    #[test]
    fn two_primaries_for_one_capability_fail() {
        let result = finalize(vec![
            BeanDefinition::builder::<Widget>("a")
                .primary()
                .construct(Widget::default)
                .build()
                .unwrap(),
            BeanDefinition::builder::<Widget>("b")
                .primary()
                .construct(Widget::default)
                .build()
                .unwrap(),
        ]);

        assert!(matches!(result, Err(ContainerError::AmbiguousPrimary(_))));
    }

    #[test]
    fn ambiguous_unqualified_point_fails() {
        let result = finalize(vec![widget("a"), widget("b"), holder("h")]);
        assert!(matches!(
            result,
            Err(ContainerError::NoUniqueDefinition(_))
        ));
    }

    #[test]
    fn primary_resolves_ambiguity() {
        let result = finalize(vec![
            BeanDefinition::builder::<Widget>("a")
                .primary()
                .construct(Widget::default)
                .build()
                .unwrap(),
            widget("b"),
            holder("h"),
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn qualifier_selects_among_candidates() {
        let definition = BeanDefinition::builder::<Holder>("h")
            .construct(Holder::default)
            .inject_qualified("widget", "left", |h: &mut Holder, w: Arc<Widget>| {
                h.widget = Some(w)
            })
            .build()
            .unwrap();

        let result = finalize(vec![
            BeanDefinition::builder::<Widget>("a")
                .qualifier("left")
                .construct(Widget::default)
                .build()
                .unwrap(),
            widget("b"),
            definition,
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn missing_required_dependency_fails_fast() {
        let result = finalize(vec![holder("h")]);
        assert!(matches!(result, Err(ContainerError::NoSuchDefinition(_))));
    }

    #[test]
    fn missing_optional_dependency_is_fine() {
        let definition = BeanDefinition::builder::<Holder>("h")
            .construct(Holder::default)
            .inject_optional("widget", |h: &mut Holder, w: Arc<Widget>| {
                h.widget = Some(w)
            })
            .build()
            .unwrap();

        assert!(finalize(vec![definition]).is_ok());
    }

    #[test]
    fn dependency_cycle_is_reported_with_chain() {
        struct Left {
            _other: Option<Arc<Right>>,
        }
        struct Right {
            _other: Option<Arc<Left>>,
        }

        let left = BeanDefinition::builder::<Left>("left")
            .construct(|| Left { _other: None })
            .inject("other", |l: &mut Left, r: Arc<Right>| l._other = Some(r))
            .build()
            .unwrap();
        let right = BeanDefinition::builder::<Right>("right")
            .construct(|| Right { _other: None })
            .inject("other", |r: &mut Right, l: Arc<Left>| r._other = Some(l))
            .build()
            .unwrap();

        match finalize(vec![left, right]) {
            Err(ContainerError::CircularDependency(e)) => {
                assert_eq!(e.chain.first(), e.chain.last());
                assert!(e.chain.len() >= 3);
            }
            Err(other) => panic!("expected cycle error, got {other:?}"),
            Ok(_) => panic!("expected cycle error"),
        }
    }

    #[test]
    fn aggregate_cycle_is_reported() {
        trait Stage: Send + Sync {}

        struct PipelineStage {
            _pipeline: Option<Arc<Pipeline>>,
        }
        impl Stage for PipelineStage {}

        struct Pipeline {
            _stages: Vec<Arc<dyn Stage>>,
        }

        let stage = BeanDefinition::builder::<PipelineStage>("stage")
            .construct(|| PipelineStage { _pipeline: None })
            .bind(|s: Arc<PipelineStage>| s as Arc<dyn Stage>)
            .inject("pipeline", |s: &mut PipelineStage, p: Arc<Pipeline>| {
                s._pipeline = Some(p)
            })
            .build()
            .unwrap();
        let pipeline = BeanDefinition::builder::<Pipeline>("pipeline")
            .construct(|| Pipeline { _stages: Vec::new() })
            .inject_all("stages", |p: &mut Pipeline, stages: Vec<Arc<dyn Stage>>| {
                p._stages = stages
            })
            .build()
            .unwrap();

        assert!(matches!(
            finalize(vec![stage, pipeline]),
            Err(ContainerError::CircularDependency(_))
        ));
    }

    #[test]
    fn aggregate_excludes_the_declaring_bean() {
        trait Stage: Send + Sync {}

        struct Pipeline {
            _stages: Vec<Arc<dyn Stage>>,
        }
        impl Stage for Pipeline {}

        // The pipeline provides the capability it aggregates; without
        // self-exclusion this would be a spurious one-bean cycle.
        let pipeline = BeanDefinition::builder::<Pipeline>("pipeline")
            .construct(|| Pipeline { _stages: Vec::new() })
            .bind(|p: Arc<Pipeline>| p as Arc<dyn Stage>)
            .inject_all("stages", |p: &mut Pipeline, stages: Vec<Arc<dyn Stage>>| {
                p._stages = stages
            })
            .build()
            .unwrap();

        assert!(finalize(vec![pipeline]).is_ok());
    }

    #[test]
    fn unknown_bean_property_reference_fails() {
        #[derive(Default)]
        struct Configured {
            host: String,
        }

        let definition = BeanDefinition::builder::<Configured>("c")
            .construct(Configured::default)
            .value("host", "#{smtpConfig.host}", |c: &mut Configured, v: String| {
                c.host = v
            })
            .build()
            .unwrap();

        let result = finalize(vec![definition]);
        assert!(matches!(result, Err(ContainerError::NoSuchDefinition(_))));
    }

    #[test]
    fn suggest_finds_similar_ids() {
        let frozen = finalize(vec![widget("mailService"), widget("userService")]).unwrap();
        let suggestions = frozen.suggest("mailServce");
        assert_eq!(suggestions, vec!["mailService".to_string()]);
    }
}

/// Renders candidate definitions for ambiguity errors.
pub(crate) fn candidate_entries(candidates: &[&Arc<BeanDefinition>]) -> Vec<CandidateEntry> {
    candidates
        .iter()
        .map(|d| CandidateEntry {
            id: d.id().to_string(),
            scope: d.scope().to_string(),
            qualifier: d.qualifier().map(str::to_string),
            primary: d.is_primary(),
        })
        .collect()
}
