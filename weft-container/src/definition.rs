//! Bean definitions — the metadata the registry consumes.
//!
//! A [`BeanDefinition`] is plain data: id, scope, disambiguation marks,
//! gating predicates, and a set of type-erased closures (factory,
//! injection points, value points, hooks, capability casts) produced by
//! the typed [`DefinitionBuilder`]. The container core never inspects
//! language-level metadata; everything it needs is declared here at
//! bootstrap time.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::advice::AdviceEngine;
use crate::config::PropertyExpr;
use crate::error::{BoxError, ContainerError, Result};
use crate::key::CapabilityKey;
use crate::lifecycle::ResolvedInstance;
use crate::profile::{ConditionContext, ConditionFn, ProfileExpr};
use crate::scope::BeanScope;

/// Type-erased shared bean instance.
pub(crate) type SharedInstance = Arc<dyn Any + Send + Sync>;

/// Creates the bare instance; runs with no dependency access.
pub(crate) type FactoryFn =
    Arc<dyn Fn() -> std::result::Result<Box<dyn Any + Send + Sync>, BoxError> + Send + Sync>;

/// Assigns a resolved dependency into a field of the instance under construction.
pub(crate) type AssignDepFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), &ResolvedInstance) -> Result<()> + Send + Sync>;

/// Assigns every resolved candidate of one capability into a field.
pub(crate) type AssignAllFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), &[ResolvedInstance]) -> Result<()> + Send + Sync>;

/// Coerces a raw property string and assigns it into a field.
pub(crate) type AssignValueFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), &str) -> Result<()> + Send + Sync>;

/// Post-construction hook; runs once, after injection, with exclusive access.
pub(crate) type InitHookFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync)) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Pre-destruction hook; runs once per singleton during teardown.
pub(crate) type DestroyHookFn =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Exposes named properties of a bean for `#{beanId.property}` references.
pub(crate) type PropertyAccessorFn =
    Arc<dyn Fn(&(dyn Any + Send + Sync), &str) -> Option<String> + Send + Sync>;

/// Converts the stored concrete instance into one declared capability,
/// optionally wrapping it in an advice proxy.
pub(crate) type CastFn =
    Arc<dyn Fn(&SharedInstance, &Arc<AdviceEngine>) -> Option<SharedInstance> + Send + Sync>;

/// A delegating factory: the registered object is itself a factory
/// whose [`produce`](FactoryBean::produce) call yields the bean.
///
/// The alternative to a plain constructor closure for beans whose
/// creation logic deserves a named type (caching, environment probing,
/// picking an implementation at bootstrap).
///
/// # Examples
/// ```rust,ignore
/// struct ZoneFactory;
///
/// impl FactoryBean for ZoneFactory {
///     type Output = Zone;
///
///     fn produce(&self) -> Result<Zone, BoxError> {
///         Ok(Zone(std::env::var("APP_ZONE").unwrap_or_else(|_| "ZR".into())))
///     }
/// }
///
/// BeanDefinition::builder::<Zone>("zone").from_factory(ZoneFactory)
/// ```
pub trait FactoryBean: Send + Sync {
    /// The bean type this factory produces.
    type Output: Send + Sync + 'static;

    /// Produces one instance; called once per singleton, once per
    /// prototype request.
    fn produce(&self) -> std::result::Result<Self::Output, BoxError>;
}

/// One declared capability of a definition plus its cast closure.
pub(crate) struct Binding {
    pub(crate) capability: CapabilityKey,
    pub(crate) cast: CastFn,
}

/// A declared dependency of a definition.
pub struct InjectionPoint {
    pub(crate) field: &'static str,
    pub(crate) capability: CapabilityKey,
    pub(crate) qualifier: Option<String>,
    pub(crate) required: bool,
    pub(crate) assign: AssignDepFn,
}

impl InjectionPoint {
    pub fn field(&self) -> &str {
        self.field
    }

    pub fn capability(&self) -> &CapabilityKey {
        &self.capability
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

impl fmt::Debug for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionPoint")
            .field("field", &self.field)
            .field("capability", &self.capability)
            .field("qualifier", &self.qualifier)
            .field("required", &self.required)
            .finish()
    }
}

/// A declared dependency on every candidate of one capability.
///
/// Resolves to the full candidate set in registration order; an empty
/// set is an empty `Vec`, never an error. The declaring bean itself is
/// excluded even when it provides the capability.
pub struct AggregatePoint {
    pub(crate) field: &'static str,
    pub(crate) capability: CapabilityKey,
    pub(crate) assign: AssignAllFn,
}

impl AggregatePoint {
    pub fn field(&self) -> &str {
        self.field
    }

    pub fn capability(&self) -> &CapabilityKey {
        &self.capability
    }
}

impl fmt::Debug for AggregatePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatePoint")
            .field("field", &self.field)
            .field("capability", &self.capability)
            .finish()
    }
}

/// A declared configuration value of a definition.
pub struct ValuePoint {
    pub(crate) field: &'static str,
    pub(crate) expr: PropertyExpr,
    pub(crate) assign: AssignValueFn,
}

impl ValuePoint {
    pub fn field(&self) -> &str {
        self.field
    }

    pub fn expr(&self) -> &PropertyExpr {
        &self.expr
    }
}

impl fmt::Debug for ValuePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValuePoint")
            .field("field", &self.field)
            .field("expr", &self.expr)
            .finish()
    }
}

/// Immutable metadata describing how to create and manage one bean.
///
/// Built through [`BeanDefinition::builder`], registered into a
/// container builder, never mutated after registry finalization.
pub struct BeanDefinition {
    pub(crate) id: String,
    pub(crate) type_name: &'static str,
    pub(crate) scope: BeanScope,
    pub(crate) qualifier: Option<String>,
    pub(crate) primary: bool,
    pub(crate) lazy: bool,
    pub(crate) profile: Option<ProfileExpr>,
    pub(crate) condition: Option<ConditionFn>,
    pub(crate) factory: FactoryFn,
    pub(crate) bindings: Vec<Binding>,
    pub(crate) injection_points: Vec<InjectionPoint>,
    pub(crate) aggregate_points: Vec<AggregatePoint>,
    pub(crate) value_points: Vec<ValuePoint>,
    pub(crate) post_construct: Option<InitHookFn>,
    pub(crate) pre_destroy: Option<DestroyHookFn>,
    pub(crate) properties: Option<PropertyAccessorFn>,
}

impl BeanDefinition {
    /// Starts a typed builder for a bean of concrete type `T`.
    pub fn builder<T: Send + Sync + 'static>(id: impl Into<String>) -> DefinitionBuilder<T> {
        DefinitionBuilder::new(id.into())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Short name of the concrete type, used as advice target name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn scope(&self) -> BeanScope {
        self.scope
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn profile(&self) -> Option<&ProfileExpr> {
        self.profile.as_ref()
    }

    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    pub fn aggregate_points(&self) -> &[AggregatePoint] {
        &self.aggregate_points
    }

    pub fn value_points(&self) -> &[ValuePoint] {
        &self.value_points
    }

    /// Capability keys this definition can satisfy.
    pub fn capabilities(&self) -> impl Iterator<Item = &CapabilityKey> {
        self.bindings.iter().map(|binding| &binding.capability)
    }

    pub(crate) fn property_accessor(&self) -> Option<&PropertyAccessorFn> {
        self.properties.as_ref()
    }

    /// Matches a qualifier against this definition's id or declared qualifier.
    pub(crate) fn answers_to(&self, qualifier: &str) -> bool {
        self.id == qualifier || self.qualifier.as_deref() == Some(qualifier)
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("id", &self.id)
            .field("type", &self.type_name)
            .field("scope", &self.scope)
            .field("qualifier", &self.qualifier)
            .field("primary", &self.primary)
            .field("lazy", &self.lazy)
            .field("injection_points", &self.injection_points)
            .field("aggregate_points", &self.aggregate_points)
            .field("value_points", &self.value_points)
            .finish()
    }
}

/// Typed builder for a [`BeanDefinition`] of concrete type `T`.
///
/// # Examples
/// ```rust,ignore
/// let definition = BeanDefinition::builder::<SmtpConfig>("smtpConfig")
///     .construct(SmtpConfig::default)
///     .value("host", "${smtp.host}", |c: &mut SmtpConfig, v: String| c.host = v)
///     .value("port", "${smtp.port:25}", |c: &mut SmtpConfig, v: u16| c.port = v)
///     .expose_properties(|c: &SmtpConfig, name| match name {
///         "host" => Some(c.host.clone()),
///         "port" => Some(c.port.to_string()),
///         _ => None,
///     })
///     .build()?;
/// ```
pub struct DefinitionBuilder<T> {
    id: String,
    scope: BeanScope,
    qualifier: Option<String>,
    primary: bool,
    lazy: bool,
    profile: Option<ProfileExpr>,
    condition: Option<ConditionFn>,
    factory: Option<FactoryFn>,
    bindings: Vec<Binding>,
    injection_points: Vec<InjectionPoint>,
    aggregate_points: Vec<AggregatePoint>,
    value_points: Vec<ValuePoint>,
    post_construct: Option<InitHookFn>,
    pre_destroy: Option<DestroyHookFn>,
    properties: Option<PropertyAccessorFn>,
    error: Option<ContainerError>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> DefinitionBuilder<T> {
    fn new(id: String) -> Self {
        Self {
            id,
            scope: BeanScope::Singleton,
            qualifier: None,
            primary: false,
            lazy: false,
            profile: None,
            condition: None,
            factory: None,
            bindings: Vec::new(),
            injection_points: Vec::new(),
            aggregate_points: Vec::new(),
            value_points: Vec::new(),
            post_construct: None,
            pre_destroy: None,
            properties: None,
            error: None,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn scope(mut self, scope: BeanScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn singleton(self) -> Self {
        self.scope(BeanScope::Singleton)
    }

    pub fn prototype(self) -> Self {
        self.scope(BeanScope::Prototype)
    }

    /// Names this definition for qualified injection.
    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Marks this definition as the default among ambiguous candidates.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Defers singleton construction to first use instead of bootstrap.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Gates this definition on a profile expression (`"test"`, `"!test"`).
    pub fn profile(mut self, expr: &str) -> Self {
        self.profile = Some(ProfileExpr::parse(expr));
        self
    }

    /// Gates this definition on an arbitrary condition, evaluated once
    /// at finalization.
    pub fn condition(
        mut self,
        condition: impl Fn(&ConditionContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Infallible factory for the bare instance.
    pub fn construct(self, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.try_construct(move || Ok(factory()))
    }

    /// Delegating factory: the bean is produced by a factory object
    /// instead of a constructor closure.
    pub fn from_factory(self, factory: impl FactoryBean<Output = T> + 'static) -> Self {
        self.try_construct(move || factory.produce())
    }

    /// Fallible factory for the bare instance.
    pub fn try_construct(
        mut self,
        factory: impl Fn() -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.factory = Some(Arc::new(move || {
            factory().map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
        }));
        self
    }

    /// Declares a required, unqualified injection point.
    pub fn inject<P>(
        self,
        field: &'static str,
        assign: impl Fn(&mut T, P) + Send + Sync + 'static,
    ) -> Self
    where
        P: Clone + Send + Sync + 'static,
    {
        self.inject_with(field, None, true, assign)
    }

    /// Declares a required injection point resolved by qualifier.
    pub fn inject_qualified<P>(
        self,
        field: &'static str,
        qualifier: &str,
        assign: impl Fn(&mut T, P) + Send + Sync + 'static,
    ) -> Self
    where
        P: Clone + Send + Sync + 'static,
    {
        self.inject_with(field, Some(qualifier.to_string()), true, assign)
    }

    /// Declares an optional injection point; when no candidate exists
    /// the field keeps its factory-assigned default.
    pub fn inject_optional<P>(
        self,
        field: &'static str,
        assign: impl Fn(&mut T, P) + Send + Sync + 'static,
    ) -> Self
    where
        P: Clone + Send + Sync + 'static,
    {
        self.inject_with(field, None, false, assign)
    }

    /// Declares an optional injection point resolved by qualifier.
    pub fn inject_optional_qualified<P>(
        self,
        field: &'static str,
        qualifier: &str,
        assign: impl Fn(&mut T, P) + Send + Sync + 'static,
    ) -> Self
    where
        P: Clone + Send + Sync + 'static,
    {
        self.inject_with(field, Some(qualifier.to_string()), false, assign)
    }

    fn inject_with<P>(
        mut self,
        field: &'static str,
        qualifier: Option<String>,
        required: bool,
        assign: impl Fn(&mut T, P) + Send + Sync + 'static,
    ) -> Self
    where
        P: Clone + Send + Sync + 'static,
    {
        let bean_id = self.id.clone();
        let erased: AssignDepFn = Arc::new(move |target, dependency| {
            let value = dependency.capability::<P>().ok_or_else(|| {
                ContainerError::ConstructionFailed {
                    bean_id: bean_id.clone(),
                    source: format!(
                        "dependency {:?} does not expose capability {}",
                        dependency.definition_id(),
                        std::any::type_name::<P>(),
                    )
                    .into(),
                }
            })?;

            let instance =
                target
                    .downcast_mut::<T>()
                    .ok_or_else(|| ContainerError::ConstructionFailed {
                        bean_id: bean_id.clone(),
                        source: format!("injection target is not a {}", std::any::type_name::<T>())
                            .into(),
                    })?;

            assign(instance, value);
            Ok(())
        });

        self.injection_points.push(InjectionPoint {
            field,
            capability: CapabilityKey::of::<P>(),
            qualifier,
            required,
            assign: erased,
        });
        self
    }

    /// Declares an aggregate injection point: every bean exposing `P`
    /// is collected, in registration order, into one `Vec`.
    ///
    /// The declaring bean is excluded from its own aggregate, and an
    /// empty candidate set yields an empty `Vec` rather than an error.
    pub fn inject_all<P>(
        mut self,
        field: &'static str,
        assign: impl Fn(&mut T, Vec<P>) + Send + Sync + 'static,
    ) -> Self
    where
        P: Clone + Send + Sync + 'static,
    {
        let bean_id = self.id.clone();
        let erased: AssignAllFn = Arc::new(move |target, dependencies| {
            let mut values = Vec::with_capacity(dependencies.len());
            for dependency in dependencies {
                let value = dependency.capability::<P>().ok_or_else(|| {
                    ContainerError::ConstructionFailed {
                        bean_id: bean_id.clone(),
                        source: format!(
                            "dependency {:?} does not expose capability {}",
                            dependency.definition_id(),
                            std::any::type_name::<P>(),
                        )
                        .into(),
                    }
                })?;
                values.push(value);
            }

            let instance =
                target
                    .downcast_mut::<T>()
                    .ok_or_else(|| ContainerError::ConstructionFailed {
                        bean_id: bean_id.clone(),
                        source: format!("injection target is not a {}", std::any::type_name::<T>())
                            .into(),
                    })?;

            assign(instance, values);
            Ok(())
        });

        self.aggregate_points.push(AggregatePoint {
            field,
            capability: CapabilityKey::of::<P>(),
            assign: erased,
        });
        self
    }

    /// Declares a configuration value point.
    ///
    /// `expression` is `${key}`, `${key:default}`, `#{beanId.property}`
    /// or a literal; the resolved string is coerced into `V` through
    /// `FromStr` before assignment.
    pub fn value<V>(
        mut self,
        field: &'static str,
        expression: &str,
        assign: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self
    where
        V: FromStr + Send + Sync + 'static,
        V::Err: fmt::Display,
    {
        let expr = match PropertyExpr::parse(expression) {
            Ok(expr) => expr,
            Err(reason) => {
                self.fail(ContainerError::InvalidDefinition {
                    id: self.id.clone(),
                    reason,
                });
                return self;
            }
        };

        let bean_id = self.id.clone();
        let erased: AssignValueFn = Arc::new(move |target, raw| {
            let parsed: V = raw.parse().map_err(|e: V::Err| ContainerError::TypeCoercion {
                bean_id: bean_id.clone(),
                field: field.to_string(),
                raw: raw.to_string(),
                target_type: std::any::type_name::<V>(),
                message: e.to_string(),
            })?;

            let instance =
                target
                    .downcast_mut::<T>()
                    .ok_or_else(|| ContainerError::ConstructionFailed {
                        bean_id: bean_id.clone(),
                        source: format!("value target is not a {}", std::any::type_name::<T>())
                            .into(),
                    })?;

            assign(instance, parsed);
            Ok(())
        });

        self.value_points.push(ValuePoint {
            field,
            expr,
            assign: erased,
        });
        self
    }

    /// Declares an additional capability this bean satisfies.
    ///
    /// Typically used for trait bindings:
    /// `.bind(|mail: Arc<SmtpMailer>| mail as Arc<dyn Mailer>)`.
    pub fn bind<P>(self, cast: impl Fn(Arc<T>) -> P + Send + Sync + 'static) -> Self
    where
        P: Clone + Send + Sync + 'static,
    {
        self.bind_with_advice(move |instance, _| cast(instance))
    }

    /// Declares a capability whose value is wrapped in an advice proxy
    /// at `Ready` time; the cast receives the engine to hand the proxy.
    pub fn bind_with_advice<P>(
        mut self,
        cast: impl Fn(Arc<T>, Arc<AdviceEngine>) -> P + Send + Sync + 'static,
    ) -> Self
    where
        P: Clone + Send + Sync + 'static,
    {
        let erased: CastFn = Arc::new(move |shared, engine| {
            let concrete = shared.clone().downcast::<T>().ok()?;
            Some(Arc::new(cast(concrete, engine.clone())) as SharedInstance)
        });

        self.bindings.push(Binding {
            capability: CapabilityKey::of::<P>(),
            cast: erased,
        });
        self
    }

    /// Hook invoked exactly once after injection completes.
    pub fn post_construct(
        mut self,
        hook: impl Fn(&mut T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        let bean_id = self.id.clone();
        self.post_construct = Some(Arc::new(move |target| {
            let instance = target
                .downcast_mut::<T>()
                .ok_or_else(|| BoxError::from(format!("hook target is not a {bean_id}")))?;
            hook(instance)
        }));
        self
    }

    /// Hook invoked once during teardown, before the instance is dropped.
    pub fn pre_destroy(
        mut self,
        hook: impl Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        let bean_id = self.id.clone();
        self.pre_destroy = Some(Arc::new(move |target| {
            let instance = target
                .downcast_ref::<T>()
                .ok_or_else(|| BoxError::from(format!("hook target is not a {bean_id}")))?;
            hook(instance)
        }));
        self
    }

    /// Exposes named string properties for `#{beanId.property}` references.
    pub fn expose_properties(
        mut self,
        accessor: impl Fn(&T, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.properties = Some(Arc::new(move |target, name| {
            target
                .downcast_ref::<T>()
                .and_then(|instance| accessor(instance, name))
        }));
        self
    }

    fn fail(&mut self, error: ContainerError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Finishes the definition.
    ///
    /// A self-binding for `Arc<T>` is added when no explicit binding
    /// declared it, so every bean is requestable by its concrete type.
    /// When a capability was bound more than once, the last binding
    /// wins; a definition never competes against itself.
    ///
    /// # Errors
    /// `InvalidDefinition` when no factory was given or a value
    /// expression failed to parse.
    pub fn build(mut self) -> Result<BeanDefinition> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }

        let factory = self.factory.ok_or_else(|| ContainerError::InvalidDefinition {
            id: self.id.clone(),
            reason: "no factory; call construct() or try_construct()".to_string(),
        })?;

        let mut deduped: Vec<Binding> = Vec::with_capacity(self.bindings.len());
        for binding in self.bindings {
            match deduped
                .iter_mut()
                .find(|kept| kept.capability == binding.capability)
            {
                Some(kept) => *kept = binding,
                None => deduped.push(binding),
            }
        }
        self.bindings = deduped;

        let self_key = CapabilityKey::of::<Arc<T>>();
        if !self.bindings.iter().any(|b| b.capability == self_key) {
            let cast: CastFn = Arc::new(move |shared, _| {
                let concrete = shared.clone().downcast::<T>().ok()?;
                Some(Arc::new(concrete) as SharedInstance)
            });
            self.bindings.push(Binding {
                capability: self_key,
                cast,
            });
        }

        Ok(BeanDefinition {
            id: self.id,
            type_name: std::any::type_name::<T>(),
            scope: self.scope,
            qualifier: self.qualifier,
            primary: self.primary,
            lazy: self.lazy,
            profile: self.profile,
            condition: self.condition,
            factory,
            bindings: self.bindings,
            injection_points: self.injection_points,
            aggregate_points: self.aggregate_points,
            value_points: self.value_points,
            post_construct: self.post_construct,
            pre_destroy: self.pre_destroy,
            properties: self.properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct SmtpConfig {
        host: String,
        port: u16,
    }

    trait Mailer: Send + Sync {}
    struct SmtpMailer;
    impl Mailer for SmtpMailer {}

    #[test]
    fn builder_defaults() {
        let definition = BeanDefinition::builder::<SmtpConfig>("smtpConfig")
            .construct(SmtpConfig::default)
            .build()
            .unwrap();

        assert_eq!(definition.id(), "smtpConfig");
        assert_eq!(definition.scope(), BeanScope::Singleton);
        assert!(!definition.is_primary());
        assert!(!definition.is_lazy());
        assert_eq!(definition.qualifier(), None);
    }

    #[test]
    fn self_binding_is_added() {
        let definition = BeanDefinition::builder::<SmtpConfig>("smtpConfig")
            .construct(SmtpConfig::default)
            .build()
            .unwrap();

        let self_key = CapabilityKey::of::<Arc<SmtpConfig>>();
        assert!(definition.capabilities().any(|c| *c == self_key));
    }

    #[test]
    fn trait_binding_declares_capability() {
        let definition = BeanDefinition::builder::<SmtpMailer>("mailService")
            .construct(|| SmtpMailer)
            .bind(|mailer: Arc<SmtpMailer>| mailer as Arc<dyn Mailer>)
            .build()
            .unwrap();

        let trait_key = CapabilityKey::of::<Arc<dyn Mailer>>();
        assert!(definition.capabilities().any(|c| *c == trait_key));
        // Self-binding still present
        assert_eq!(definition.capabilities().count(), 2);
    }

    #[test]
    fn repeated_binding_keeps_one_capability_entry() {
        let definition = BeanDefinition::builder::<SmtpMailer>("mailService")
            .construct(|| SmtpMailer)
            .bind(|mailer: Arc<SmtpMailer>| mailer as Arc<dyn Mailer>)
            .bind(|mailer: Arc<SmtpMailer>| mailer as Arc<dyn Mailer>)
            .build()
            .unwrap();

        let trait_key = CapabilityKey::of::<Arc<dyn Mailer>>();
        assert_eq!(
            definition.capabilities().filter(|c| **c == trait_key).count(),
            1
        );
        // Trait binding plus the implicit self-binding, nothing more.
        assert_eq!(definition.capabilities().count(), 2);
    }

    #[test]
    fn aggregate_points_are_recorded() {
        struct Pipeline {
            mailers: Vec<Arc<dyn Mailer>>,
        }

        let definition = BeanDefinition::builder::<Pipeline>("pipeline")
            .construct(|| Pipeline {
                mailers: Vec::new(),
            })
            .inject_all("mailers", |p: &mut Pipeline, ms: Vec<Arc<dyn Mailer>>| p.mailers = ms)
            .build()
            .unwrap();

        let points = definition.aggregate_points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].field(), "mailers");
        assert_eq!(*points[0].capability(), CapabilityKey::of::<Arc<dyn Mailer>>());
    }

    #[test]
    fn delegating_factory_is_recorded_as_the_factory() {
        struct MailerFactory;
        impl FactoryBean for MailerFactory {
            type Output = SmtpMailer;

            fn produce(&self) -> std::result::Result<SmtpMailer, BoxError> {
                Ok(SmtpMailer)
            }
        }

        let definition = BeanDefinition::builder::<SmtpMailer>("mailService")
            .from_factory(MailerFactory)
            .build()
            .unwrap();

        assert_eq!(definition.id(), "mailService");
    }

    #[test]
    fn missing_factory_is_invalid() {
        let result = BeanDefinition::builder::<SmtpConfig>("smtpConfig").build();
        assert!(matches!(
            result,
            Err(ContainerError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn malformed_value_expression_is_invalid() {
        let result = BeanDefinition::builder::<SmtpConfig>("smtpConfig")
            .construct(SmtpConfig::default)
            .value("host", "${smtp.host", |c: &mut SmtpConfig, v: String| {
                c.host = v
            })
            .build();

        assert!(matches!(
            result,
            Err(ContainerError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn value_points_are_recorded() {
        let definition = BeanDefinition::builder::<SmtpConfig>("smtpConfig")
            .construct(SmtpConfig::default)
            .value("host", "${smtp.host}", |c: &mut SmtpConfig, v: String| {
                c.host = v
            })
            .value("port", "${smtp.port:25}", |c: &mut SmtpConfig, v: u16| {
                c.port = v
            })
            .build()
            .unwrap();

        assert_eq!(definition.value_points().len(), 2);
        assert_eq!(definition.value_points()[0].field(), "host");
    }

    #[test]
    fn answers_to_id_and_qualifier() {
        let definition = BeanDefinition::builder::<SmtpConfig>("smtpConfig")
            .qualifier("smtp")
            .construct(SmtpConfig::default)
            .build()
            .unwrap();

        assert!(definition.answers_to("smtpConfig"));
        assert!(definition.answers_to("smtp"));
        assert!(!definition.answers_to("mail"));
    }

    #[test]
    fn injection_points_are_recorded() {
        struct UserService {
            config: Option<Arc<SmtpConfig>>,
        }

        let definition = BeanDefinition::builder::<UserService>("userService")
            .construct(|| UserService { config: None })
            .inject("config", |s: &mut UserService, c: Arc<SmtpConfig>| {
                s.config = Some(c)
            })
            .inject_optional_qualified(
                "fallback",
                "backup",
                |s: &mut UserService, c: Arc<SmtpConfig>| s.config = Some(c),
            )
            .build()
            .unwrap();

        let points = definition.injection_points();
        assert_eq!(points.len(), 2);
        assert!(points[0].is_required());
        assert_eq!(points[0].qualifier(), None);
        assert!(!points[1].is_required());
        assert_eq!(points[1].qualifier(), Some("backup"));
    }
}
