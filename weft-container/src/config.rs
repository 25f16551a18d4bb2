//! Configuration resolution.
//!
//! Two expression forms are supported in value injection points:
//!
//! - `${key}` / `${key:default}` — looked up across an ordered list of
//!   [`PropertySource`]s; absent keys fall back to the default or fail
//!   with `MissingRequiredProperty`.
//! - `#{beanId.property}` — resolves `beanId` through the dependency
//!   resolver, then reads the named property from the bean's declared
//!   property accessor.
//!
//! Anything else is treated as a literal value. Coercion into the target
//! field type happens at the injection point through `FromStr`.

use std::collections::HashMap;

use tracing::trace;

use crate::container::ContainerCore;
use crate::definition::{BeanDefinition, ValuePoint};
use crate::error::{ContainerError, NoSuchDefinitionError, Result};
use crate::resolver::ConstructionStack;

/// A read-only, ordered key→string mapping consulted by `${}` lookups.
pub trait PropertySource: Send + Sync {
    /// Human-readable source name, reported in [`ConfigEntry::source`].
    fn name(&self) -> &str;

    /// Looks up a key; `None` means this source has no opinion.
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory property source, optionally parsed from `key=value` text.
pub struct MapPropertySource {
    name: String,
    entries: HashMap<String, String>,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>, entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            name: name.into(),
            entries: entries.into_iter().collect(),
        }
    }

    /// Parses `key=value` lines. Blank lines and `#` comment lines are
    /// skipped; keys and values are trimmed.
    ///
    /// # Examples
    /// ```
    /// use weft_container::config::{MapPropertySource, PropertySource};
    ///
    /// let source = MapPropertySource::parse("app", "# zone setup\napp.zone = ZR\n");
    /// assert_eq!(source.get("app.zone").as_deref(), Some("ZR"));
    /// ```
    pub fn parse(name: impl Into<String>, text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                line.split_once('=')
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            })
            .collect();

        Self {
            name: name.into(),
            entries,
        }
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

/// Property source backed by process environment variables.
pub struct EnvPropertySource;

impl PropertySource for EnvPropertySource {
    fn name(&self) -> &str {
        "env"
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Ordered list of property sources; the first source with a value wins.
#[derive(Default)]
pub struct PropertySources {
    sources: Vec<Box<dyn PropertySource>>,
}

impl PropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source with lower priority than everything before it.
    pub fn push(&mut self, source: impl PropertySource + 'static) {
        self.sources.push(Box::new(source));
    }

    /// Looks up a key across all sources in priority order.
    pub fn lookup(&self, key: &str) -> Option<ConfigEntry> {
        self.sources.iter().find_map(|source| {
            source.get(key).map(|value| ConfigEntry {
                key: key.to_string(),
                value,
                source: source.name().to_string(),
                default: None,
            })
        })
    }

    /// Resolves a placeholder, falling back to `default` when no source
    /// has the key. `None` means the key is required but missing.
    pub fn resolve_placeholder(&self, key: &str, default: Option<&str>) -> Option<ConfigEntry> {
        if let Some(entry) = self.lookup(key) {
            return Some(ConfigEntry {
                default: default.map(str::to_string),
                ..entry
            });
        }

        default.map(|value| ConfigEntry {
            key: key.to_string(),
            value: value.to_string(),
            source: "default".to_string(),
            default: Some(value.to_string()),
        })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// A resolved configuration value and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    /// Name of the winning property source, or `"default"`.
    pub source: String,
    pub default: Option<String>,
}

/// A parsed value expression, produced at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyExpr {
    /// `${key}` or `${key:default}`
    Placeholder {
        key: String,
        default: Option<String>,
    },
    /// `#{beanId.property}`
    BeanProperty { bean_id: String, property: String },
    /// Anything that is not one of the two expression forms.
    Literal(String),
}

impl PropertyExpr {
    /// Parses a raw expression string.
    ///
    /// # Errors
    /// Returns a human-readable reason for malformed `${...}` / `#{...}`
    /// forms; the definition builder wraps it into `InvalidDefinition`.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        if let Some(rest) = raw.strip_prefix("${") {
            let inner = rest
                .strip_suffix('}')
                .ok_or_else(|| format!("unterminated placeholder: {raw:?}"))?;

            let (key, default) = match inner.split_once(':') {
                Some((key, default)) => (key.trim(), Some(default.to_string())),
                None => (inner.trim(), None),
            };

            if key.is_empty() {
                return Err(format!("empty key in placeholder: {raw:?}"));
            }

            return Ok(PropertyExpr::Placeholder {
                key: key.to_string(),
                default,
            });
        }

        if let Some(rest) = raw.strip_prefix("#{") {
            let inner = rest
                .strip_suffix('}')
                .ok_or_else(|| format!("unterminated bean reference: {raw:?}"))?;

            let (bean_id, property) = inner
                .split_once('.')
                .ok_or_else(|| format!("bean reference needs `beanId.property`: {raw:?}"))?;

            let (bean_id, property) = (bean_id.trim(), property.trim());
            if bean_id.is_empty() || property.is_empty() {
                return Err(format!("bean reference needs `beanId.property`: {raw:?}"));
            }

            return Ok(PropertyExpr::BeanProperty {
                bean_id: bean_id.to_string(),
                property: property.to_string(),
            });
        }

        Ok(PropertyExpr::Literal(raw.to_string()))
    }
}

impl ContainerCore {
    /// Resolves a value point's expression to its raw string form.
    ///
    /// Coercion into the field type happens in the point's assign
    /// closure, which carries the concrete target type.
    pub(crate) fn resolve_value(
        &self,
        definition: &BeanDefinition,
        point: &ValuePoint,
        stack: &mut ConstructionStack,
    ) -> Result<String> {
        match &point.expr {
            PropertyExpr::Literal(value) => Ok(value.clone()),

            PropertyExpr::Placeholder { key, default } => {
                let entry = self
                    .config
                    .resolve_placeholder(key, default.as_deref())
                    .ok_or_else(|| ContainerError::MissingRequiredProperty {
                        key: key.clone(),
                        field: point.field.to_string(),
                        bean_id: definition.id().to_string(),
                    })?;

                trace!(
                    key = %entry.key,
                    source = %entry.source,
                    "Resolved placeholder"
                );
                Ok(entry.value)
            }

            PropertyExpr::BeanProperty { bean_id, property } => {
                let target = self.registry.get(bean_id).cloned().ok_or_else(|| {
                    ContainerError::NoSuchDefinition(NoSuchDefinitionError {
                        requested: bean_id.clone(),
                        qualifier: None,
                        required_by: Some(definition.id().to_string()),
                        suggestions: self.registry.suggest(bean_id),
                    })
                })?;

                let resolved = self.acquire(&target, stack)?;

                let accessor = target.property_accessor().ok_or_else(|| {
                    ContainerError::PropertyNotFound {
                        bean_id: bean_id.clone(),
                        property: property.clone(),
                    }
                })?;

                accessor(resolved.raw_value(), property).ok_or_else(|| {
                    ContainerError::PropertyNotFound {
                        bean_id: bean_id.clone(),
                        property: property.clone(),
                    }
                })
            }
        }
    }
}
