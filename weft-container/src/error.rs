//! Error types for Weft container operations.
//!
//! Weft provides detailed, actionable error messages.
//! No more `BeanCreationException: 0x7f3a2b1c`.

use std::fmt;

use weft_support::rendering::{CandidateEntry, render_candidates, render_chain};

/// Boxed error used for factory, hook and advice failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Weft operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// A definition with the same id was already registered.
    #[error("{}", .0)]
    DuplicateDefinition(DuplicateDefinitionError),

    /// No definition satisfies the requested capability or id.
    #[error("{}", .0)]
    NoSuchDefinition(NoSuchDefinitionError),

    /// Several definitions satisfy an unqualified request and none
    /// (or more than one) is marked primary.
    #[error("{}", .0)]
    NoUniqueDefinition(NoUniqueDefinitionError),

    /// More than one definition of the same capability is marked primary.
    #[error("{}", .0)]
    AmbiguousPrimary(AmbiguousPrimaryError),

    /// A construction chain revisited a definition already being built.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A `${key}` placeholder without default found no value in any source.
    #[error(
        "missing required property {key:?} for field `{field}` of bean {bean_id:?} (no default given)"
    )]
    MissingRequiredProperty {
        key: String,
        field: String,
        bean_id: String,
    },

    /// A property string could not be coerced into the target field type.
    #[error(
        "cannot coerce {raw:?} into {target_type} for field `{field}` of bean {bean_id:?}: {message}"
    )]
    TypeCoercion {
        bean_id: String,
        field: String,
        raw: String,
        target_type: &'static str,
        message: String,
    },

    /// A `#{beanId.property}` reference named a property the bean does not expose.
    #[error("property {property:?} not found on bean {bean_id:?}")]
    PropertyNotFound { bean_id: String, property: String },

    /// A post-construct or pre-destroy hook returned an error.
    #[error("{hook} hook failed for bean {bean_id:?}: {source}")]
    LifecycleHook {
        bean_id: String,
        hook: &'static str,
        #[source]
        source: BoxError,
    },

    /// Factory or injection failure while building an instance.
    #[error("failed to construct bean {bean_id:?}: {source}")]
    ConstructionFailed {
        bean_id: String,
        #[source]
        source: BoxError,
    },

    /// A definition was malformed (no factory, bad property expression, ...).
    #[error("invalid definition {id:?}: {reason}")]
    InvalidDefinition { id: String, reason: String },

    /// The container has already been shut down.
    #[error("container has been shut down")]
    ContainerClosed,
}

/// Error when a definition id is registered twice.
#[derive(Debug)]
pub struct DuplicateDefinitionError {
    pub id: String,
}

impl fmt::Display for DuplicateDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Definition id already registered: {:?}", self.id)?;
        write!(
            f,
            "\n  Hint: every bean id must be unique across the registry"
        )
    }
}

/// Error when no definition satisfies a request.
///
/// Includes helpful hints about what went wrong.
#[derive(Debug)]
pub struct NoSuchDefinitionError {
    /// The requested capability type name or bean id
    pub requested: String,
    /// The qualifier the request carried, if any
    pub qualifier: Option<String>,
    /// What required this dependency (if known)
    pub required_by: Option<String>,
    /// Similar ids or capabilities that ARE registered
    pub suggestions: Vec<String>,
}

impl fmt::Display for NoSuchDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No definition found for: {}", self.requested)?;

        if let Some(ref q) = self.qualifier {
            write!(f, " (qualifier {q:?})")?;
        }

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: Did you forget to register a definition for it?"
        )
    }
}

/// Error when an unqualified request matches several definitions.
///
/// Lists every candidate so you can see what to qualify or mark primary.
#[derive(Debug)]
pub struct NoUniqueDefinitionError {
    /// The requested capability type name
    pub capability: String,
    /// The candidate definitions, in registration order
    pub candidates: Vec<CandidateEntry>,
    /// What required this dependency (if known)
    pub required_by: Option<String>,
}

impl fmt::Display for NoUniqueDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "No unique definition for {}: {} candidates",
            self.capability,
            self.candidates.len()
        )?;

        write!(f, "{}", render_candidates(&self.candidates))?;

        if let Some(ref parent) = self.required_by {
            writeln!(f, "  Required by: {parent}")?;
        }

        write!(
            f,
            "  Hint: mark exactly one candidate primary, or request with a qualifier"
        )
    }
}

/// Error when several definitions of one capability are marked primary.
#[derive(Debug)]
pub struct AmbiguousPrimaryError {
    /// The capability type name
    pub capability: String,
    /// Ids of the definitions marked primary
    pub primaries: Vec<String>,
}

impl fmt::Display for AmbiguousPrimaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Multiple primary definitions for {}: {}",
            self.capability,
            self.primaries.join(", ")
        )?;
        write!(f, "\n  Hint: at most one definition per capability may be primary")
    }
}

/// Error when a circular dependency is detected.
///
/// Shows the full construction chain so you can see WHERE the cycle is.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// The chain of bean ids that forms the cycle.
    /// Example: ["a", "b", "c", "a"]
    pub chain: Vec<String>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected:\n  ")?;
        write!(f, "{}", render_chain(&self.chain))?;
        write!(
            f,
            "\n  Hint: break the cycle with an optional injection or restructure the beans"
        )
    }
}

/// Convenient Result type for Weft operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
