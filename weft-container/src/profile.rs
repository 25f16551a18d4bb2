//! Profile and condition evaluation.
//!
//! Definitions may be gated on a deployment profile (`"test"`, `"!test"`)
//! or on an arbitrary condition function. Both are evaluated exactly once,
//! during registry finalization, before resolution ever sees a definition.
//! Condition functions are pure functions of the [`ConditionContext`] and
//! must not touch partially constructed beans.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::PropertySources;

/// A profile predicate attached to a definition.
///
/// `"test"` accepts when the active set contains `test`;
/// `"!test"` accepts when it does not.
///
/// # Examples
/// ```
/// use weft_container::profile::{ActiveProfiles, ProfileExpr};
///
/// let active = ActiveProfiles::new(["test"]);
/// assert!(ProfileExpr::parse("test").accepts(&active));
/// assert!(!ProfileExpr::parse("!test").accepts(&active));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileExpr {
    profile: String,
    negated: bool,
}

impl ProfileExpr {
    /// Parses a profile token, with an optional leading `!` for negation.
    pub fn parse(expr: &str) -> Self {
        let expr = expr.trim();
        match expr.strip_prefix('!') {
            Some(rest) => Self {
                profile: rest.trim().to_string(),
                negated: true,
            },
            None => Self {
                profile: expr.to_string(),
                negated: false,
            },
        }
    }

    /// Evaluates this predicate against the active profile set.
    pub fn accepts(&self, active: &ActiveProfiles) -> bool {
        active.contains(&self.profile) != self.negated
    }

    /// The profile name, without negation marker.
    pub fn profile(&self) -> &str {
        &self.profile
    }
}

/// The set of active profiles for one container.
///
/// Derived from process configuration — an explicit set, or a
/// comma-separated environment variable.
#[derive(Debug, Clone, Default)]
pub struct ActiveProfiles {
    profiles: HashSet<String>,
}

impl ActiveProfiles {
    /// Empty profile set: every `"!x"` predicate holds, every `"x"` fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the set from explicit tokens.
    pub fn new<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            profiles: profiles.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads a comma-separated profile list from an environment variable.
    ///
    /// An unset or empty variable yields the empty set.
    pub fn from_env(var: &str) -> Self {
        match std::env::var(var) {
            Ok(raw) => Self::new(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            ),
            Err(_) => Self::empty(),
        }
    }

    pub fn contains(&self, profile: &str) -> bool {
        self.profiles.contains(profile)
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Condition function attached to a definition.
///
/// Evaluated once during finalization; `false` drops the definition
/// before resolution ever sees it.
pub type ConditionFn = Arc<dyn Fn(&ConditionContext<'_>) -> bool + Send + Sync>;

/// The information a condition may consult: property sources, process
/// environment and the active profile set. Nothing else — in particular
/// no bean instances, which do not exist yet at evaluation time.
pub struct ConditionContext<'a> {
    properties: &'a PropertySources,
    profiles: &'a ActiveProfiles,
}

impl<'a> ConditionContext<'a> {
    pub(crate) fn new(properties: &'a PropertySources, profiles: &'a ActiveProfiles) -> Self {
        Self {
            properties,
            profiles,
        }
    }

    /// Looks up a key across the ordered property sources.
    pub fn property(&self, key: &str) -> Option<String> {
        self.properties.lookup(key).map(|entry| entry.value)
    }

    /// Reads a process environment variable.
    pub fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    /// Returns `true` if the named profile is active.
    pub fn profile_active(&self, profile: &str) -> bool {
        self.profiles.contains(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapPropertySource;

    #[test]
    fn parse_plain_profile() {
        let expr = ProfileExpr::parse("test");
        assert_eq!(expr.profile(), "test");
        assert!(expr.accepts(&ActiveProfiles::new(["test"])));
        assert!(!expr.accepts(&ActiveProfiles::empty()));
    }

    #[test]
    fn parse_negated_profile() {
        let expr = ProfileExpr::parse("!test");
        assert_eq!(expr.profile(), "test");
        assert!(!expr.accepts(&ActiveProfiles::new(["test"])));
        assert!(expr.accepts(&ActiveProfiles::empty()));
        assert!(expr.accepts(&ActiveProfiles::new(["prod"])));
    }

    #[test]
    fn parse_trims_whitespace() {
        let expr = ProfileExpr::parse("  ! test ");
        assert_eq!(expr.profile(), "test");
        assert!(expr.accepts(&ActiveProfiles::empty()));
    }

    #[test]
    fn profiles_from_env_missing_var() {
        let profiles = ActiveProfiles::from_env("WEFT_TEST_SURELY_UNSET_VAR");
        assert!(profiles.is_empty());
    }

    #[test]
    fn profiles_from_explicit_set() {
        let profiles = ActiveProfiles::new(["test", "ci"]);
        assert!(profiles.contains("test"));
        assert!(profiles.contains("ci"));
        assert!(!profiles.contains("prod"));
    }

    #[test]
    fn condition_context_reads_properties() {
        let mut sources = PropertySources::new();
        sources.push(MapPropertySource::new(
            "app",
            [("app.smtp".to_string(), "true".to_string())],
        ));
        let profiles = ActiveProfiles::new(["test"]);
        let ctx = ConditionContext::new(&sources, &profiles);

        assert_eq!(ctx.property("app.smtp").as_deref(), Some("true"));
        assert_eq!(ctx.property("app.missing"), None);
        assert!(ctx.profile_active("test"));
        assert!(!ctx.profile_active("prod"));
    }

    #[test]
    fn condition_fn_is_plain_data() {
        let condition: ConditionFn = Arc::new(|ctx| ctx.property("app.smtp").as_deref() == Some("true"));

        let mut sources = PropertySources::new();
        sources.push(MapPropertySource::new(
            "app",
            [("app.smtp".to_string(), "true".to_string())],
        ));
        let profiles = ActiveProfiles::empty();
        assert!(condition(&ConditionContext::new(&sources, &profiles)));

        let empty = PropertySources::new();
        assert!(!condition(&ConditionContext::new(&empty, &profiles)));
    }
}
