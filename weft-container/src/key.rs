//! Capability identification keys.
//!
//! [`CapabilityKey`] identifies the contract a bean is requested by —
//! typically `Arc<Concrete>` or `Arc<dyn Trait>` — independent of which
//! definition ends up satisfying the request.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a capability type within the container.
///
/// Several definitions may declare the same capability; disambiguation
/// happens at resolution time through qualifiers and `primary` marks,
/// so the key itself carries no name.
///
/// # Examples
/// ```
/// use weft_container::key::CapabilityKey;
/// use std::sync::Arc;
///
/// let key = CapabilityKey::of::<Arc<String>>();
/// assert!(key.type_name().contains("String"));
/// ```
#[derive(Clone, Copy)]
pub struct CapabilityKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl CapabilityKey {
    /// Creates a key for capability type `P`.
    #[inline]
    pub fn of<P: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: type_name::<P>(),
        }
    }

    /// Returns the [`TypeId`] of this capability.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the human-readable type name.
    ///
    /// Used in error messages for better developer experience.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name with module paths stripped.
    #[inline]
    pub fn short_name(&self) -> String {
        weft_support::rendering::shorten_type_name(self.type_name)
    }
}

impl PartialEq for CapabilityKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for CapabilityKey {}

impl Hash for CapabilityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityKey({})", self.type_name)
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)
    }
}
