//! Type-safe FAL object ID wrappers.
//!
//! Groups, rules and counters are all plain `u64` handles at the FAL
//! boundary. Wrapping them in [`FalObjectId`] with a marker kind stops a
//! rule handle from being passed where a counter handle is expected.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw FAL object handle.
pub type RawFalObjectId = u64;

/// Marker trait for FAL object kinds.
pub trait FalObjectKind: Send + Sync + 'static {
    /// Returns the object kind name for debugging.
    fn type_name() -> &'static str;
}

/// A type-safe FAL object ID.
///
/// ```
/// use vplane_fal::{FalCounterOid, FalRuleOid};
///
/// let rule = FalRuleOid::from_raw(0x11).unwrap();
/// let cntr = FalCounterOid::from_raw(0x12).unwrap();
/// assert_ne!(rule.as_raw(), cntr.as_raw());
///
/// // Does not compile:
/// // fn takes_rule(_: FalRuleOid) {}
/// // takes_rule(cntr);
/// ```
#[derive(Clone, Copy)]
pub struct FalObjectId<T: FalObjectKind> {
    raw: RawFalObjectId,
    _marker: PhantomData<T>,
}

impl<T: FalObjectKind> FalObjectId<T> {
    /// The null handle.
    pub const NULL: Self = Self {
        raw: 0,
        _marker: PhantomData,
    };

    /// Wraps a raw handle. Returns `None` for the null handle.
    pub fn from_raw(raw: RawFalObjectId) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self {
                raw,
                _marker: PhantomData,
            })
        }
    }

    pub const fn as_raw(&self) -> RawFalObjectId {
        self.raw
    }

    pub const fn is_null(&self) -> bool {
        self.raw == 0
    }

    pub const fn is_valid(&self) -> bool {
        self.raw != 0
    }
}

impl<T: FalObjectKind> fmt::Debug for FalObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:x})", T::type_name(), self.raw)
    }
}

impl<T: FalObjectKind> fmt::Display for FalObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.raw)
    }
}

impl<T: FalObjectKind> PartialEq for FalObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: FalObjectKind> Eq for FalObjectId<T> {}

impl<T: FalObjectKind> Hash for FalObjectId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: FalObjectKind> Default for FalObjectId<T> {
    fn default() -> Self {
        Self::NULL
    }
}

// ============================================================================
// Object Kind Markers
// ============================================================================

macro_rules! define_object_kind {
    ($name:ident, $type_name:literal, $oid_alias:ident) => {
        /// Marker type for FAL $type_name objects.
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl FalObjectKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        /// Type alias for $type_name object IDs.
        pub type $oid_alias = FalObjectId<$name>;
    };
}

define_object_kind!(GroupKind, "Group", FalGroupOid);
define_object_kind!(RuleKind, "Rule", FalRuleOid);
define_object_kind!(CounterKind, "Counter", FalCounterOid);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_null_handle() {
        assert!(FalGroupOid::from_raw(0).is_none());
        assert!(FalGroupOid::NULL.is_null());
        assert_eq!(FalRuleOid::default(), FalRuleOid::NULL);
    }

    #[test]
    fn test_handle_format() {
        let oid = FalCounterOid::from_raw(0x2a).unwrap();
        assert!(oid.is_valid());
        assert_eq!(format!("{}", oid), "2a");
        assert_eq!(format!("{:?}", oid), "Counter(0x2a)");
    }
}
