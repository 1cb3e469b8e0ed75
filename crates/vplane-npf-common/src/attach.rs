//! Attach points, ruleset types and rule-group keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use vplane_types::Direction;

/// Kind of object a ruleset can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachType {
    Interface,
    Global,
    Zone,
}

/// Class of a rule group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleClass {
    Fw,
    Acl,
    Nat,
    Pbr,
}

impl RuleClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RuleClass::Fw => "fw",
            RuleClass::Acl => "acl",
            RuleClass::Nat => "nat",
            RuleClass::Pbr => "pbr",
        }
    }
}

/// Type of a ruleset hanging off an attach point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesetType {
    FwIn,
    FwOut,
    AclIn,
    AclOut,
    Pbr,
    Local,
}

impl RulesetType {
    /// Returns the ACL ruleset type for a direction.
    pub const fn acl(dir: Direction) -> Self {
        match dir {
            Direction::In => RulesetType::AclIn,
            Direction::Out => RulesetType::AclOut,
        }
    }

    /// Direction of an ACL ruleset, `None` for every other type.
    pub const fn acl_direction(&self) -> Option<Direction> {
        match self {
            RulesetType::AclIn => Some(Direction::In),
            RulesetType::AclOut => Some(Direction::Out),
            _ => None,
        }
    }
}

/// Identity of an attach point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttachPointKey {
    #[serde(rename = "type")]
    pub attach_type: AttachType,
    /// Interface name for interface attach points.
    pub point: String,
}

impl AttachPointKey {
    pub fn interface(ifname: impl Into<String>) -> Self {
        Self {
            attach_type: AttachType::Interface,
            point: ifname.into(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.attach_type == AttachType::Interface
    }
}

/// Identity of a configured rule group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleGroupKey {
    pub class: RuleClass,
    pub name: String,
}

impl RuleGroupKey {
    pub fn acl(name: impl Into<String>) -> Self {
        Self {
            class: RuleClass::Acl,
            name: name.into(),
        }
    }
}

impl fmt::Display for RuleGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class.as_str(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_acl_ruleset_direction() {
        assert_eq!(RulesetType::acl(Direction::Out), RulesetType::AclOut);
        assert_eq!(RulesetType::AclIn.acl_direction(), Some(Direction::In));
        assert_eq!(RulesetType::FwIn.acl_direction(), None);
    }

    #[test]
    fn test_keys_serde() {
        let key = AttachPointKey::interface("dp0p1");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"type":"interface","point":"dp0p1"}"#);
        assert!(key.is_interface());

        let group: RuleGroupKey =
            serde_json::from_str(r#"{"class":"acl","name":"web"}"#).unwrap();
        assert_eq!(group, RuleGroupKey::acl("web"));
        assert_eq!(group.to_string(), "acl/web");
    }
}
