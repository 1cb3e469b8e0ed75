//! Rulesets: one per (interface, direction).

use std::fmt;

use vplane_npf_common::InterfaceRef;
use vplane_types::Direction;

use super::group::Group;

/// Map key of a ruleset. Orders ingress before egress per interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RulesetKey {
    pub ifname: String,
    pub direction: Direction,
}

impl RulesetKey {
    pub fn new(ifname: impl Into<String>, direction: Direction) -> Self {
        Self {
            ifname: ifname.into(),
            direction,
        }
    }
}

impl fmt::Display for RulesetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.direction.padded(), self.ifname)
    }
}

/// Interface side of a ruleset.
#[derive(Debug, Clone)]
pub struct RulesetBinding {
    pub ifname: String,
    pub direction: Direction,
    /// Live interface, present while the attach point is up.
    pub ifp: Option<InterfaceRef>,
    /// The interface exists at the hardware layer.
    pub if_created: bool,
}

impl RulesetBinding {
    pub fn new(ifname: impl Into<String>, direction: Direction) -> Self {
        Self {
            ifname: ifname.into(),
            direction,
            ifp: None,
            if_created: false,
        }
    }

    pub fn is_ingress(&self) -> bool {
        self.direction.is_ingress()
    }

    /// Log context for a group on this ruleset, "Dir/ifname|group".
    pub fn context(&self, group: &str) -> String {
        format!("{}/{}|{}", self.direction.padded(), self.ifname, group)
    }

    /// Log context for one rule of a group, "Dir/ifname|group:index".
    pub fn rule_context(&self, group: &str, index: u32) -> String {
        format!("{}:{}", self.context(group), index)
    }
}

#[derive(Debug)]
pub struct Ruleset {
    pub binding: RulesetBinding,
    /// Attached groups in attachment order.
    pub groups: Vec<Group>,
}

impl Ruleset {
    pub fn new(binding: RulesetBinding) -> Self {
        Self {
            binding,
            groups: Vec::new(),
        }
    }

    pub fn key(&self) -> RulesetKey {
        RulesetKey::new(self.binding.ifname.clone(), self.binding.direction)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name() == name)
    }
}
