//! Typed event payloads.
//!
//! Every event the attached rule group engine reacts to is one variant of
//! [`DataplaneEvent`]. The serde form is what replay scripts contain.

use serde::{Deserialize, Serialize};
use vplane_types::IfIndex;

use crate::attach::{AttachPointKey, RuleGroupKey, RulesetType};
use crate::rule::PmfRule;

/// Events from the attach-point subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AttachPointEvent {
    /// The attach point's interface came into existence.
    Up { point: AttachPointKey },
    /// The attach point's interface went away.
    Down { point: AttachPointKey },
    RulesetAdd {
        point: AttachPointKey,
        ruleset: RulesetType,
    },
    RulesetDel {
        point: AttachPointKey,
        ruleset: RulesetType,
    },
    GroupAdd {
        point: AttachPointKey,
        ruleset: RulesetType,
        group: RuleGroupKey,
    },
    GroupDel {
        point: AttachPointKey,
        ruleset: RulesetType,
        group: RuleGroupKey,
    },
}

impl AttachPointEvent {
    pub fn point(&self) -> &AttachPointKey {
        match self {
            AttachPointEvent::Up { point }
            | AttachPointEvent::Down { point }
            | AttachPointEvent::RulesetAdd { point, .. }
            | AttachPointEvent::RulesetDel { point, .. }
            | AttachPointEvent::GroupAdd { point, .. }
            | AttachPointEvent::GroupDel { point, .. } => point,
        }
    }
}

/// One rule change inside a configured rule group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RuleChange {
    Add { index: u32, rule: PmfRule },
    Change { index: u32, rule: PmfRule },
    Delete { index: u32 },
}

impl RuleChange {
    pub fn index(&self) -> u32 {
        match self {
            RuleChange::Add { index, .. }
            | RuleChange::Change { index, .. }
            | RuleChange::Delete { index } => *index,
        }
    }
}

/// Events from the rule-group configuration subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroupEvent {
    pub group: RuleGroupKey,
    pub change: RuleChange,
}

/// Events from the interface subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InterfaceEvent {
    /// An interface appeared in the dataplane.
    Added { ifname: String, ifindex: IfIndex },
    /// The interface was created at the hardware layer.
    Created { ifname: String },
    Removed { ifname: String },
}

impl InterfaceEvent {
    pub fn ifname(&self) -> &str {
        match self {
            InterfaceEvent::Added { ifname, .. }
            | InterfaceEvent::Created { ifname }
            | InterfaceEvent::Removed { ifname } => ifname,
        }
    }
}

/// Everything the dispatcher delivers to event handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataplaneEvent {
    AttachPoint(AttachPointEvent),
    RuleGroup(RuleGroupEvent),
    Interface(InterfaceEvent),
    /// End of a configuration transaction.
    Commit,
}
