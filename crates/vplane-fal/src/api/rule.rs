//! Rule entry requests.

use crate::types::{FalCounterOid, FalGroupOid};

/// Parameters for creating a rule entry inside a group.
///
/// A rule entry embeds the handle of its counter, so changing a rule's
/// counter requires deleting and recreating the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCreate {
    pub group: FalGroupOid,
    pub index: u32,
    pub summary: u32,
    pub counter: Option<FalCounterOid>,
}
