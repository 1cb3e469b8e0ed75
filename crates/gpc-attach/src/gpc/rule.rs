//! A rule inside an attached group.

use vplane_fal::FalRuleOid;
use vplane_npf_common::PmfRule;

use super::cntr::CounterId;

#[derive(Debug, Clone)]
pub struct GroupRule {
    pub(crate) index: u32,
    pub(crate) rule: PmfRule,
    /// Counter selected by this rule. The rule holds one reference on it.
    pub(crate) counter: Option<CounterId>,
    pub(crate) published: bool,
    pub(crate) ll_created: bool,
    pub(crate) objid: Option<FalRuleOid>,
}

impl GroupRule {
    pub fn new(index: u32, rule: PmfRule, counter: Option<CounterId>) -> Self {
        Self {
            index,
            rule,
            counter,
            published: false,
            ll_created: false,
            objid: None,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn rule(&self) -> &PmfRule {
        &self.rule
    }

    pub fn counter(&self) -> Option<CounterId> {
        self.counter
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn is_ll_created(&self) -> bool {
        self.ll_created
    }

    pub fn objid(&self) -> Option<FalRuleOid> {
        self.objid
    }
}
