//! An attached rule group and its hardware notifications.
//!
//! The helpers here enforce the gating rules of the hardware mirror:
//!
//! - a group is created only once it has an address family, and only if
//!   the ruleset's interface exists at the hardware layer (otherwise it is
//!   marked deferred);
//! - rules and counters reach the hardware only while the group is
//!   published;
//! - attach needs a published group and a bound interface;
//! - objects whose low-level create failed stay logically published, and
//!   their later delete/detach skips the FAL.

use log::debug;
use vplane_fal::{FalGroupOid, GroupCreate, RuleCreate};
use vplane_npf_common::{PmfRule, RuleSummary, SyncMap};
use vplane_types::{AddressFamily, IfIndex};

use super::cntr::{CounterGroup, CounterId};
use super::hw::{HwNotifier, HwScope};
use super::rule::GroupRule;

#[derive(Debug)]
pub struct Group {
    pub(crate) name: String,
    pub(crate) rules: SyncMap<u32, GroupRule>,
    pub(crate) attr_rule: Option<PmfRule>,
    pub(crate) cntg: Option<CounterGroup>,
    pub(crate) summary: RuleSummary,
    pub(crate) rule_count: u32,
    pub(crate) published: bool,
    pub(crate) attached: bool,
    pub(crate) deferred: bool,
    /// An attribute rule has been seen and not yet withdrawn.
    pub(crate) attr_flag: bool,
    pub(crate) family: Option<AddressFamily>,
    pub(crate) ll_created: bool,
    pub(crate) ll_attached: Option<IfIndex>,
    pub(crate) objid: Option<FalGroupOid>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: SyncMap::new(),
            attr_rule: None,
            cntg: None,
            summary: RuleSummary::empty(),
            rule_count: 0,
            published: false,
            attached: false,
            deferred: false,
            attr_flag: false,
            family: None,
            ll_created: false,
            ll_attached: None,
            objid: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_count(&self) -> u32 {
        self.rule_count
    }

    pub fn summary(&self) -> RuleSummary {
        self.summary
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn has_attr_flag(&self) -> bool {
        self.attr_flag
    }

    pub fn family(&self) -> Option<AddressFamily> {
        self.family
    }

    pub fn is_ll_created(&self) -> bool {
        self.ll_created
    }

    pub fn is_ll_attached(&self) -> bool {
        self.ll_attached.is_some()
    }

    pub fn objid(&self) -> Option<FalGroupOid> {
        self.objid
    }

    pub fn attr_rule(&self) -> Option<&PmfRule> {
        self.attr_rule.as_ref()
    }

    pub fn cntg(&self) -> Option<&CounterGroup> {
        self.cntg.as_ref()
    }

    pub fn rule(&self, index: u32) -> Option<&GroupRule> {
        self.rules.get(&index)
    }

    pub fn rules(&self) -> impl Iterator<Item = &GroupRule> {
        self.rules.values()
    }

    /// FAL handle of the group, only when it exists in the hardware.
    fn fal_handle(&self) -> Option<FalGroupOid> {
        if self.ll_created {
            self.objid
        } else {
            None
        }
    }

    /// Union of the attribute rule's summary and every rule's summary.
    pub fn compute_summary(&self) -> RuleSummary {
        let attr = self
            .attr_rule
            .as_ref()
            .map_or(RuleSummary::empty(), |r| r.summary);
        self.rules.values().fold(attr, |acc, r| acc | r.rule.summary)
    }

    pub fn has_published_rules(&self) -> bool {
        self.rules.values().any(GroupRule::is_published)
    }

    /// Counter a rule refers to, by name.
    pub fn rule_counter_name(&self, index: u32) -> Option<&str> {
        let id = self.rules.get(&index)?.counter?;
        self.cntg.as_ref()?.get(id).map(|c| c.name())
    }

    // ===== Group =====

    /// Creates the group in the hardware. Returns false when the group
    /// stays unpublished (no family yet, or deferred).
    pub fn hw_create(&mut self, scope: &mut HwScope<'_>) -> bool {
        if self.published {
            return true;
        }
        let Some(family) = self.family else {
            return false;
        };
        if !scope.binding.if_created {
            debug!(
                "{}: interface not created, deferring",
                scope.binding.context(&self.name)
            );
            self.deferred = true;
            scope.defer();
            return false;
        }

        self.published = true;
        self.summary = self.compute_summary();
        let req = GroupCreate {
            ifname: scope.binding.ifname.clone(),
            direction: scope.binding.direction,
            name: self.name.clone(),
            family,
            summary: self.summary.bits(),
        };
        if let Some(oid) = scope.hw.group_create(&req) {
            self.objid = Some(oid);
            self.ll_created = true;
        }
        true
    }

    /// Recomputes the summary and sends it to the hardware.
    pub fn hw_modify(&mut self, hw: &mut HwNotifier) {
        self.summary = self.compute_summary();
        if !self.published {
            return;
        }
        if let Some(oid) = self.fal_handle() {
            hw.group_modify(oid, self.summary.bits());
        }
    }

    pub fn hw_delete(&mut self, hw: &mut HwNotifier) {
        if !self.published {
            return;
        }
        if let Some(oid) = self.fal_handle() {
            hw.group_delete(oid);
        }
        self.published = false;
        self.ll_created = false;
        self.objid = None;
    }

    pub fn hw_attach(&mut self, scope: &mut HwScope<'_>) {
        if !self.published || self.attached {
            return;
        }
        let Some(ifp) = scope.binding.ifp.as_ref() else {
            return;
        };
        self.attached = true;
        if let Some(oid) = self.fal_handle() {
            if scope.hw.group_attach(oid, ifp.ifindex, scope.binding.direction) {
                self.ll_attached = Some(ifp.ifindex);
            }
        }
    }

    pub fn hw_detach(&mut self, scope: &mut HwScope<'_>) {
        if !self.attached {
            return;
        }
        self.attached = false;
        let oid = self.fal_handle();
        if let (Some(oid), Some(ifindex)) = (oid, self.ll_attached.take()) {
            scope.hw.group_detach(oid, ifindex, scope.binding.direction);
        }
    }

    // ===== Rules =====

    /// Publishes one rule, creating it in the hardware when the group
    /// exists there.
    pub fn rule_hw_create(&mut self, index: u32, hw: &mut HwNotifier) {
        if !self.published {
            return;
        }
        let group_oid = self.fal_handle();
        let Some(rule) = self.rules.get_mut(&index) else {
            return;
        };
        if rule.published {
            return;
        }
        rule.published = true;
        let Some(group) = group_oid else {
            return;
        };
        let counter = rule
            .counter
            .and_then(|id| self.cntg.as_ref().and_then(|c| c.objid(id)));
        let req = RuleCreate {
            group,
            index,
            summary: rule.rule.summary.bits(),
            counter,
        };
        if let Some(oid) = hw.rule_create(&req) {
            rule.objid = Some(oid);
            rule.ll_created = true;
        }
    }

    pub fn rule_hw_delete(&mut self, index: u32, hw: &mut HwNotifier) {
        if let Some(rule) = self.rules.get_mut(&index) {
            unpublish_rule(rule, hw);
        }
    }

    pub fn hw_rules_create(&mut self, hw: &mut HwNotifier) {
        let indices: Vec<u32> = self.rules.keys().copied().collect();
        for index in indices {
            self.rule_hw_create(index, hw);
        }
    }

    /// Removes every rule from the hardware, highest index first.
    pub fn hw_rules_delete(&mut self, hw: &mut HwNotifier) {
        for rule in self.rules.values_mut().rev() {
            unpublish_rule(rule, hw);
        }
    }

    // ===== Counters =====

    pub fn cntr_hw_create(&mut self, id: CounterId, hw: &mut HwNotifier) {
        if !self.published {
            return;
        }
        let group = self.fal_handle();
        if let Some(cntg) = self.cntg.as_mut() {
            cntg.hw_create(id, group, hw);
        }
    }

    pub fn hw_cntrs_create(&mut self, hw: &mut HwNotifier) {
        if !self.published {
            return;
        }
        let group = self.fal_handle();
        if let Some(cntg) = self.cntg.as_mut() {
            cntg.hw_create_all(group, hw);
        }
    }

    pub fn hw_cntrs_delete(&mut self, hw: &mut HwNotifier) {
        if let Some(cntg) = self.cntg.as_mut() {
            cntg.hw_delete_all(hw);
        }
    }

    // ===== Whole group =====

    /// Makes the group visible: group, then counters, then rules, then
    /// attach.
    pub fn publish(&mut self, scope: &mut HwScope<'_>) {
        self.hw_create(scope);
        self.hw_cntrs_create(scope.hw);
        self.hw_rules_create(scope.hw);
        self.hw_attach(scope);
    }

    /// Removes the group from the hardware in the reverse order of
    /// [`Group::publish`].
    pub fn teardown(&mut self, scope: &mut HwScope<'_>) {
        self.hw_detach(scope);
        self.hw_rules_delete(scope.hw);
        self.hw_cntrs_delete(scope.hw);
        self.hw_delete(scope.hw);
    }
}

fn unpublish_rule(rule: &mut GroupRule, hw: &mut HwNotifier) {
    if !rule.published {
        return;
    }
    if rule.ll_created {
        if let Some(oid) = rule.objid {
            hw.rule_delete(oid);
        }
    }
    rule.published = false;
    rule.ll_created = false;
    rule.objid = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpc::cntr::CounterType;
    use crate::gpc::rlset::RulesetBinding;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use vplane_fal::{FalOp, SoftFal};
    use vplane_npf_common::InterfaceRef;
    use vplane_types::Direction;

    fn bound(created: bool) -> RulesetBinding {
        let mut binding = RulesetBinding::new("dp0p1", Direction::In);
        binding.ifp = Some(InterfaceRef {
            name: "dp0p1".to_string(),
            ifindex: IfIndex::new(7).unwrap(),
        });
        binding.if_created = created;
        binding
    }

    fn group_with_rules() -> Group {
        let mut group = Group::new("web");
        group.family = Some(AddressFamily::V4);
        group.attr_rule = Some(PmfRule::attr(Some(AddressFamily::V4)).count_numbered());
        let mut cntg = CounterGroup::new(CounterType::Numbered, 8, false);
        for index in [10, 20] {
            let id = cntg.alloc_numbered(index).unwrap();
            group
                .rules
                .insert(index, GroupRule::new(index, PmfRule::pass(), Some(id)));
        }
        group.rule_count = 2;
        group.cntg = Some(cntg);
        group
    }

    #[test]
    fn test_publish_order_and_teardown_order() {
        let fal = SoftFal::new();
        let mut hw = HwNotifier::new(Arc::new(fal.clone()));
        let binding = bound(true);
        let mut deferrals = false;
        let mut group = group_with_rules();

        let mut scope = HwScope {
            binding: &binding,
            hw: &mut hw,
            deferrals: &mut deferrals,
        };
        group.publish(&mut scope);
        assert!(group.is_published());
        assert!(group.is_ll_created());
        assert!(group.is_attached());
        assert!(group.is_ll_attached());
        assert!(group.rules().all(|r| r.is_published() && r.is_ll_created()));
        assert_eq!(
            fal.ops(),
            vec![
                FalOp::GroupCreate,
                FalOp::CounterCreate,
                FalOp::CounterCreate,
                FalOp::RuleCreate,
                FalOp::RuleCreate,
                FalOp::GroupAttach,
            ]
        );

        fal.take_calls();
        group.teardown(&mut scope);
        assert!(!group.is_published());
        assert!(!group.is_attached());
        assert_eq!(
            fal.ops(),
            vec![
                FalOp::GroupDetach,
                FalOp::RuleDelete,
                FalOp::RuleDelete,
                FalOp::CounterDelete,
                FalOp::CounterDelete,
                FalOp::GroupDelete,
            ]
        );
        assert_eq!(fal.group_count(), 0);
        assert_eq!(fal.counter_count(), 0);
        assert!(!deferrals);
    }

    #[test]
    fn test_create_defers_without_interface() {
        let fal = SoftFal::new();
        let mut hw = HwNotifier::new(Arc::new(fal.clone()));
        let binding = bound(false);
        let mut deferrals = false;
        let mut group = group_with_rules();

        let mut scope = HwScope {
            binding: &binding,
            hw: &mut hw,
            deferrals: &mut deferrals,
        };
        group.publish(&mut scope);
        assert!(!group.is_published());
        assert!(group.is_deferred());
        assert!(deferrals);
        assert!(fal.calls().is_empty());
    }

    #[test]
    fn test_no_family_no_publish() {
        let fal = SoftFal::new();
        let mut hw = HwNotifier::new(Arc::new(fal.clone()));
        let binding = bound(true);
        let mut deferrals = false;
        let mut group = group_with_rules();
        group.family = None;

        let mut scope = HwScope {
            binding: &binding,
            hw: &mut hw,
            deferrals: &mut deferrals,
        };
        assert!(!group.hw_create(&mut scope));
        assert!(!group.is_deferred());
        assert!(fal.calls().is_empty());
    }

    #[test]
    fn test_attach_needs_interface() {
        let fal = SoftFal::new();
        let mut hw = HwNotifier::new(Arc::new(fal.clone()));
        let mut binding = bound(true);
        binding.ifp = None;
        let mut deferrals = false;
        let mut group = group_with_rules();

        let mut scope = HwScope {
            binding: &binding,
            hw: &mut hw,
            deferrals: &mut deferrals,
        };
        group.publish(&mut scope);
        assert!(group.is_published());
        assert!(!group.is_attached());

        // Detach of a never attached group is silent.
        fal.take_calls();
        group.hw_detach(&mut scope);
        assert!(fal.calls().is_empty());
    }

    #[test]
    fn test_failed_group_create_skips_dependents() {
        let fal = SoftFal::new();
        fal.set_fail(FalOp::GroupCreate, true);
        let mut hw = HwNotifier::new(Arc::new(fal.clone()));
        let binding = bound(true);
        let mut deferrals = false;
        let mut group = group_with_rules();

        let mut scope = HwScope {
            binding: &binding,
            hw: &mut hw,
            deferrals: &mut deferrals,
        };
        group.publish(&mut scope);
        assert!(group.is_published());
        assert!(!group.is_ll_created());
        assert!(group.is_attached());
        assert!(!group.is_ll_attached());
        assert!(group.rules().all(|r| r.is_published() && !r.is_ll_created()));

        // Counters are still created, without an owning group handle.
        assert_eq!(
            fal.ops(),
            vec![
                FalOp::GroupCreate,
                FalOp::CounterCreate,
                FalOp::CounterCreate
            ]
        );
    }

    #[test]
    fn test_summary_covers_attr_and_rules() {
        let mut group = group_with_rules();
        group
            .rules
            .insert(30, GroupRule::new(30, PmfRule::block().counted(), None));
        // Unpublished rules count as well.
        assert!(!group.has_published_rules());
        let summary = group.compute_summary();
        assert!(summary.contains(RuleSummary::IP_FAMILY | RuleSummary::COUNT_DEF));
        assert!(summary.contains(RuleSummary::PASS | RuleSummary::DROP | RuleSummary::COUNT_REF));
        assert_eq!(group.rule_counter_name(10), Some("10"));
        assert_eq!(group.rule_counter_name(30), None);
    }
}
