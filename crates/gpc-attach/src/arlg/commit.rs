//! Commit coordinator.
//!
//! Hardware notifications are queued as they are produced and flushed
//! once per configuration transaction. Groups whose publication was
//! blocked are marked deferred and retried on every commit.

use log::debug;

use super::orch::ArlgOrch;
use crate::gpc::{HwNotifier, HwScope, RulesetBinding};

#[derive(Debug)]
pub struct CommitCoordinator {
    hw: HwNotifier,
    /// Some group is marked deferred.
    deferrals: bool,
    /// A configuration transaction is in flight; its commit will follow.
    commit_pending: bool,
}

impl CommitCoordinator {
    pub fn new(hw: HwNotifier) -> Self {
        Self {
            hw,
            deferrals: false,
            commit_pending: false,
        }
    }

    pub fn hw(&self) -> &HwNotifier {
        &self.hw
    }

    pub fn has_deferrals(&self) -> bool {
        self.deferrals
    }

    pub fn is_commit_pending(&self) -> bool {
        self.commit_pending
    }

    pub(crate) fn set_deferrals(&mut self) {
        self.deferrals = true;
    }

    pub(crate) fn set_commit_pending(&mut self) {
        self.commit_pending = true;
    }

    /// Lends the notifier and the deferral flag to operations on groups
    /// of one ruleset.
    pub(crate) fn scope<'a>(&'a mut self, binding: &'a RulesetBinding) -> HwScope<'a> {
        HwScope {
            binding,
            hw: &mut self.hw,
            deferrals: &mut self.deferrals,
        }
    }

    /// Clears and returns the deferral flag. Groups re-deferred after
    /// this point raise it again for the next commit.
    fn take_deferrals(&mut self) -> bool {
        std::mem::take(&mut self.deferrals)
    }

    fn finish(&mut self) {
        self.hw.flush();
        self.commit_pending = false;
    }
}

impl ArlgOrch {
    /// Retries deferred groups, then flushes every queued notification as
    /// one unit.
    pub fn commit(&mut self) {
        if self.coordinator.take_deferrals() {
            for ruleset in self.rulesets.values_mut() {
                let mut scope = self.coordinator.scope(&ruleset.binding);
                for group in ruleset.groups.iter_mut().filter(|g| g.is_deferred()) {
                    debug!(
                        "{}: processing deferred group",
                        scope.binding.context(group.name())
                    );
                    group.deferred = false;
                    self.stats.deferred_processed += 1;
                    // May defer again, e.g. while the interface is missing.
                    group.publish(&mut scope);
                }
            }
        }

        self.coordinator.finish();
        self.stats.commits += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arlg::ArlgConfig;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use vplane_fal::{FalOp, SoftFal};
    use vplane_npf_common::{InterfaceTable, PmfRule, RuleGroupStore};
    use vplane_types::{AddressFamily, Direction, IfIndex};

    #[test]
    fn test_commit_flushes_once() {
        let fal = SoftFal::new();
        let interfaces = Arc::new(InterfaceTable::new());
        interfaces.add("dp0p1", IfIndex::new(3).unwrap());
        interfaces.set_created("dp0p1").unwrap();
        let mut orch = ArlgOrch::new(
            ArlgConfig::default(),
            Arc::new(fal.clone()),
            Arc::new(RuleGroupStore::new()),
            interfaces,
        );
        orch.ruleset_add("dp0p1", Direction::In);
        orch.group_add("dp0p1", Direction::In, "web").unwrap();

        // Not published yet: no family.
        orch.commit();
        assert!(fal.calls().is_empty());
        assert!(!orch.coordinator().has_deferrals());
        assert_eq!(orch.stats().deferred_processed, 1);

        let key = crate::gpc::RulesetKey::new("dp0p1", Direction::In);
        let ruleset = orch.rulesets.get_mut(&key).unwrap();
        let mut scope = orch.coordinator.scope(&ruleset.binding);
        ruleset.groups[0]
            .rule_add(
                &mut scope,
                &orch.config,
                vplane_npf_common::ATTR_RULE_INDEX,
                &PmfRule::attr(Some(AddressFamily::V4)),
            )
            .unwrap();
        assert_eq!(orch.coordinator().hw().queued(), 2);

        orch.commit();
        orch.commit();
        assert_eq!(
            fal.ops(),
            vec![FalOp::GroupCreate, FalOp::GroupAttach, FalOp::Commit]
        );
        assert!(!orch.coordinator().is_commit_pending());
    }
}
