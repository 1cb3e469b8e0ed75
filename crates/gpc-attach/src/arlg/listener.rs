//! Attachment event listener.
//!
//! Reacts to attach-point, ruleset and group events for ACL rulesets on
//! interfaces, to interfaces being created at the hardware layer, and
//! fans rule-group configuration changes out to every attached copy of
//! the group.

use log::{debug, error, info, warn};
use vplane_npf_common::{
    AttachPointEvent, RuleChange, RuleClass, RuleEntry, RuleGroupConfig, RuleGroupEvent,
    RuleGroupKey, ATTR_RULE_INDEX,
};
use vplane_types::Direction;

use super::orch::{ArlgError, ArlgOrch, Result};
use crate::gpc::{CounterType, Group, HwScope, Ruleset, RulesetBinding, RulesetKey};

impl ArlgOrch {
    pub fn handle_attach_point(&mut self, event: &AttachPointEvent) -> Result<()> {
        let point = event.point();
        if !point.is_interface() {
            return Ok(());
        }
        let ifname = point.point.as_str();

        match event {
            AttachPointEvent::Up { .. } => {
                self.attach_point_updn(ifname, true);
                Ok(())
            }
            AttachPointEvent::Down { .. } => {
                self.attach_point_updn(ifname, false);
                Ok(())
            }
            AttachPointEvent::RulesetAdd { ruleset, .. } => {
                if let Some(dir) = ruleset.acl_direction() {
                    self.ruleset_add(ifname, dir);
                }
                Ok(())
            }
            AttachPointEvent::RulesetDel { ruleset, .. } => {
                if let Some(dir) = ruleset.acl_direction() {
                    self.ruleset_del(ifname, dir);
                }
                Ok(())
            }
            AttachPointEvent::GroupAdd { ruleset, group, .. } => {
                match (ruleset.acl_direction(), group.class) {
                    (Some(dir), RuleClass::Acl) => {
                        self.coordinator.set_commit_pending();
                        self.group_add(ifname, dir, &group.name)
                    }
                    _ => Ok(()),
                }
            }
            AttachPointEvent::GroupDel { ruleset, group, .. } => {
                match (ruleset.acl_direction(), group.class) {
                    (Some(dir), RuleClass::Acl) => {
                        self.coordinator.set_commit_pending();
                        self.group_del(ifname, dir, &group.name)
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    // ===== Rulesets =====

    pub fn ruleset_add(&mut self, ifname: &str, dir: Direction) {
        let key = RulesetKey::new(ifname, dir);
        if self.rulesets.contains_key(&key) {
            warn!("ArlgOrch: ruleset {} already present", key);
            return;
        }

        let mut binding = RulesetBinding::new(ifname, dir);
        binding.ifp = self.interfaces.lookup(ifname);
        binding.if_created = self.interfaces.is_created(ifname);
        info!(
            "ArlgOrch: ruleset {} added{}{}",
            key,
            if binding.ifp.is_some() { " IFP" } else { "" },
            if binding.if_created { " IfCrt" } else { "" }
        );
        self.rulesets.insert(key, Ruleset::new(binding));
    }

    /// Removes a ruleset, tearing down any group still attached to it.
    pub fn ruleset_del(&mut self, ifname: &str, dir: Direction) {
        let key = RulesetKey::new(ifname, dir);
        let Some(mut ruleset) = self.rulesets.remove(&key) else {
            debug!("ArlgOrch: no ruleset {} to remove", key);
            return;
        };

        let owner = key.to_string();
        let mut scope = self.coordinator.scope(&ruleset.binding);
        for mut group in ruleset.groups.drain(..) {
            warn!(
                "ArlgOrch: group {} still attached at ruleset removal",
                scope.binding.context(group.name())
            );
            destroy_group(&mut group, &mut scope, self.rule_config.as_ref(), &owner);
            self.stats.groups_deleted += 1;
        }
        info!("ArlgOrch: ruleset {} removed", key);
    }

    // ===== Groups =====

    /// Attaches a group: registers for its changes, then replays its
    /// configured rules. Any failure unwinds the group completely.
    pub fn group_add(&mut self, ifname: &str, dir: Direction, name: &str) -> Result<()> {
        let key = RulesetKey::new(ifname, dir);
        let Some(ruleset) = self.rulesets.get_mut(&key) else {
            error!("Error: No ruleset for ACL attached group {}|{}", key, name);
            return Err(ArlgError::RulesetNotFound(key.to_string()));
        };
        let context = ruleset.binding.context(name);
        if ruleset.group(name).is_some() {
            return Err(ArlgError::GroupExists(context));
        }

        let mut group = Group::new(name);
        group.deferred = true;

        let rg_key = RuleGroupKey::acl(name);
        let owner = key.to_string();
        if let Err(e) = self.rule_config.register_listener(&rg_key, &owner) {
            error!("Error: Failed to register group listener ({}) => {}", context, e);
            return Err(ArlgError::Registration { context, source: e });
        }

        let config = &self.config;
        let rule_config = self.rule_config.as_ref();
        let mut scope = self.coordinator.scope(&ruleset.binding);
        let mut failure = None;
        rule_config.walk(&rg_key, &mut |entry: &RuleEntry| {
            match group.rule_add(&mut scope, config, entry.index, &entry.rule) {
                Ok(()) => true,
                Err(e) => {
                    failure = Some(e);
                    false
                }
            }
        });

        if let Some(e) = failure {
            error!("Error: Failed to build ACL attached group {}: {}", context, e);
            destroy_group(&mut group, &mut scope, rule_config, &owner);
            return Err(e);
        }

        scope.defer();
        info!(
            "ArlgOrch: group {} attached with {} rules",
            context,
            group.rule_count()
        );
        self.stats.rules_added += u64::from(group.rule_count());
        ruleset.groups.push(group);
        self.stats.groups_created += 1;
        Ok(())
    }

    pub fn group_del(&mut self, ifname: &str, dir: Direction, name: &str) -> Result<()> {
        let key = RulesetKey::new(ifname, dir);
        let Some(ruleset) = self.rulesets.get_mut(&key) else {
            return Err(ArlgError::RulesetNotFound(key.to_string()));
        };
        let Some(pos) = ruleset.position(name) else {
            return Err(ArlgError::GroupNotFound(ruleset.binding.context(name)));
        };

        let mut group = ruleset.groups.remove(pos);
        let owner = key.to_string();
        let mut scope = self.coordinator.scope(&ruleset.binding);
        destroy_group(&mut group, &mut scope, self.rule_config.as_ref(), &owner);
        info!("ArlgOrch: group {} detached", ruleset.binding.context(name));
        self.stats.groups_deleted += 1;
        Ok(())
    }

    // ===== Interface state =====

    /// The attach point came up or went down. On the way up the interface
    /// is bound before groups attach; on the way down groups detach
    /// before it is unbound.
    pub fn attach_point_updn(&mut self, ifname: &str, up: bool) {
        let mut any = false;
        for dir in Direction::ALL {
            let Some(ruleset) = self.rulesets.get_mut(&RulesetKey::new(ifname, dir)) else {
                continue;
            };
            any = true;

            if up {
                match self.interfaces.lookup(ifname) {
                    Some(ifp) => ruleset.binding.ifp = Some(ifp),
                    None => {
                        warn!("ArlgOrch: attach point {} up without interface", ifname);
                        continue;
                    }
                }
            }

            let mut scope = self.coordinator.scope(&ruleset.binding);
            for group in ruleset.groups.iter_mut() {
                if up {
                    group.hw_attach(&mut scope);
                } else {
                    group.hw_detach(&mut scope);
                }
            }

            if !up {
                ruleset.binding.ifp = None;
            }
        }

        if any && !self.coordinator.is_commit_pending() {
            self.commit();
        }
    }

    /// The interface now exists at the hardware layer.
    pub fn interface_created(&mut self, ifname: &str) {
        let mut any = false;
        for dir in Direction::ALL {
            let Some(ruleset) = self.rulesets.get_mut(&RulesetKey::new(ifname, dir)) else {
                continue;
            };
            any = true;

            if ruleset.binding.if_created {
                continue;
            }
            ruleset.binding.if_created = true;
            debug!("ArlgOrch: ruleset {} interface created", ruleset.key());

            if ruleset.binding.ifp.is_none() {
                continue;
            }
            // No up transition happened, but the interface is usable.
            let mut scope = self.coordinator.scope(&ruleset.binding);
            for group in ruleset.groups.iter_mut() {
                group.hw_attach(&mut scope);
            }
        }

        if any && !self.coordinator.is_commit_pending() {
            self.commit();
        }
    }

    // ===== Configuration changes =====

    /// Applies a rule-group change to every attached copy of the group.
    /// Returns the number of copies that refused it.
    pub fn handle_rule_group(&mut self, event: &RuleGroupEvent) -> usize {
        if event.group.class != RuleClass::Acl {
            return 0;
        }

        let mut failed = 0;
        for ruleset in self.rulesets.values_mut() {
            let mut scope = self.coordinator.scope(&ruleset.binding);
            for group in ruleset
                .groups
                .iter_mut()
                .filter(|g| g.name() == event.group.name)
            {
                let result = match &event.change {
                    RuleChange::Add { index, rule } => {
                        group.rule_add(&mut scope, &self.config, *index, rule)
                    }
                    RuleChange::Change { index, rule } => {
                        group.rule_change(&mut scope, &self.config, *index, rule)
                    }
                    RuleChange::Delete { index } => group.rule_delete(&mut scope, *index),
                };
                match result {
                    Ok(()) => match (&event.change, event.change.index()) {
                        (_, ATTR_RULE_INDEX) => {}
                        (RuleChange::Add { .. }, _) => self.stats.rules_added += 1,
                        (RuleChange::Change { .. }, _) => self.stats.rules_changed += 1,
                        (RuleChange::Delete { .. }, _) => self.stats.rules_deleted += 1,
                    },
                    Err(e) => {
                        warn!("ArlgOrch: {} change refused: {}", event.group, e);
                        self.stats.failed_ops += 1;
                        failed += 1;
                    }
                }
            }
        }

        // This came from config, a commit will follow.
        self.coordinator.set_commit_pending();
        failed
    }
}

/// Removes a group from the hardware and releases everything it owns:
/// detach, deregister, rules, counters, then the group itself.
fn destroy_group(
    group: &mut Group,
    scope: &mut HwScope<'_>,
    rule_config: &dyn RuleGroupConfig,
    owner: &str,
) {
    let context = scope.binding.context(group.name());

    group.hw_detach(scope);

    if let Err(e) = rule_config.deregister_listener(&RuleGroupKey::acl(group.name()), owner) {
        error!("Error: Failed to deregister group listener ({}) => {}", context, e);
    }

    group.hw_rules_delete(scope.hw);
    group.hw_cntrs_delete(scope.hw);

    while let Some(index) = group.rules.last_key().copied() {
        if let Some(rule) = group.rules.remove(&index) {
            group.rule_count = group.rule_count.saturating_sub(1);
            if let (Some(id), Some(cntg)) = (rule.counter, group.cntg.as_mut()) {
                cntg.release(id, scope.hw);
            }
        }
    }

    if let Some(mut cntg) = group.cntg.take() {
        if cntg.cntr_type() == CounterType::Named {
            for id in cntg.ids() {
                cntg.release(id, scope.hw);
            }
        }
    }

    group.rule_count = 0;
    group.attr_rule = None;
    group.hw_delete(scope.hw);
    debug!("ArlgOrch: group {} destroyed", context);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arlg::ArlgConfig;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use vplane_fal::SoftFal;
    use vplane_npf_common::{InterfaceTable, RuleGroupStore};
    use vplane_types::IfIndex;

    fn orch_with(interfaces: Arc<InterfaceTable>) -> ArlgOrch {
        ArlgOrch::new(
            ArlgConfig::default(),
            Arc::new(SoftFal::new()),
            Arc::new(RuleGroupStore::new()),
            interfaces,
        )
    }

    #[test]
    fn test_ruleset_binding_follows_interface_table() {
        let interfaces = Arc::new(InterfaceTable::new());
        interfaces.add("dp0p1", IfIndex::new(3).unwrap());
        interfaces.set_created("dp0p1").unwrap();
        let mut orch = orch_with(interfaces);

        orch.ruleset_add("dp0p1", Direction::Out);
        orch.ruleset_add("dp0p2", Direction::In);
        // A second add is ignored.
        orch.ruleset_add("dp0p1", Direction::Out);
        assert_eq!(orch.ruleset_count(), 2);

        let bound = &orch.ruleset("dp0p1", Direction::Out).unwrap().binding;
        assert_eq!(bound.ifp.as_ref().map(|i| i.ifindex.as_u32()), Some(3));
        assert!(bound.if_created);

        let unbound = &orch.ruleset("dp0p2", Direction::In).unwrap().binding;
        assert!(unbound.ifp.is_none());
        assert!(!unbound.if_created);
    }

    #[test]
    fn test_group_add_needs_ruleset() {
        let mut orch = orch_with(Arc::new(InterfaceTable::new()));
        let err = orch.group_add("dp0p1", Direction::In, "web").unwrap_err();
        assert!(matches!(err, ArlgError::RulesetNotFound(_)));

        orch.ruleset_add("dp0p1", Direction::In);
        orch.group_add("dp0p1", Direction::In, "web").unwrap();
        let err = orch.group_add("dp0p1", Direction::In, "web").unwrap_err();
        assert!(matches!(err, ArlgError::GroupExists(_)));

        let err = orch.group_del("dp0p1", Direction::In, "db").unwrap_err();
        assert!(matches!(err, ArlgError::GroupNotFound(_)));
        orch.group_del("dp0p1", Direction::In, "web").unwrap();
        assert_eq!(orch.stats().groups_created, 1);
        assert_eq!(orch.stats().groups_deleted, 1);
    }

    #[test]
    fn test_new_group_is_deferred() {
        let mut orch = orch_with(Arc::new(InterfaceTable::new()));
        orch.ruleset_add("dp0p1", Direction::In);
        orch.group_add("dp0p1", Direction::In, "web").unwrap();

        assert!(orch.coordinator().has_deferrals());
        assert_eq!(orch.deferred_groups(), vec![" In/dp0p1|web".to_string()]);
    }
}
