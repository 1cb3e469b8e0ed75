//! Rule reconciler: add, change and delete of rules within a group.
//!
//! The same three operations serve the initial configuration walk and
//! live change events. Every check happens before the first destructive
//! step, so a refused operation leaves the group untouched.

use log::error;
use vplane_npf_common::{PmfRule, ATTR_RULE_INDEX};

use super::orch::{ArlgConfig, ArlgError, Result};
use crate::gpc::{CounterType, Group, GroupRule, HwScope};

impl Group {
    /// Adds a rule, or the attribute rule at `ATTR_RULE_INDEX`.
    pub fn rule_add(
        &mut self,
        scope: &mut HwScope<'_>,
        config: &ArlgConfig,
        index: u32,
        rule: &PmfRule,
    ) -> Result<()> {
        let context = scope.binding.rule_context(&self.name, index);

        if index == ATTR_RULE_INDEX {
            if self.attr_rule.is_some() {
                error!("Error: Dup attribute rule for ACL attached group {}", context);
                return Err(ArlgError::DuplicateAttrRule { context });
            }
            self.attr_rule = Some(rule.clone());
            self.create_cntg(rule, config, &context);
            self.reconcile_attr(scope, Some(rule));
            return Ok(());
        }

        if self.rules.contains_key(&index) {
            error!("Error: Dup rule for ACL attached group {}", context);
            return Err(ArlgError::DuplicateRule { context });
        }
        if self.rule_count >= config.max_rules_per_group {
            error!("Error: No room for ACL attached group rule {}", context);
            return Err(ArlgError::ResourceExhausted {
                context,
                what: "rules",
            });
        }

        self.rule_count += 1;

        let counter = match self.cntg.as_mut() {
            Some(cntg) if cntg.rule_needs_counter(rule) => {
                match cntg.acquire_for_rule(rule, index) {
                    Ok(counter) => counter,
                    Err(e) => {
                        error!("Error: {} for ACL attached group rule {}", e, context);
                        self.rule_count -= 1;
                        return Err(ArlgError::from_counter(context, e));
                    }
                }
            }
            _ => None,
        };

        self.rules
            .insert(index, GroupRule::new(index, rule.clone(), counter));
        if let Some(id) = counter {
            self.cntr_hw_create(id, scope.hw);
        }
        self.rule_hw_create(index, scope.hw);

        if self.published && self.compute_summary() != self.summary {
            self.hw_modify(scope.hw);
        }
        Ok(())
    }

    /// Replaces the rule at `index`, moving its counter if the action changed.
    pub fn rule_change(
        &mut self,
        scope: &mut HwScope<'_>,
        config: &ArlgConfig,
        index: u32,
        rule: &PmfRule,
    ) -> Result<()> {
        let context = scope.binding.rule_context(&self.name, index);

        if index == ATTR_RULE_INDEX {
            if self.attr_rule.is_none() {
                error!("Error: No rule to change for ACL attached group {}", context);
                return Err(ArlgError::RuleNotFound { context, index });
            }
            self.change_cntg(rule, config, scope);
            self.attr_rule = Some(rule.clone());
            self.reconcile_attr(scope, Some(rule));
            if self.published && self.compute_summary() != self.summary {
                self.hw_modify(scope.hw);
            }
            return Ok(());
        }

        let Some(existing) = self.rules.get(&index) else {
            error!("Error: No rule to change for ACL attached group {}", context);
            return Err(ArlgError::RuleNotFound { context, index });
        };
        let old_counter = existing.counter;

        // Resolve the counter first; the old one is released only after
        // the rule referencing it left the hardware.
        let mut new_counter = old_counter;
        let mut release = None;
        if let Some(cntg) = self.cntg.as_mut() {
            if !cntg.rule_needs_counter(rule) {
                release = old_counter;
                new_counter = None;
            } else if old_counter.is_none() {
                new_counter = cntg
                    .acquire_for_rule(rule, index)
                    .map_err(|e| ArlgError::from_counter(context.clone(), e))?;
            } else if cntg.cntr_type() == CounterType::Named {
                let resolved = cntg
                    .acquire_for_rule(rule, index)
                    .map_err(|e| ArlgError::from_counter(context.clone(), e))?;
                if resolved == old_counter {
                    if let Some(id) = resolved {
                        cntg.release(id, scope.hw);
                    }
                } else {
                    new_counter = resolved;
                    release = old_counter;
                }
            }
        }

        let had_published = self.has_published_rules();

        if let Some(id) = new_counter.filter(|id| Some(*id) != old_counter) {
            self.cntr_hw_create(id, scope.hw);
        }

        // A hardware rule embeds its counter, so a change is a delete plus
        // a create.
        self.rule_hw_delete(index, scope.hw);
        if let Some(entry) = self.rules.get_mut(&index) {
            entry.rule = rule.clone();
            entry.counter = new_counter;
        }
        self.rule_hw_create(index, scope.hw);

        if had_published {
            self.hw_modify(scope.hw);
        }

        if let Some(id) = release {
            if let Some(cntg) = self.cntg.as_mut() {
                cntg.release(id, scope.hw);
            }
        }
        Ok(())
    }

    /// Deletes the rule at `index`, releasing its counter.
    pub fn rule_delete(&mut self, scope: &mut HwScope<'_>, index: u32) -> Result<()> {
        let context = scope.binding.rule_context(&self.name, index);

        if index == ATTR_RULE_INDEX {
            if self.attr_rule.is_none() {
                error!("Error: No rule to delete for ACL attached group {}", context);
                return Err(ArlgError::RuleNotFound { context, index });
            }
            self.reconcile_attr(scope, None);
            self.attr_rule = None;
            self.delete_cntg(scope.hw);
            return Ok(());
        }

        if !self.rules.contains_key(&index) {
            error!("Error: No rule to delete for ACL attached group {}", context);
            return Err(ArlgError::RuleNotFound { context, index });
        }

        let had_published = self.has_published_rules();

        self.rule_count = self.rule_count.saturating_sub(1);
        self.rule_hw_delete(index, scope.hw);

        if let Some(removed) = self.rules.remove(&index) {
            if let (Some(id), Some(cntg)) = (removed.counter, self.cntg.as_mut()) {
                cntg.release(id, scope.hw);
            }
        }

        if had_published {
            self.hw_modify(scope.hw);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpc::{HwNotifier, RulesetBinding, CNTR_ACCEPT, CNTR_DROP};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use vplane_fal::{FalCall, FalOp, SoftFal};
    use vplane_npf_common::{InterfaceRef, RuleSummary};
    use vplane_types::{AddressFamily, Direction, IfIndex};

    struct Fixture {
        fal: SoftFal,
        hw: HwNotifier,
        binding: RulesetBinding,
        deferrals: bool,
        config: ArlgConfig,
        group: Group,
    }

    impl Fixture {
        fn new() -> Self {
            let fal = SoftFal::new();
            let hw = HwNotifier::new(Arc::new(fal.clone()));
            let mut binding = RulesetBinding::new("dp0p1", Direction::In);
            binding.if_created = true;
            binding.ifp = Some(InterfaceRef {
                name: "dp0p1".to_string(),
                ifindex: IfIndex::new(3).unwrap(),
            });
            Self {
                fal,
                hw,
                binding,
                deferrals: false,
                config: ArlgConfig::default(),
                group: Group::new("web"),
            }
        }

        fn scope(&mut self) -> (HwScope<'_>, &mut Group, &ArlgConfig) {
            (
                HwScope {
                    binding: &self.binding,
                    hw: &mut self.hw,
                    deferrals: &mut self.deferrals,
                },
                &mut self.group,
                &self.config,
            )
        }

        fn add(&mut self, index: u32, rule: PmfRule) -> Result<()> {
            let (mut scope, group, config) = self.scope();
            group.rule_add(&mut scope, config, index, &rule)
        }

        fn change(&mut self, index: u32, rule: PmfRule) -> Result<()> {
            let (mut scope, group, config) = self.scope();
            group.rule_change(&mut scope, config, index, &rule)
        }

        fn delete(&mut self, index: u32) -> Result<()> {
            let (mut scope, group, _) = self.scope();
            group.rule_delete(&mut scope, index)
        }
    }

    fn v4_attr() -> PmfRule {
        PmfRule::attr(Some(AddressFamily::V4))
    }

    #[test]
    fn test_rule_count_tracks_adds_and_deletes() {
        let mut fx = Fixture::new();
        fx.add(ATTR_RULE_INDEX, v4_attr()).unwrap();
        assert_eq!(fx.group.rule_count(), 0);

        for index in [10, 20, 30] {
            fx.add(index, PmfRule::pass()).unwrap();
        }
        assert_eq!(fx.group.rule_count(), 3);

        fx.delete(20).unwrap();
        assert_eq!(fx.group.rule_count(), 2);

        // Refused operations leave the count alone.
        assert!(matches!(
            fx.add(10, PmfRule::block()),
            Err(ArlgError::DuplicateRule { .. })
        ));
        assert!(matches!(
            fx.delete(20),
            Err(ArlgError::RuleNotFound { index: 20, .. })
        ));
        assert!(matches!(
            fx.change(99, PmfRule::pass()),
            Err(ArlgError::RuleNotFound { index: 99, .. })
        ));
        assert_eq!(fx.group.rule_count(), 2);

        // Attribute rule add/delete never counts.
        fx.delete(ATTR_RULE_INDEX).unwrap();
        assert_eq!(fx.group.rule_count(), 2);
    }

    #[test]
    fn test_duplicate_attribute_rule() {
        let mut fx = Fixture::new();
        fx.add(ATTR_RULE_INDEX, v4_attr()).unwrap();
        let err = fx.add(ATTR_RULE_INDEX, v4_attr()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "duplicate attribute rule for  In/dp0p1|web:4294967295"
        );
        assert!(fx.group.is_published());
    }

    #[test]
    fn test_rule_limit() {
        let mut fx = Fixture::new();
        fx.config.max_rules_per_group = 1;
        fx.add(1, PmfRule::pass()).unwrap();
        assert!(matches!(
            fx.add(2, PmfRule::pass()),
            Err(ArlgError::ResourceExhausted { what: "rules", .. })
        ));
        assert_eq!(fx.group.rule_count(), 1);
        assert!(fx.group.rule(2).is_none());
    }

    #[test]
    fn test_counter_limit_undoes_rule_count() {
        let mut fx = Fixture::new();
        fx.config.max_counters_per_group = 1;
        fx.add(ATTR_RULE_INDEX, v4_attr().count_numbered()).unwrap();
        fx.add(1, PmfRule::pass()).unwrap();
        assert!(matches!(
            fx.add(2, PmfRule::pass()),
            Err(ArlgError::ResourceExhausted {
                what: "counters",
                ..
            })
        ));
        assert_eq!(fx.group.rule_count(), 1);
    }

    #[test]
    fn test_add_to_published_group_creates_rule() {
        let mut fx = Fixture::new();
        fx.add(ATTR_RULE_INDEX, v4_attr().count_numbered()).unwrap();
        fx.fal.take_calls();

        fx.add(10, PmfRule::pass()).unwrap();
        let rule = fx.group.rule(10).unwrap();
        assert!(rule.is_published());
        assert!(rule.is_ll_created());
        assert_eq!(fx.group.rule_counter_name(10), Some("10"));
        assert!(fx.group.summary().contains(RuleSummary::PASS));
        assert_eq!(
            fx.fal.ops(),
            vec![FalOp::CounterCreate, FalOp::RuleCreate, FalOp::GroupModify]
        );
    }

    #[test]
    fn test_named_counters_shared_and_split() {
        let mut fx = Fixture::new();
        fx.add(ATTR_RULE_INDEX, v4_attr().count_named(true, true))
            .unwrap();
        fx.add(1, PmfRule::pass().counted()).unwrap();
        fx.add(2, PmfRule::pass().counted()).unwrap();

        let cntg = fx.group.cntg().unwrap();
        let accept = cntg.find(CNTR_ACCEPT).unwrap();
        let drop = cntg.find(CNTR_DROP).unwrap();
        assert_eq!(fx.group.rule(1).unwrap().counter(), Some(accept));
        assert_eq!(fx.group.rule(2).unwrap().counter(), Some(accept));
        assert_eq!(cntg.ref_count(accept), Some(3));

        fx.change(2, PmfRule::block().counted()).unwrap();
        let cntg = fx.group.cntg().unwrap();
        assert_eq!(fx.group.rule(1).unwrap().counter(), Some(accept));
        assert_eq!(fx.group.rule(2).unwrap().counter(), Some(drop));
        assert_eq!(cntg.ref_count(accept), Some(2));
        assert_eq!(cntg.ref_count(drop), Some(2));
    }

    #[test]
    fn test_change_recreates_rule_before_releasing_counter() {
        let mut fx = Fixture::new();
        fx.add(ATTR_RULE_INDEX, v4_attr().count_numbered()).unwrap();
        fx.add(7, PmfRule::pass()).unwrap();
        let id = fx.group.rule(7).unwrap().counter().unwrap();
        let counter_oid = fx.group.cntg().unwrap().objid(id);
        assert!(counter_oid.is_some());
        fx.fal.take_calls();

        // A numbered group keeps the rule's counter across a change.
        fx.change(7, PmfRule::block()).unwrap();
        let calls = fx.fal.calls();
        assert_eq!(
            calls.iter().map(FalCall::op).collect::<Vec<_>>(),
            vec![FalOp::RuleDelete, FalOp::RuleCreate, FalOp::GroupModify]
        );
        assert_eq!(
            calls[1],
            FalCall::RuleCreate {
                group: fx.group.objid().unwrap(),
                index: 7,
                counter: counter_oid,
            }
        );
        assert_eq!(fx.group.rule(7).unwrap().counter(), Some(id));
    }

    #[test]
    fn test_change_to_uncounted_releases_counter() {
        let mut fx = Fixture::new();
        fx.add(ATTR_RULE_INDEX, v4_attr().count_named(true, false))
            .unwrap();
        fx.add(1, PmfRule::pass().counted()).unwrap();
        let accept = fx.group.cntg().unwrap().find(CNTR_ACCEPT).unwrap();
        fx.fal.take_calls();

        fx.change(1, PmfRule::pass()).unwrap();
        assert_eq!(fx.group.rule(1).unwrap().counter(), None);
        assert_eq!(fx.group.cntg().unwrap().ref_count(accept), Some(1));
        // The declared counter survives, so nothing is deleted.
        assert!(!fx.fal.ops().contains(&FalOp::CounterDelete));
    }

    #[test]
    fn test_delete_attr_rule_unpublishes_and_drops_counters() {
        let mut fx = Fixture::new();
        fx.add(ATTR_RULE_INDEX, v4_attr().count_numbered()).unwrap();
        fx.add(1, PmfRule::pass()).unwrap();
        fx.add(2, PmfRule::block()).unwrap();
        assert_eq!(fx.fal.counter_count(), 2);
        fx.fal.take_calls();

        fx.delete(ATTR_RULE_INDEX).unwrap();
        assert!(!fx.group.is_published());
        assert!(fx.group.is_deferred());
        assert!(fx.deferrals);
        assert!(fx.group.cntg().is_none());
        assert!(fx.group.attr_rule().is_none());
        assert!(fx.group.rules().all(|r| !r.is_published() && r.counter().is_none()));
        assert_eq!(fx.fal.group_count(), 0);
        assert_eq!(fx.fal.rule_count(), 0);
        assert_eq!(fx.fal.counter_count(), 0);
        assert_eq!(
            fx.fal.ops(),
            vec![
                FalOp::GroupDetach,
                FalOp::RuleDelete,
                FalOp::RuleDelete,
                FalOp::CounterDelete,
                FalOp::CounterDelete,
                FalOp::GroupDelete,
            ]
        );
    }

    #[test]
    fn test_delete_published_rule_frees_numbered_counter() {
        let mut fx = Fixture::new();
        fx.add(ATTR_RULE_INDEX, v4_attr().count_numbered()).unwrap();
        fx.add(4, PmfRule::pass()).unwrap();
        fx.fal.take_calls();

        fx.delete(4).unwrap();
        assert!(fx.group.cntg().unwrap().is_empty());
        assert_eq!(
            fx.fal.ops(),
            vec![FalOp::RuleDelete, FalOp::CounterDelete, FalOp::GroupModify]
        );
    }
}
