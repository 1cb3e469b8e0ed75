//! Counter-group reconfiguration driven by the attribute rule.

use log::{debug, error};
use vplane_npf_common::{PmfRule, RuleSummary};

use super::orch::ArlgConfig;
use crate::gpc::{CounterGroup, CounterType, Group, HwNotifier, HwScope, CNTR_ACCEPT, CNTR_DROP};

/// Named counter a rule resolves to under a declared accept/drop set.
fn declared_name(rule: &PmfRule, accept: bool, drop: bool) -> Option<&'static str> {
    if rule.summary.contains(RuleSummary::PASS) {
        accept.then_some(CNTR_ACCEPT)
    } else if rule.summary.contains(RuleSummary::DROP) {
        drop.then_some(CNTR_DROP)
    } else {
        None
    }
}

impl Group {
    /// Creates the counter group requested by `attr`, if any.
    ///
    /// Named groups get their declared counters up front. Rules already
    /// present (the configuration walk may replay them before the
    /// attribute rule) are given their counters here.
    pub fn create_cntg(&mut self, attr: &PmfRule, config: &ArlgConfig, context: &str) {
        let Some(cntr_type) = CounterType::requested_by(attr) else {
            return;
        };
        let mut cntg = CounterGroup::new(
            cntr_type,
            config.max_counters_per_group,
            config.count_bytes,
        );

        if cntr_type == CounterType::Named {
            ensure_named(&mut cntg, attr, context);
        }

        for rule in self.rules.values_mut() {
            if !cntg.rule_needs_counter(&rule.rule) {
                continue;
            }
            match cntg.acquire_for_rule(&rule.rule, rule.index) {
                Ok(id) => rule.counter = id,
                Err(e) => error!("Error: {} for {}:{}", e, context, rule.index),
            }
        }

        debug!("{}: {:?} counter group created", context, cntr_type);
        self.cntg = Some(cntg);
    }

    /// Destroys the counter group, releasing every reference to it.
    pub fn delete_cntg(&mut self, hw: &mut HwNotifier) {
        let Some(mut cntg) = self.cntg.take() else {
            return;
        };
        for rule in self.rules.values_mut() {
            if let Some(id) = rule.counter.take() {
                cntg.release(id, hw);
            }
        }
        if cntg.cntr_type() == CounterType::Named {
            for id in cntg.ids() {
                cntg.release(id, hw);
            }
        }
        // Anything still held is removed from the hardware with the group.
        cntg.hw_delete_all(hw);
    }

    /// Adjusts the counter group to a changed attribute rule.
    ///
    /// Structural changes withdraw the group first; the caller republishes
    /// it by reconciling the new attribute rule afterwards.
    pub fn change_cntg(&mut self, attr: &PmfRule, config: &ArlgConfig, scope: &mut HwScope<'_>) {
        let context = scope.binding.context(&self.name);
        let wanted = CounterType::requested_by(attr);
        let current = self.cntg.as_ref().map(CounterGroup::cntr_type);

        match (current, wanted) {
            (None, None) => {}
            (None, Some(_)) => {
                self.reconcile_attr(scope, None);
                self.create_cntg(attr, config, &context);
            }
            (Some(_), None) => {
                self.reconcile_attr(scope, None);
                self.delete_cntg(scope.hw);
            }
            (Some(old), Some(new)) if old != new => {
                self.reconcile_attr(scope, None);
                self.delete_cntg(scope.hw);
                self.create_cntg(attr, config, &context);
            }
            // Per-rule counters are independent of the declaration.
            (Some(CounterType::Numbered), Some(_)) => {}
            (Some(CounterType::Named), Some(_)) => self.change_named(attr, scope, &context),
        }
    }

    fn change_named(&mut self, attr: &PmfRule, scope: &mut HwScope<'_>, context: &str) {
        let need_accept = attr.defines_accept_counter();
        let need_drop = attr.defines_drop_counter();
        let (got_accept, got_drop) = match self.cntg.as_ref() {
            Some(cntg) => (cntg.find(CNTR_ACCEPT), cntg.find(CNTR_DROP)),
            None => return,
        };

        if got_accept.is_some() == need_accept && got_drop.is_some() == need_drop {
            return;
        }

        // Withdraw every rule, then rebuild the named set.
        self.reconcile_attr(scope, None);

        let Some(cntg) = self.cntg.as_mut() else {
            return;
        };
        ensure_named(cntg, attr, context);

        // Drop the declaration's reference on counters no longer wanted;
        // they are freed once no rule uses them.
        if let (Some(id), false) = (got_accept, need_accept) {
            cntg.release(id, scope.hw);
        }
        if let (Some(id), false) = (got_drop, need_drop) {
            cntg.release(id, scope.hw);
        }

        for rule in self.rules.values_mut() {
            let old = rule.counter;
            let new = if cntg.rule_needs_counter(&rule.rule) {
                declared_name(&rule.rule, need_accept, need_drop)
                    .and_then(|name| cntg.find_and_retain(name))
            } else {
                None
            };
            rule.counter = new;
            if let Some(id) = old {
                cntg.release(id, scope.hw);
            }
        }
    }
}

/// Creates the declared named counters that do not exist yet.
fn ensure_named(cntg: &mut CounterGroup, attr: &PmfRule, context: &str) {
    let wanted = [
        (CNTR_ACCEPT, attr.defines_accept_counter()),
        (CNTR_DROP, attr.defines_drop_counter()),
    ];
    for (name, needed) in wanted {
        if !needed || cntg.find(name).is_some() {
            continue;
        }
        // The declaration holds the first reference.
        if let Err(e) = cntg.get_or_alloc(name) {
            error!("Error: {} for ACL attached group cntr={} {}", e, name, context);
        }
    }
}
