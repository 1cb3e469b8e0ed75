//! Hardware notification plumbing.
//!
//! [`HwNotifier`] wraps the FAL. Each mutating call counts as one queued
//! notification; [`HwNotifier::flush`] commits them as one unit and does
//! nothing when the queue is empty. FAL failures are logged and reported
//! to the caller as `None`/`false`, they never abort the engine.

use std::sync::Arc;

use log::{debug, warn};
use vplane_fal::{
    CounterCreate, CounterValues, FalApi, FalCounterOid, FalGroupOid, FalRuleOid, GroupCreate,
    RuleCreate,
};
use vplane_types::{Direction, IfIndex};

use super::rlset::RulesetBinding;

pub struct HwNotifier {
    fal: Arc<dyn FalApi>,
    queued: usize,
    failures: u64,
}

impl std::fmt::Debug for HwNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HwNotifier")
            .field("queued", &self.queued)
            .field("failures", &self.failures)
            .finish()
    }
}

impl HwNotifier {
    pub fn new(fal: Arc<dyn FalApi>) -> Self {
        Self {
            fal,
            queued: 0,
            failures: 0,
        }
    }

    /// Notifications sent since the last flush.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// FAL calls that failed since startup.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    fn track<T>(&mut self, what: &str, result: vplane_fal::FalResult<T>) -> Option<T> {
        self.queued += 1;
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.failures += 1;
                warn!("FAL {} failed: {}", what, e);
                None
            }
        }
    }

    pub fn group_create(&mut self, req: &GroupCreate) -> Option<FalGroupOid> {
        let result = self.fal.group_create(req);
        self.track("group create", result)
    }

    pub fn group_modify(&mut self, group: FalGroupOid, summary: u32) -> bool {
        let result = self.fal.group_modify(group, summary);
        self.track("group modify", result).is_some()
    }

    pub fn group_delete(&mut self, group: FalGroupOid) -> bool {
        let result = self.fal.group_delete(group);
        self.track("group delete", result).is_some()
    }

    pub fn group_attach(&mut self, group: FalGroupOid, ifindex: IfIndex, dir: Direction) -> bool {
        let result = self.fal.group_attach(group, ifindex, dir);
        self.track("group attach", result).is_some()
    }

    pub fn group_detach(&mut self, group: FalGroupOid, ifindex: IfIndex, dir: Direction) -> bool {
        let result = self.fal.group_detach(group, ifindex, dir);
        self.track("group detach", result).is_some()
    }

    pub fn rule_create(&mut self, req: &RuleCreate) -> Option<FalRuleOid> {
        let result = self.fal.rule_create(req);
        self.track("rule create", result)
    }

    pub fn rule_delete(&mut self, rule: FalRuleOid) -> bool {
        let result = self.fal.rule_delete(rule);
        self.track("rule delete", result).is_some()
    }

    pub fn counter_create(&mut self, req: &CounterCreate) -> Option<FalCounterOid> {
        let result = self.fal.counter_create(req);
        self.track("counter create", result)
    }

    pub fn counter_delete(&mut self, counter: FalCounterOid) -> bool {
        let result = self.fal.counter_delete(counter);
        self.track("counter delete", result).is_some()
    }

    /// Reads a counter. Queries are not queued.
    pub fn counter_read(&self, counter: FalCounterOid) -> Option<CounterValues> {
        match self.fal.counter_read(counter) {
            Ok(values) => Some(values),
            Err(e) => {
                debug!("FAL counter read {} failed: {}", counter, e);
                None
            }
        }
    }

    /// Resets a counter immediately; op-mode requests are not batched.
    pub fn counter_clear(&self, counter: FalCounterOid) -> bool {
        match self.fal.counter_clear(counter) {
            Ok(()) => true,
            Err(e) => {
                warn!("FAL counter clear {} failed: {}", counter, e);
                false
            }
        }
    }

    /// Commits queued notifications. Returns true if a FAL commit was
    /// issued and succeeded.
    pub fn flush(&mut self) -> bool {
        if self.queued == 0 {
            return false;
        }
        debug!("flushing {} FAL notifications", self.queued);
        self.queued = 0;
        match self.fal.commit() {
            Ok(()) => true,
            Err(e) => {
                self.failures += 1;
                warn!("FAL commit failed: {}", e);
                false
            }
        }
    }
}

/// What a group operation may touch besides the group itself: the
/// binding of its ruleset, the notifier, and the coordinator's deferral
/// flag.
pub struct HwScope<'a> {
    pub binding: &'a RulesetBinding,
    pub hw: &'a mut HwNotifier,
    pub deferrals: &'a mut bool,
}

impl HwScope<'_> {
    /// Records that a group was deferred and must be retried at commit.
    pub fn defer(&mut self) {
        *self.deferrals = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vplane_fal::{FalOp, SoftFal};
    use vplane_types::AddressFamily;

    #[test]
    fn test_flush_only_when_queued() {
        let fal = SoftFal::new();
        let mut hw = HwNotifier::new(Arc::new(fal.clone()));
        assert!(!hw.flush());
        assert!(fal.calls().is_empty());

        hw.group_create(&GroupCreate {
            ifname: "dp0p1".to_string(),
            direction: Direction::In,
            name: "g".to_string(),
            family: AddressFamily::V4,
            summary: 0,
        });
        assert_eq!(hw.queued(), 1);
        assert!(hw.flush());
        assert_eq!(hw.queued(), 0);
        assert_eq!(fal.ops(), vec![FalOp::GroupCreate, FalOp::Commit]);
    }

    #[test]
    fn test_failures_are_counted() {
        let fal = SoftFal::new();
        fal.set_fail(FalOp::RuleDelete, true);
        let mut hw = HwNotifier::new(Arc::new(fal.clone()));
        let rule = FalRuleOid::from_raw(9).unwrap();
        assert!(!hw.rule_delete(rule));
        assert_eq!(hw.failures(), 1);
        assert_eq!(hw.queued(), 1);
    }
}
