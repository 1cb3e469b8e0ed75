//! In-memory FAL used by the simulation daemon and by tests.
//!
//! `SoftFal` hands out object handles, keeps the objects it was asked to
//! create, and journals every mutating call in order. Individual
//! operations can be forced to fail to exercise the engine's error paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use vplane_types::{AddressFamily, Direction, IfIndex};

use crate::api::{CounterCreate, CounterValues, FalApi, GroupCreate, RuleCreate};
use crate::error::{FalError, FalResult, FalStatus};
use crate::types::{FalCounterOid, FalGroupOid, FalRuleOid, RawFalObjectId};

/// FAL operation kinds, used for failure injection and journal queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FalOp {
    GroupCreate,
    GroupModify,
    GroupDelete,
    GroupAttach,
    GroupDetach,
    RuleCreate,
    RuleDelete,
    CounterCreate,
    CounterDelete,
    CounterRead,
    CounterClear,
    Commit,
}

/// One journaled FAL call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FalCall {
    GroupCreate {
        name: String,
        family: AddressFamily,
        summary: u32,
    },
    GroupModify {
        group: FalGroupOid,
        summary: u32,
    },
    GroupDelete {
        group: FalGroupOid,
    },
    GroupAttach {
        group: FalGroupOid,
        ifindex: IfIndex,
        direction: Direction,
    },
    GroupDetach {
        group: FalGroupOid,
        ifindex: IfIndex,
        direction: Direction,
    },
    RuleCreate {
        group: FalGroupOid,
        index: u32,
        counter: Option<FalCounterOid>,
    },
    RuleDelete {
        rule: FalRuleOid,
    },
    CounterCreate {
        name: String,
    },
    CounterDelete {
        counter: FalCounterOid,
    },
    CounterClear {
        counter: FalCounterOid,
    },
    Commit,
}

impl FalCall {
    pub fn op(&self) -> FalOp {
        match self {
            FalCall::GroupCreate { .. } => FalOp::GroupCreate,
            FalCall::GroupModify { .. } => FalOp::GroupModify,
            FalCall::GroupDelete { .. } => FalOp::GroupDelete,
            FalCall::GroupAttach { .. } => FalOp::GroupAttach,
            FalCall::GroupDetach { .. } => FalOp::GroupDetach,
            FalCall::RuleCreate { .. } => FalOp::RuleCreate,
            FalCall::RuleDelete { .. } => FalOp::RuleDelete,
            FalCall::CounterCreate { .. } => FalOp::CounterCreate,
            FalCall::CounterDelete { .. } => FalOp::CounterDelete,
            FalCall::CounterClear { .. } => FalOp::CounterClear,
            FalCall::Commit => FalOp::Commit,
        }
    }
}

#[derive(Debug, Default)]
struct SoftFalState {
    next_oid: RawFalObjectId,
    groups: BTreeMap<RawFalObjectId, GroupCreate>,
    attached: HashSet<RawFalObjectId>,
    rules: BTreeMap<RawFalObjectId, RuleCreate>,
    counters: BTreeMap<RawFalObjectId, (CounterCreate, CounterValues)>,
    journal: Vec<FalCall>,
    failing: HashSet<FalOp>,
    commits: u64,
}

impl SoftFalState {
    fn alloc_oid(&mut self) -> RawFalObjectId {
        self.next_oid += 1;
        self.next_oid
    }

    /// Journals the call, then reports an injected failure if any.
    fn record(&mut self, call: FalCall) -> FalResult<()> {
        let op = call.op();
        self.journal.push(call);
        if self.failing.contains(&op) {
            debug!("SoftFal: injected failure for {:?}", op);
            return Err(FalError::from_status(FalStatus::Failure));
        }
        Ok(())
    }
}

/// In-memory journaling FAL.
///
/// Clones share the same state, so a test can keep one handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct SoftFal {
    state: Arc<Mutex<SoftFalState>>,
}

impl SoftFal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SoftFalState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every subsequent call of `op` fail until cleared.
    pub fn set_fail(&self, op: FalOp, fail: bool) {
        let mut state = self.lock();
        if fail {
            state.failing.insert(op);
        } else {
            state.failing.remove(&op);
        }
    }

    /// Sets the values a counter reads back.
    pub fn set_counter_values(&self, counter: FalCounterOid, values: CounterValues) -> bool {
        match self.lock().counters.get_mut(&counter.as_raw()) {
            Some(entry) => {
                entry.1 = values;
                true
            }
            None => false,
        }
    }

    /// Returns a copy of the journal.
    pub fn calls(&self) -> Vec<FalCall> {
        self.lock().journal.clone()
    }

    /// Drains the journal.
    pub fn take_calls(&self) -> Vec<FalCall> {
        std::mem::take(&mut self.lock().journal)
    }

    /// Returns the journaled operation kinds, in order.
    pub fn ops(&self) -> Vec<FalOp> {
        self.lock().journal.iter().map(FalCall::op).collect()
    }

    pub fn commit_count(&self) -> u64 {
        self.lock().commits
    }

    pub fn group_count(&self) -> usize {
        self.lock().groups.len()
    }

    pub fn rule_count(&self) -> usize {
        self.lock().rules.len()
    }

    pub fn counter_count(&self) -> usize {
        self.lock().counters.len()
    }

    pub fn is_attached(&self, group: FalGroupOid) -> bool {
        self.lock().attached.contains(&group.as_raw())
    }

    /// Looks up a live counter by name.
    pub fn find_counter(&self, name: &str) -> Option<FalCounterOid> {
        self.lock()
            .counters
            .iter()
            .find(|(_, (req, _))| req.name == name)
            .and_then(|(oid, _)| FalCounterOid::from_raw(*oid))
    }
}

impl FalApi for SoftFal {
    fn group_create(&self, req: &GroupCreate) -> FalResult<FalGroupOid> {
        let mut state = self.lock();
        state.record(FalCall::GroupCreate {
            name: req.name.clone(),
            family: req.family,
            summary: req.summary,
        })?;
        let oid = state.alloc_oid();
        state.groups.insert(oid, req.clone());
        debug!("SoftFal: group {} created as {:x}", req.context(), oid);
        FalGroupOid::from_raw(oid).ok_or_else(|| FalError::internal("null group handle"))
    }

    fn group_modify(&self, group: FalGroupOid, summary: u32) -> FalResult<()> {
        let mut state = self.lock();
        state.record(FalCall::GroupModify { group, summary })?;
        match state.groups.get_mut(&group.as_raw()) {
            Some(req) => {
                req.summary = summary;
                Ok(())
            }
            None => Err(FalError::not_found(format!("group {}", group))),
        }
    }

    fn group_delete(&self, group: FalGroupOid) -> FalResult<()> {
        let mut state = self.lock();
        state.record(FalCall::GroupDelete { group })?;
        if state.attached.contains(&group.as_raw()) {
            return Err(FalError::from_status(FalStatus::ObjectInUse));
        }
        state
            .groups
            .remove(&group.as_raw())
            .map(|_| ())
            .ok_or_else(|| FalError::not_found(format!("group {}", group)))
    }

    fn group_attach(
        &self,
        group: FalGroupOid,
        ifindex: IfIndex,
        direction: Direction,
    ) -> FalResult<()> {
        let mut state = self.lock();
        state.record(FalCall::GroupAttach {
            group,
            ifindex,
            direction,
        })?;
        if !state.groups.contains_key(&group.as_raw()) {
            return Err(FalError::not_found(format!("group {}", group)));
        }
        state.attached.insert(group.as_raw());
        Ok(())
    }

    fn group_detach(
        &self,
        group: FalGroupOid,
        ifindex: IfIndex,
        direction: Direction,
    ) -> FalResult<()> {
        let mut state = self.lock();
        state.record(FalCall::GroupDetach {
            group,
            ifindex,
            direction,
        })?;
        if state.attached.remove(&group.as_raw()) {
            Ok(())
        } else {
            Err(FalError::not_found(format!("attached group {}", group)))
        }
    }

    fn rule_create(&self, req: &RuleCreate) -> FalResult<FalRuleOid> {
        let mut state = self.lock();
        state.record(FalCall::RuleCreate {
            group: req.group,
            index: req.index,
            counter: req.counter,
        })?;
        if !state.groups.contains_key(&req.group.as_raw()) {
            return Err(FalError::not_found(format!("group {}", req.group)));
        }
        let oid = state.alloc_oid();
        state.rules.insert(oid, req.clone());
        FalRuleOid::from_raw(oid).ok_or_else(|| FalError::internal("null rule handle"))
    }

    fn rule_delete(&self, rule: FalRuleOid) -> FalResult<()> {
        let mut state = self.lock();
        state.record(FalCall::RuleDelete { rule })?;
        state
            .rules
            .remove(&rule.as_raw())
            .map(|_| ())
            .ok_or_else(|| FalError::not_found(format!("rule {}", rule)))
    }

    fn counter_create(&self, req: &CounterCreate) -> FalResult<FalCounterOid> {
        let mut state = self.lock();
        state.record(FalCall::CounterCreate {
            name: req.name.clone(),
        })?;
        let oid = state.alloc_oid();
        state
            .counters
            .insert(oid, (req.clone(), CounterValues::default()));
        FalCounterOid::from_raw(oid).ok_or_else(|| FalError::internal("null counter handle"))
    }

    fn counter_delete(&self, counter: FalCounterOid) -> FalResult<()> {
        let mut state = self.lock();
        state.record(FalCall::CounterDelete { counter })?;
        state
            .counters
            .remove(&counter.as_raw())
            .map(|_| ())
            .ok_or_else(|| FalError::not_found(format!("counter {}", counter)))
    }

    fn counter_read(&self, counter: FalCounterOid) -> FalResult<CounterValues> {
        let state = self.lock();
        if state.failing.contains(&FalOp::CounterRead) {
            return Err(FalError::from_status(FalStatus::Failure));
        }
        state
            .counters
            .get(&counter.as_raw())
            .map(|(_, values)| *values)
            .ok_or_else(|| FalError::not_found(format!("counter {}", counter)))
    }

    fn counter_clear(&self, counter: FalCounterOid) -> FalResult<()> {
        let mut state = self.lock();
        state.record(FalCall::CounterClear { counter })?;
        match state.counters.get_mut(&counter.as_raw()) {
            Some(entry) => {
                entry.1 = CounterValues::default();
                Ok(())
            }
            None => Err(FalError::not_found(format!("counter {}", counter))),
        }
    }

    fn commit(&self) -> FalResult<()> {
        let mut state = self.lock();
        state.record(FalCall::Commit)?;
        state.commits += 1;
        Ok(())
    }
}
