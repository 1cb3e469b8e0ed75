//! Counter registry.
//!
//! A [`CounterGroup`] owns the counters of one group, keyed by a stable
//! [`CounterId`]. Rules hold counter ids, never the counters themselves,
//! and every holder accounts for one reference. A counter is freed (and
//! deleted from the hardware if it was created there) when its last
//! reference is released.

use std::fmt;

use log::{debug, error, warn};
use thiserror::Error;
use vplane_fal::{CounterCreate, CounterValues, FalCounterOid, FalGroupOid};
use vplane_npf_common::{HasRefCount, PmfRule, SyncMap};

use super::hw::HwNotifier;

/// Name of the shared counter for accepting rules.
pub const CNTR_ACCEPT: &str = "accept";
/// Name of the shared counter for dropping rules.
pub const CNTR_DROP: &str = "drop";

/// Stable handle of a counter within its counter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterId(u32);

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How counters are assigned to rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterType {
    /// One counter per rule, named after the rule index.
    Numbered,
    /// Counters shared per action ("accept", "drop").
    Named,
}

impl CounterType {
    /// The counter type an attribute rule asks for, if any.
    pub fn requested_by(attr: &PmfRule) -> Option<Self> {
        if !attr.defines_counters() {
            None
        } else if attr.defines_named_counters() {
            Some(CounterType::Named)
        } else {
            Some(CounterType::Numbered)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    #[error("counter {0} already exists")]
    Duplicate(String),

    #[error("no room for counter {0}")]
    Exhausted(String),
}

/// One counter.
#[derive(Debug, Clone)]
pub struct Counter {
    name: String,
    refcount: u32,
    named: bool,
    published: bool,
    ll_created: bool,
    count_packets: bool,
    count_bytes: bool,
    objid: Option<FalCounterOid>,
}

impl Counter {
    fn new(name: &str, named: bool) -> Self {
        Self {
            name: name.to_string(),
            refcount: 0,
            named,
            published: false,
            ll_created: false,
            count_packets: false,
            count_bytes: false,
            objid: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_named(&self) -> bool {
        self.named
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn is_ll_created(&self) -> bool {
        self.ll_created
    }

    pub fn counts_packets(&self) -> bool {
        self.count_packets
    }

    pub fn counts_bytes(&self) -> bool {
        self.count_bytes
    }

    pub fn objid(&self) -> Option<FalCounterOid> {
        self.objid
    }
}

impl HasRefCount for Counter {
    fn increment_ref(&mut self) -> u32 {
        self.refcount = self.refcount.saturating_add(1);
        self.refcount
    }

    fn decrement_ref(&mut self) -> Option<u32> {
        self.refcount = self.refcount.checked_sub(1)?;
        Some(self.refcount)
    }

    fn ref_count(&self) -> u32 {
        self.refcount
    }
}

/// The counters of one group.
#[derive(Debug)]
pub struct CounterGroup {
    cntr_type: CounterType,
    counters: SyncMap<CounterId, Counter>,
    next_id: u32,
    max_counters: usize,
    count_bytes: bool,
}

impl CounterGroup {
    pub fn new(cntr_type: CounterType, max_counters: usize, count_bytes: bool) -> Self {
        Self {
            cntr_type,
            counters: SyncMap::new(),
            next_id: 0,
            max_counters,
            count_bytes,
        }
    }

    pub fn cntr_type(&self) -> CounterType {
        self.cntr_type
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn get(&self, id: CounterId) -> Option<&Counter> {
        self.counters.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CounterId, &Counter)> {
        self.counters.iter().map(|(id, c)| (*id, c))
    }

    pub fn ids(&self) -> Vec<CounterId> {
        self.counters.keys().copied().collect()
    }

    pub fn ref_count(&self, id: CounterId) -> Option<u32> {
        self.counters.ref_count(&id)
    }

    /// Hardware handle of a counter, if it was created there.
    pub fn objid(&self, id: CounterId) -> Option<FalCounterOid> {
        self.counters.get(&id).and_then(Counter::objid)
    }

    /// Looks a counter up by name.
    pub fn find(&self, name: &str) -> Option<CounterId> {
        self.counters.find(|c| c.name == name).map(|(id, _)| *id)
    }

    fn alloc(&mut self, name: &str, named: bool) -> Result<CounterId, CounterError> {
        if self.counters.len() >= self.max_counters {
            error!("Error: no room for counter {}", name);
            return Err(CounterError::Exhausted(name.to_string()));
        }
        let id = CounterId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.counters.insert(id, Counter::new(name, named));
        Ok(id)
    }

    /// Finds a counter by name, creating it if absent, and takes a
    /// reference on it in both cases.
    pub fn get_or_alloc(&mut self, name: &str) -> Result<CounterId, CounterError> {
        let named = self.cntr_type == CounterType::Named;
        let id = match self.find(name) {
            Some(id) => id,
            None => self.alloc(name, named)?,
        };
        self.retain(id);
        Ok(id)
    }

    /// Finds a counter by name and takes a reference on it.
    pub fn find_and_retain(&mut self, name: &str) -> Option<CounterId> {
        let id = self.find(name)?;
        self.retain(id);
        Some(id)
    }

    /// Takes an additional reference on a counter.
    pub fn retain(&mut self, id: CounterId) {
        if let Err(e) = self.counters.increment_ref(&id) {
            error!("Error: cannot retain counter {}: {}", id, e);
        }
    }

    /// Creates the counter of a rule in a numbered group.
    ///
    /// The counter is named after the rule index and starts with one
    /// reference, held by the rule.
    pub fn alloc_numbered(&mut self, index: u32) -> Result<CounterId, CounterError> {
        let name = index.to_string();
        if self.find(&name).is_some() {
            error!(
                "Error: Attempt to alloc numbered counter that already exists ({})",
                index
            );
            return Err(CounterError::Duplicate(name));
        }
        let id = self.alloc(&name, false)?;
        self.retain(id);
        Ok(id)
    }

    /// Drops one reference.
    ///
    /// Returns true while the counter is still referenced. On the last
    /// release the counter is deleted from the hardware (if it was created
    /// there) and freed, and false is returned.
    pub fn release(&mut self, id: CounterId, hw: &mut HwNotifier) -> bool {
        match self.counters.decrement_ref(&id) {
            Ok(0) => {}
            Ok(_) => return true,
            Err(e) => {
                error!("Error: cannot release counter {}: {}", id, e);
                return false;
            }
        }
        if let Some(cntr) = self.counters.remove(&id) {
            if cntr.ll_created {
                if let Some(oid) = cntr.objid {
                    hw.counter_delete(oid);
                }
            }
            debug!("counter {} freed", cntr.name);
        }
        false
    }

    /// Picks the counter a rule should use, taking a reference on it.
    ///
    /// Numbered groups create a fresh counter named after `index`. Named
    /// groups share "accept" for passing rules and "drop" for dropping
    /// rules; a rule whose action has no declared counter gets none.
    pub fn acquire_for_rule(
        &mut self,
        rule: &PmfRule,
        index: u32,
    ) -> Result<Option<CounterId>, CounterError> {
        match self.cntr_type {
            CounterType::Numbered => self.alloc_numbered(index).map(Some),
            CounterType::Named => Ok(self.resolve_named(rule)),
        }
    }

    fn resolve_named(&mut self, rule: &PmfRule) -> Option<CounterId> {
        use vplane_npf_common::RuleSummary;

        if rule.summary.contains(RuleSummary::PASS) {
            self.find_and_retain(CNTR_ACCEPT)
        } else if rule.summary.contains(RuleSummary::DROP) {
            self.find_and_retain(CNTR_DROP)
        } else {
            None
        }
    }

    /// Whether a rule needs a counter in this group.
    pub fn rule_needs_counter(&self, rule: &PmfRule) -> bool {
        match self.cntr_type {
            CounterType::Numbered => true,
            CounterType::Named => rule.references_counter(),
        }
    }

    // ===== Hardware =====

    /// Publishes one counter, creating it in the hardware if needed.
    pub fn hw_create(&mut self, id: CounterId, group: Option<FalGroupOid>, hw: &mut HwNotifier) {
        let count_bytes = self.count_bytes;
        let Some(cntr) = self.counters.get_mut(&id) else {
            return;
        };
        if !cntr.published {
            cntr.objid = None;
            cntr.count_packets = true;
            cntr.count_bytes = count_bytes;
            cntr.published = true;
        }
        if cntr.ll_created {
            return;
        }
        let req = CounterCreate {
            group,
            name: cntr.name.clone(),
            count_packets: cntr.count_packets,
            count_bytes: cntr.count_bytes,
        };
        match hw.counter_create(&req) {
            Some(oid) => {
                cntr.objid = Some(oid);
                cntr.ll_created = true;
            }
            None => warn!("counter {} published without hardware object", cntr.name),
        }
    }

    /// Publishes every counter of the group.
    pub fn hw_create_all(&mut self, group: Option<FalGroupOid>, hw: &mut HwNotifier) {
        for id in self.ids() {
            self.hw_create(id, group, hw);
        }
    }

    /// Removes every counter from the hardware. The counters stay
    /// allocated and referenced.
    pub fn hw_delete_all(&mut self, hw: &mut HwNotifier) {
        for cntr in self.counters.values_mut() {
            if cntr.ll_created {
                if let Some(oid) = cntr.objid {
                    hw.counter_delete(oid);
                }
            }
            cntr.ll_created = false;
            cntr.published = false;
            cntr.objid = None;
        }
    }

    /// Reads a counter's hardware values.
    pub fn hw_read(&self, id: CounterId, hw: &HwNotifier) -> Option<CounterValues> {
        let cntr = self.counters.get(&id)?;
        if !cntr.ll_created {
            return None;
        }
        hw.counter_read(cntr.objid?)
    }

    /// Resets a counter in the hardware. False when there is no hardware
    /// object or the reset failed.
    pub fn hw_clear(&self, id: CounterId, hw: &HwNotifier) -> bool {
        match self.counters.get(&id) {
            Some(cntr) if cntr.ll_created => cntr.objid.is_some_and(|oid| hw.counter_clear(oid)),
            _ => false,
        }
    }
}
