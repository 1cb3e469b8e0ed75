//! The FAL classifier API.
//!
//! [`FalApi`] is the one-way notification boundary used by the attached
//! rule group engine. Every call succeeds or fails on its own; nothing is
//! guaranteed to reach the hardware until [`FalApi::commit`] is called.
//!
//! - [`group`]: classifier group requests
//! - [`rule`]: rule entry requests
//! - [`counter`]: counter requests and values

pub mod counter;
pub mod group;
pub mod rule;

pub use counter::{CounterCreate, CounterValues};
pub use group::GroupCreate;
pub use rule::RuleCreate;

use crate::error::FalResult;
use crate::types::{FalCounterOid, FalGroupOid, FalRuleOid};
use vplane_types::{Direction, IfIndex};

/// Classifier object operations exposed by the FAL.
///
/// Implementations must be `Send + Sync` so the engine can be moved onto
/// the dispatcher task.
pub trait FalApi: Send + Sync {
    // ===== Groups =====

    fn group_create(&self, req: &GroupCreate) -> FalResult<FalGroupOid>;

    /// Updates the group summary bits after its rule set changed.
    fn group_modify(&self, group: FalGroupOid, summary: u32) -> FalResult<()>;

    fn group_delete(&self, group: FalGroupOid) -> FalResult<()>;

    fn group_attach(&self, group: FalGroupOid, ifindex: IfIndex, dir: Direction)
        -> FalResult<()>;

    fn group_detach(&self, group: FalGroupOid, ifindex: IfIndex, dir: Direction)
        -> FalResult<()>;

    // ===== Rules =====

    fn rule_create(&self, req: &RuleCreate) -> FalResult<FalRuleOid>;

    fn rule_delete(&self, rule: FalRuleOid) -> FalResult<()>;

    // ===== Counters =====

    fn counter_create(&self, req: &CounterCreate) -> FalResult<FalCounterOid>;

    fn counter_delete(&self, counter: FalCounterOid) -> FalResult<()>;

    fn counter_read(&self, counter: FalCounterOid) -> FalResult<CounterValues>;

    fn counter_clear(&self, counter: FalCounterOid) -> FalResult<()>;

    // ===== Batching =====

    /// Flushes every queued notification to the hardware as one unit.
    fn commit(&self) -> FalResult<()>;
}
