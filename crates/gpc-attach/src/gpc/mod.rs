//! Generic packet classifier object graph.
//!
//! Rulesets own groups, groups own rules and an optional counter group,
//! and rules hold references on counters. Each object mirrors one FAL
//! object and carries its published / low-level-created state.

pub mod cntr;
pub mod group;
pub mod hw;
pub mod rlset;
pub mod rule;

pub use cntr::{Counter, CounterError, CounterGroup, CounterId, CounterType, CNTR_ACCEPT, CNTR_DROP};
pub use group::Group;
pub use hw::{HwNotifier, HwScope};
pub use rlset::{Ruleset, RulesetBinding, RulesetKey};
pub use rule::GroupRule;
