//! Attached rule group engine.
//!
//! `ArlgOrch` keeps the ruleset/group/rule/counter graph for ACL groups
//! attached to interfaces in step with configuration, and publishes it
//! to the hardware through the commit coordinator.

pub mod cntg;
pub mod commit;
pub mod listener;
pub mod opmode;
pub mod orch;
pub mod publish;
pub mod reconcile;

pub use commit::CommitCoordinator;
pub use opmode::{CounterFilter, ShowCounter, ShowCounters, ShowGroup, ShowHwValues, ShowRuleset};
pub use orch::{ArlgConfig, ArlgError, ArlgOrch, ArlgStats, Result};
pub use publish::{transition, Publication};
