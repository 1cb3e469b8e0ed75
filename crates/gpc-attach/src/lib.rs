//! GPC attached rule group engine.
//!
//! Keeps ACL rule groups attached to interfaces published to the
//! hardware as generic packet classifier (GPC) objects.
//!
//! # Architecture
//!
//! ```text
//! [attach points] ─┐
//! [rule groups] ───┼──> [EventDispatcher] ──> [ArlgOrch] ──> [HwNotifier] ──> [FAL]
//! [interfaces] ────┘                              │
//!                                           [op-mode dump/show/clear]
//! ```
//!
//! # Key Components
//!
//! - [`gpc`]: the ruleset/group/rule/counter object graph and its hardware
//!   notification helpers
//! - [`arlg`]: the engine, [`arlg::ArlgOrch`], with the rule reconciler,
//!   publication state machine, event listener and commit coordinator
//! - [`daemon`]: event dispatch, the YAML configuration and replay scripts

pub mod arlg;
pub mod daemon;
pub mod gpc;

pub use arlg::{ArlgConfig, ArlgError, ArlgOrch, ArlgStats, CounterFilter, ShowCounters};
pub use daemon::{DaemonConfig, DaemonError, DispatcherConfig, EventDispatcher};
