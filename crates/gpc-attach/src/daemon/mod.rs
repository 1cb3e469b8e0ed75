//! Daemon plumbing around the engine: event dispatch, the configuration
//! file and replay scripts.

pub mod config;
pub mod dispatcher;
pub mod script;

pub use config::{DaemonConfig, DaemonError, InterfaceSeed, RuleGroupSeed};
pub use dispatcher::{DispatchStats, DispatcherConfig, EventDispatcher};
