//! Common NPF configuration contracts.
//!
//! This crate defines what the attached rule group engine consumes from its
//! collaborators, and the in-memory stand-ins used by the daemon:
//!
//! - [`attach`]: attach-point keys, ruleset types and rule classes
//! - [`rule`]: the parsed rule and its summary bits
//! - [`event`]: typed event payloads delivered by the dispatcher
//! - [`config`]: the rule-group configuration contract and [`RuleGroupStore`]
//! - [`interface`]: the interface lookup contract and [`InterfaceTable`]
//! - [`handler`]: the [`EventHandler`] trait driven by the dispatcher
//! - [`sync_map`]: a map that never auto-creates entries

pub mod attach;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod interface;
pub mod rule;
pub mod sync_map;

pub use attach::{AttachPointKey, AttachType, RuleClass, RuleGroupKey, RulesetType};
pub use config::{RuleGroupConfig, RuleGroupStore};
pub use error::ConfigError;
pub use event::{AttachPointEvent, DataplaneEvent, InterfaceEvent, RuleChange, RuleGroupEvent};
pub use handler::EventHandler;
pub use interface::{InterfaceLookup, InterfaceRef, InterfaceTable};
pub use rule::{PmfRule, RuleEntry, RuleSummary, ATTR_RULE_INDEX};
pub use sync_map::{HasRefCount, SyncMap, SyncMapError};
