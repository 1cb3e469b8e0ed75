//! Errors raised by the configuration collaborators.

use crate::attach::RuleGroupKey;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("listener {owner} already registered for {group}")]
    ListenerExists { group: RuleGroupKey, owner: String },

    #[error("listener {owner} not registered for {group}")]
    ListenerNotRegistered { group: RuleGroupKey, owner: String },

    #[error("listener limit ({limit}) reached for {group}")]
    ListenerLimit { group: RuleGroupKey, limit: usize },

    #[error("rule {index} already configured in {group}")]
    RuleExists { group: RuleGroupKey, index: u32 },

    #[error("rule {index} not configured in {group}")]
    RuleNotFound { group: RuleGroupKey, index: u32 },

    #[error("interface {0} not known")]
    UnknownInterface(String),
}
