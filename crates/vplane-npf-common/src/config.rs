//! Rule-group configuration contract.
//!
//! The configuration subsystem owns the rules of every named group. Users
//! replay a group's current rules with [`RuleGroupConfig::walk`] and
//! register to learn about later changes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};

use crate::attach::RuleGroupKey;
use crate::error::ConfigError;
use crate::event::{RuleChange, RuleGroupEvent};
use crate::rule::{PmfRule, RuleEntry};

/// What the engine consumes from the rule-group configuration.
pub trait RuleGroupConfig: Send + Sync {
    /// Replays every configured rule of `group`, including the attribute
    /// rule at [`crate::ATTR_RULE_INDEX`]. The walk stops early when
    /// `visit` returns false.
    fn walk(&self, group: &RuleGroupKey, visit: &mut dyn FnMut(&RuleEntry) -> bool);

    /// Registers `owner` for change events of `group`.
    fn register_listener(&self, group: &RuleGroupKey, owner: &str) -> Result<(), ConfigError>;

    fn deregister_listener(&self, group: &RuleGroupKey, owner: &str) -> Result<(), ConfigError>;
}

#[derive(Debug, Default)]
struct StoreState {
    groups: BTreeMap<RuleGroupKey, BTreeMap<u32, PmfRule>>,
    listeners: BTreeMap<RuleGroupKey, BTreeSet<String>>,
}

/// In-memory rule-group configuration.
#[derive(Debug, Default)]
pub struct RuleGroupStore {
    state: Mutex<StoreState>,
    /// Maximum listeners per group, unlimited when `None`.
    max_listeners: Option<usize>,
}

impl RuleGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store refusing more than `limit` listeners per group.
    pub fn with_listener_limit(limit: usize) -> Self {
        Self {
            state: Mutex::default(),
            max_listeners: Some(limit),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets a rule, replacing any previous rule at that index.
    pub fn set_rule(&self, group: &RuleGroupKey, index: u32, rule: PmfRule) {
        self.lock()
            .groups
            .entry(group.clone())
            .or_default()
            .insert(index, rule);
    }

    pub fn rule(&self, group: &RuleGroupKey, index: u32) -> Option<PmfRule> {
        self.lock()
            .groups
            .get(group)
            .and_then(|rules| rules.get(&index).cloned())
    }

    pub fn rule_count(&self, group: &RuleGroupKey) -> usize {
        self.lock().groups.get(group).map_or(0, BTreeMap::len)
    }

    pub fn has_listeners(&self, group: &RuleGroupKey) -> bool {
        self.lock()
            .listeners
            .get(group)
            .is_some_and(|owners| !owners.is_empty())
    }

    pub fn listener_count(&self, group: &RuleGroupKey) -> usize {
        self.lock().listeners.get(group).map_or(0, BTreeSet::len)
    }

    /// Applies a configuration change to the stored rules.
    ///
    /// Adds of an existing index and changes/deletes of a missing index are
    /// refused, leaving the store unchanged.
    pub fn apply(&self, event: &RuleGroupEvent) -> Result<(), ConfigError> {
        let mut state = self.lock();
        let group = &event.group;
        match &event.change {
            RuleChange::Add { index, rule } => {
                let rules = state.groups.entry(group.clone()).or_default();
                if rules.contains_key(index) {
                    return Err(ConfigError::RuleExists {
                        group: group.clone(),
                        index: *index,
                    });
                }
                rules.insert(*index, rule.clone());
            }
            RuleChange::Change { index, rule } => {
                match state.groups.get_mut(group).and_then(|r| r.get_mut(index)) {
                    Some(slot) => *slot = rule.clone(),
                    None => {
                        return Err(ConfigError::RuleNotFound {
                            group: group.clone(),
                            index: *index,
                        })
                    }
                }
            }
            RuleChange::Delete { index } => {
                let removed = state.groups.get_mut(group).and_then(|r| r.remove(index));
                if removed.is_none() {
                    return Err(ConfigError::RuleNotFound {
                        group: group.clone(),
                        index: *index,
                    });
                }
                if state.groups.get(group).is_some_and(BTreeMap::is_empty) {
                    state.groups.remove(group);
                }
            }
        }
        debug!("config: {} rule {} updated", group, event.change.index());
        Ok(())
    }
}

impl RuleGroupConfig for RuleGroupStore {
    fn walk(&self, group: &RuleGroupKey, visit: &mut dyn FnMut(&RuleEntry) -> bool) {
        // Snapshot first so the visitor may call back into the store.
        let entries: Vec<RuleEntry> = match self.lock().groups.get(group) {
            Some(rules) => rules
                .iter()
                .map(|(index, rule)| RuleEntry::new(*index, rule.clone()))
                .collect(),
            None => return,
        };

        for entry in &entries {
            if !visit(entry) {
                break;
            }
        }
    }

    fn register_listener(&self, group: &RuleGroupKey, owner: &str) -> Result<(), ConfigError> {
        let limit = self.max_listeners;
        let mut state = self.lock();
        let owners = state.listeners.entry(group.clone()).or_default();
        if owners.contains(owner) {
            return Err(ConfigError::ListenerExists {
                group: group.clone(),
                owner: owner.to_string(),
            });
        }
        if let Some(limit) = limit {
            if owners.len() >= limit {
                warn!("config: listener limit reached for {}", group);
                return Err(ConfigError::ListenerLimit {
                    group: group.clone(),
                    limit,
                });
            }
        }
        owners.insert(owner.to_string());
        Ok(())
    }

    fn deregister_listener(&self, group: &RuleGroupKey, owner: &str) -> Result<(), ConfigError> {
        let mut state = self.lock();
        let removed = state
            .listeners
            .get_mut(group)
            .is_some_and(|owners| owners.remove(owner));
        if !removed {
            return Err(ConfigError::ListenerNotRegistered {
                group: group.clone(),
                owner: owner.to_string(),
            });
        }
        if state.listeners.get(group).is_some_and(BTreeSet::is_empty) {
            state.listeners.remove(group);
        }
        Ok(())
    }
}
