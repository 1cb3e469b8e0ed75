//! ArlgOrch - attached rule group orchestrator.
//!
//! Owns every ruleset (one per interface and direction) with its groups,
//! and the commit coordinator through which all hardware notifications
//! flow. All mutation happens from [`EventHandler::handle_event`], one
//! event at a time.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vplane_fal::FalApi;
use vplane_npf_common::{
    ConfigError, DataplaneEvent, EventHandler, InterfaceEvent, InterfaceLookup, RuleGroupConfig,
};
use vplane_types::Direction;

use super::commit::CommitCoordinator;
use crate::gpc::{CounterError, Group, HwNotifier, Ruleset, RulesetKey};

/// Error type for ArlgOrch operations.
#[derive(Debug, Error)]
pub enum ArlgError {
    #[error("duplicate attribute rule for {context}")]
    DuplicateAttrRule { context: String },

    #[error("no rule {index} in {context}")]
    RuleNotFound { context: String, index: u32 },

    #[error("rule already present at {context}")]
    DuplicateRule { context: String },

    #[error("counter {name} already exists for {context}")]
    DuplicateCounter { context: String, name: String },

    #[error("out of {what} for {context}")]
    ResourceExhausted { context: String, what: &'static str },

    #[error("ruleset not found: {0}")]
    RulesetNotFound(String),

    #[error("group already attached: {0}")]
    GroupExists(String),

    #[error("group not attached: {0}")]
    GroupNotFound(String),

    #[error("failed to register group listener ({context})")]
    Registration {
        context: String,
        #[source]
        source: ConfigError,
    },

    #[error("I/O error: {failed} counter clear(s) failed")]
    Io { failed: usize },
}

impl ArlgError {
    pub(crate) fn from_counter(context: String, err: CounterError) -> Self {
        match err {
            CounterError::Duplicate(name) => ArlgError::DuplicateCounter { context, name },
            CounterError::Exhausted(_) => ArlgError::ResourceExhausted {
                context,
                what: "counters",
            },
        }
    }
}

/// Result type alias for ArlgOrch operations.
pub type Result<T> = std::result::Result<T, ArlgError>;

/// Configuration for ArlgOrch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArlgConfig {
    /// Maximum ordinary rules per group.
    pub max_rules_per_group: u32,
    /// Maximum counters per counter group.
    pub max_counters_per_group: usize,
    /// Enable byte counting in addition to packet counting.
    pub count_bytes: bool,
}

impl Default for ArlgConfig {
    fn default() -> Self {
        Self {
            max_rules_per_group: 8192,
            max_counters_per_group: 8192,
            count_bytes: false,
        }
    }
}

/// Operational statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArlgStats {
    pub groups_created: u64,
    pub groups_deleted: u64,
    pub rules_added: u64,
    pub rules_changed: u64,
    pub rules_deleted: u64,
    pub commits: u64,
    pub deferred_processed: u64,
    pub failed_ops: u64,
}

/// Attached rule group orchestrator.
pub struct ArlgOrch {
    pub(crate) config: ArlgConfig,
    pub(crate) rulesets: BTreeMap<RulesetKey, Ruleset>,
    pub(crate) coordinator: CommitCoordinator,
    pub(crate) rule_config: Arc<dyn RuleGroupConfig>,
    pub(crate) interfaces: Arc<dyn InterfaceLookup>,
    pub(crate) stats: ArlgStats,
}

impl std::fmt::Debug for ArlgOrch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArlgOrch")
            .field("config", &self.config)
            .field("rulesets", &self.rulesets.len())
            .field("coordinator", &self.coordinator)
            .field("stats", &self.stats)
            .finish()
    }
}

impl ArlgOrch {
    pub fn new(
        config: ArlgConfig,
        fal: Arc<dyn FalApi>,
        rule_config: Arc<dyn RuleGroupConfig>,
        interfaces: Arc<dyn InterfaceLookup>,
    ) -> Self {
        info!("ArlgOrch: starting with {:?}", config);
        Self {
            config,
            rulesets: BTreeMap::new(),
            coordinator: CommitCoordinator::new(HwNotifier::new(fal)),
            rule_config,
            interfaces,
            stats: ArlgStats::default(),
        }
    }

    pub fn config(&self) -> &ArlgConfig {
        &self.config
    }

    pub fn stats(&self) -> &ArlgStats {
        &self.stats
    }

    pub fn coordinator(&self) -> &CommitCoordinator {
        &self.coordinator
    }

    pub fn ruleset_count(&self) -> usize {
        self.rulesets.len()
    }

    pub fn rulesets(&self) -> impl Iterator<Item = &Ruleset> {
        self.rulesets.values()
    }

    pub fn ruleset(&self, ifname: &str, dir: Direction) -> Option<&Ruleset> {
        self.rulesets.get(&RulesetKey::new(ifname, dir))
    }

    pub fn group(&self, ifname: &str, dir: Direction, name: &str) -> Option<&Group> {
        self.ruleset(ifname, dir)?.group(name)
    }

    /// Log contexts of every group waiting for a deferred publication.
    pub fn deferred_groups(&self) -> Vec<String> {
        self.rulesets
            .values()
            .flat_map(|rs| {
                rs.groups
                    .iter()
                    .filter(|g| g.is_deferred())
                    .map(|g| rs.binding.context(g.name()))
            })
            .collect()
    }
}

impl EventHandler for ArlgOrch {
    fn name(&self) -> &str {
        "arlg"
    }

    fn handle_event(&mut self, event: &DataplaneEvent) {
        let result = match event {
            DataplaneEvent::AttachPoint(ev) => self.handle_attach_point(ev),
            // Failures are logged and counted per group by the fan-out.
            DataplaneEvent::RuleGroup(ev) => {
                self.handle_rule_group(ev);
                Ok(())
            }
            DataplaneEvent::Interface(InterfaceEvent::Created { ifname }) => {
                self.interface_created(ifname);
                Ok(())
            }
            DataplaneEvent::Interface(_) => Ok(()),
            DataplaneEvent::Commit => {
                self.commit();
                Ok(())
            }
        };
        if let Err(e) = result {
            self.stats.failed_ops += 1;
            error!("ArlgOrch: {}", e);
        }
    }

    fn has_pending_work(&self) -> bool {
        self.coordinator.has_deferrals()
            || self.coordinator.is_commit_pending()
            || self.coordinator.hw().queued() > 0
    }

    fn dump_pending(&self) -> Vec<String> {
        self.deferred_groups()
    }
}
