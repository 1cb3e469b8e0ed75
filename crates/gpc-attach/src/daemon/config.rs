//! Daemon configuration file (YAML).

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vplane_npf_common::{
    ConfigError, InterfaceTable, PmfRule, RuleClass, RuleEntry, RuleGroupKey, RuleGroupStore,
    ATTR_RULE_INDEX,
};
use vplane_types::IfIndex;

use super::dispatcher::DispatcherConfig;
use crate::arlg::ArlgConfig;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON script: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),
}

/// An interface known at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSeed {
    pub name: String,
    pub ifindex: IfIndex,
    /// Already created at the hardware layer.
    #[serde(default)]
    pub created: bool,
}

/// A rule group configured at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroupSeed {
    #[serde(default = "default_class")]
    pub class: RuleClass,
    pub name: String,
    /// Attribute rule of the group.
    #[serde(default)]
    pub attr: Option<PmfRule>,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

fn default_class() -> RuleClass {
    RuleClass::Acl
}

impl RuleGroupSeed {
    pub fn key(&self) -> RuleGroupKey {
        RuleGroupKey {
            class: self.class,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub arlg: ArlgConfig,
    pub dispatcher: DispatcherConfig,
    pub interfaces: Vec<InterfaceSeed>,
    pub rule_groups: Vec<RuleGroupSeed>,
}

impl DaemonConfig {
    pub fn from_yaml(text: &str) -> Result<Self, DaemonError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, DaemonError> {
        let text = fs::read_to_string(path).map_err(|source| DaemonError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        info!(
            "config: loaded {} interfaces and {} rule groups from {}",
            config.interfaces.len(),
            config.rule_groups.len(),
            path.display()
        );
        Ok(config)
    }

    /// Fills the interface table from the interface seeds.
    pub fn seed_interfaces(&self, table: &InterfaceTable) -> Result<(), DaemonError> {
        for seed in &self.interfaces {
            table.add(&seed.name, seed.ifindex);
            if seed.created {
                table.set_created(&seed.name)?;
            }
        }
        Ok(())
    }

    /// Fills the rule-group store from the rule-group seeds.
    pub fn seed_rule_groups(&self, store: &RuleGroupStore) {
        for seed in &self.rule_groups {
            let key = seed.key();
            for entry in &seed.rules {
                store.set_rule(&key, entry.index, entry.rule.clone());
            }
            if let Some(attr) = &seed.attr {
                store.set_rule(&key, ATTR_RULE_INDEX, attr.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vplane_npf_common::{InterfaceLookup, RuleSummary};
    use vplane_types::AddressFamily;

    const SAMPLE: &str = r#"
arlg:
  count_bytes: true
interfaces:
  - name: dp0p1
    ifindex: 7
    created: true
  - name: dp0p2
    ifindex: 8
rule_groups:
  - name: web
    attr:
      summary: "IP_FAMILY | COUNT_DEF"
      family: v4
    rules:
      - index: 10
        rule:
          summary: "PASS | COUNT_REF"
"#;

    #[test]
    fn test_parse_sample() {
        let config = DaemonConfig::from_yaml(SAMPLE).unwrap();
        assert!(config.arlg.count_bytes);
        assert_eq!(config.arlg.max_rules_per_group, 8192);
        assert_eq!(config.dispatcher, DispatcherConfig::default());
        assert_eq!(config.interfaces.len(), 2);
        assert!(!config.interfaces[1].created);

        let group = &config.rule_groups[0];
        assert_eq!(group.class, RuleClass::Acl);
        let attr = group.attr.as_ref().unwrap();
        assert_eq!(attr.family, Some(AddressFamily::V4));
        assert!(attr.defines_counters());
        assert_eq!(
            group.rules[0].rule.summary,
            RuleSummary::PASS | RuleSummary::COUNT_REF
        );
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = DaemonConfig::from_yaml("{}").unwrap();
        assert_eq!(config, DaemonConfig::default());
    }

    #[test]
    fn test_seeding() {
        let config = DaemonConfig::from_yaml(SAMPLE).unwrap();
        let table = InterfaceTable::new();
        let store = RuleGroupStore::new();
        config.seed_interfaces(&table).unwrap();
        config.seed_rule_groups(&store);

        assert!(table.is_created("dp0p1"));
        assert!(!table.is_created("dp0p2"));
        assert_eq!(table.lookup("dp0p2").unwrap().ifindex.as_u32(), 8);
        let web = RuleGroupKey::acl("web");
        assert_eq!(store.rule_count(&web), 2);
        assert!(store.rule(&web, ATTR_RULE_INDEX).is_some());
    }
}
