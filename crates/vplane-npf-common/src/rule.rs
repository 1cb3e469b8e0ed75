//! Parsed rules as delivered by the rule-group configuration.
//!
//! The engine does not look at match or action contents. It only needs the
//! rule's summary bits, plus the address family for the group attribute
//! rule.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use vplane_types::AddressFamily;

/// Reserved index of the group attribute rule.
pub const ATTR_RULE_INDEX: u32 = u32::MAX;

bitflags! {
    /// Summary of what a rule matches on and does.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct RuleSummary: u32 {
        // Match fields
        const IP_FAMILY = 1 << 0;
        const SRC_ADDR = 1 << 1;
        const DST_ADDR = 1 << 2;
        const PROTO = 1 << 3;
        const SRC_PORT = 1 << 4;
        const DST_PORT = 1 << 5;
        const ICMP = 1 << 6;
        const DSCP = 1 << 7;

        // Actions
        const PASS = 1 << 16;
        const DROP = 1 << 17;
        /// Rule references a counter.
        const COUNT_REF = 1 << 18;
        /// Attribute rule defines counters for the group.
        const COUNT_DEF = 1 << 19;
        /// Group counts "accept" actions by name.
        const COUNT_DEF_PASS = 1 << 20;
        /// Group counts "drop" actions by name.
        const COUNT_DEF_DROP = 1 << 21;

        const COUNT_DEF_NAMED = Self::COUNT_DEF_PASS.bits() | Self::COUNT_DEF_DROP.bits();
    }
}

impl Default for RuleSummary {
    fn default() -> Self {
        Self::empty()
    }
}

/// A parsed rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmfRule {
    #[serde(default)]
    pub summary: RuleSummary,
    /// Address family match; only meaningful on the attribute rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<AddressFamily>,
}

impl PmfRule {
    pub fn new(summary: RuleSummary) -> Self {
        Self {
            summary,
            family: None,
        }
    }

    /// An ordinary rule passing traffic.
    pub fn pass() -> Self {
        Self::new(RuleSummary::PASS)
    }

    /// An ordinary rule dropping traffic.
    pub fn block() -> Self {
        Self::new(RuleSummary::DROP)
    }

    /// A group attribute rule.
    pub fn attr(family: Option<AddressFamily>) -> Self {
        let mut rule = Self::default();
        rule.set_family(family);
        rule
    }

    pub fn with_summary(mut self, bits: RuleSummary) -> Self {
        self.summary |= bits;
        self
    }

    /// Marks the rule as referencing a counter.
    pub fn counted(self) -> Self {
        self.with_summary(RuleSummary::COUNT_REF)
    }

    /// Attribute rule declaring numbered (per-rule) counters.
    pub fn count_numbered(self) -> Self {
        self.with_summary(RuleSummary::COUNT_DEF)
    }

    /// Attribute rule declaring named (per-action) counters.
    pub fn count_named(self, accept: bool, drop: bool) -> Self {
        let mut bits = RuleSummary::COUNT_DEF;
        if accept {
            bits |= RuleSummary::COUNT_DEF_PASS;
        }
        if drop {
            bits |= RuleSummary::COUNT_DEF_DROP;
        }
        self.with_summary(bits)
    }

    fn set_family(&mut self, family: Option<AddressFamily>) {
        self.family = family;
        self.summary.set(RuleSummary::IP_FAMILY, family.is_some());
    }

    pub fn defines_counters(&self) -> bool {
        self.summary.contains(RuleSummary::COUNT_DEF)
    }

    /// True when the attribute rule asks for named counters.
    pub fn defines_named_counters(&self) -> bool {
        self.defines_counters() && self.summary.intersects(RuleSummary::COUNT_DEF_NAMED)
    }

    pub fn defines_accept_counter(&self) -> bool {
        self.defines_counters() && self.summary.contains(RuleSummary::COUNT_DEF_PASS)
    }

    pub fn defines_drop_counter(&self) -> bool {
        self.defines_counters() && self.summary.contains(RuleSummary::COUNT_DEF_DROP)
    }

    pub fn references_counter(&self) -> bool {
        self.summary.contains(RuleSummary::COUNT_REF)
    }
}

/// One rule as replayed by a configuration walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub index: u32,
    pub rule: PmfRule,
}

impl RuleEntry {
    pub fn new(index: u32, rule: PmfRule) -> Self {
        Self { index, rule }
    }

    pub fn is_attr(&self) -> bool {
        self.index == ATTR_RULE_INDEX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attr_rule_family_bit() {
        let rule = PmfRule::attr(Some(AddressFamily::V6));
        assert!(rule.summary.contains(RuleSummary::IP_FAMILY));
        assert_eq!(rule.family, Some(AddressFamily::V6));

        let rule = PmfRule::attr(None);
        assert!(rule.summary.is_empty());
    }

    #[test]
    fn test_counter_declarations() {
        let numbered = PmfRule::attr(Some(AddressFamily::V4)).count_numbered();
        assert!(numbered.defines_counters());
        assert!(!numbered.defines_named_counters());

        let named = PmfRule::attr(None).count_named(true, false);
        assert!(named.defines_named_counters());
        assert!(named.defines_accept_counter());
        assert!(!named.defines_drop_counter());

        // Named bits without COUNT_DEF declare nothing.
        let stray = PmfRule::new(RuleSummary::COUNT_DEF_PASS);
        assert!(!stray.defines_accept_counter());
    }

    #[test]
    fn test_summary_serde() {
        let rule = PmfRule::pass().counted();
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(json, r#"{"summary":"PASS | COUNT_REF"}"#);

        let back: PmfRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);

        let attr: PmfRule =
            serde_json::from_str(r#"{"summary":"IP_FAMILY | COUNT_DEF","family":"v4"}"#).unwrap();
        assert_eq!(attr.family, Some(AddressFamily::V4));
        assert!(attr.defines_counters());
    }

    #[test]
    fn test_rule_entry_attr() {
        assert!(RuleEntry::new(ATTR_RULE_INDEX, PmfRule::default()).is_attr());
        assert!(!RuleEntry::new(10, PmfRule::pass()).is_attr());
    }
}
