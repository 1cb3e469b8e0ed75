//! Op-mode introspection: a flag dump of the whole object graph, the
//! "show counters" JSON query and "clear counters".

use std::fmt::{self, Write};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use vplane_fal::CounterValues;
use vplane_types::Direction;

use super::orch::{ArlgError, ArlgOrch, Result};
use crate::gpc::{Counter, CounterGroup, CounterId, Group, HwNotifier, Ruleset};

fn flag(set: bool, label: &'static str) -> &'static str {
    if set {
        label
    } else {
        ""
    }
}

fn oid_or_zero<T: fmt::Display>(oid: Option<T>) -> String {
    oid.map_or_else(|| "0".to_string(), |o| o.to_string())
}

impl ArlgOrch {
    /// Writes every ruleset, group, counter and rule with its flags.
    pub fn dump(&self, out: &mut dyn Write) -> fmt::Result {
        let hw = self.coordinator.hw();
        for ruleset in self.rulesets.values() {
            dump_ruleset(ruleset, hw, out)?;
        }
        Ok(())
    }

    pub fn dump_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.dump(&mut out);
        out
    }

    /// Collects the counters selected by `filter`.
    ///
    /// Only rulesets bound to a live interface and only published
    /// counters are reported. Hardware values are included when the
    /// counter exists in the hardware and could be read.
    pub fn show_counters(&self, filter: &CounterFilter) -> ShowCounters {
        let filter = filter.normalized();
        let hw = self.coordinator.hw();
        let mut rulesets = Vec::new();

        for ruleset in self.rulesets.values().filter(|rs| filter.matches_ruleset(rs)) {
            if ruleset.binding.ifp.is_none() {
                continue;
            }
            let groups = ruleset
                .groups
                .iter()
                .filter(|g| filter.matches_group(g))
                .map(|g| ShowGroup {
                    name: g.name().to_string(),
                    counters: g
                        .cntg()
                        .map(|cntg| show_cntg(cntg, hw))
                        .unwrap_or_default(),
                })
                .collect();
            rulesets.push(ShowRuleset {
                interface: ruleset.binding.ifname.clone(),
                direction: ruleset.binding.direction,
                groups,
            });
        }
        ShowCounters { rulesets }
    }

    /// Resets every published counter selected by `filter`.
    ///
    /// All matched counters are attempted even when some fail; the
    /// failures are reported together as one I/O error.
    pub fn clear_counters(&self, filter: &CounterFilter) -> Result<()> {
        let filter = filter.normalized();
        let hw = self.coordinator.hw();
        let mut failed = 0;

        for ruleset in self.rulesets.values().filter(|rs| filter.matches_ruleset(rs)) {
            if ruleset.binding.ifp.is_none() {
                continue;
            }
            for group in ruleset.groups.iter().filter(|g| filter.matches_group(g)) {
                let Some(cntg) = group.cntg() else {
                    continue;
                };
                for (id, cntr) in cntg.iter().filter(|(_, c)| c.is_published()) {
                    if !cntg.hw_clear(id, hw) {
                        warn!(
                            "{}: failed to clear counter {}",
                            ruleset.binding.context(group.name()),
                            cntr.name()
                        );
                        failed += 1;
                    }
                }
            }
        }

        if failed > 0 {
            return Err(ArlgError::Io { failed });
        }
        debug!("ArlgOrch: counters cleared");
        Ok(())
    }
}

fn dump_ruleset(ruleset: &Ruleset, hw: &HwNotifier, out: &mut dyn Write) -> fmt::Result {
    let binding = &ruleset.binding;
    let ifindex = binding.ifp.as_ref().map_or(0, |ifp| ifp.ifindex.as_u32());
    writeln!(
        out,
        " RLS: {}({})/{}{}{}",
        binding.ifname,
        ifindex,
        if binding.is_ingress() { "In " } else { "Out" },
        flag(binding.ifp.is_some(), " IFP"),
        flag(binding.if_created, " IfCrt"),
    )?;
    for group in &ruleset.groups {
        dump_group(group, hw, out)?;
    }
    Ok(())
}

fn dump_group(group: &Group, hw: &HwNotifier, out: &mut dyn Write) -> fmt::Result {
    writeln!(
        out,
        "  GRP:({}): {}({}/{:x}){}{}{}{}{}{}{}",
        oid_or_zero(group.objid()),
        group.name(),
        group.rule_count(),
        group.summary().bits(),
        flag(group.is_published(), " Pub"),
        flag(group.is_ll_created(), " LLcrt"),
        flag(group.is_attached(), " Att"),
        flag(group.is_ll_attached(), " LLatt"),
        flag(group.is_deferred(), " Defr"),
        flag(group.has_attr_flag(), " GAttr"),
        group.family().map_or("", |af| if af.is_v6() { " v6" } else { " v4" }),
    )?;

    if let Some(cntg) = group.cntg() {
        for (id, cntr) in cntg.iter().filter(|(_, c)| c.is_published()) {
            dump_counter(cntg, id, cntr, hw, out)?;
        }
    }

    for rule in group.rules() {
        writeln!(
            out,
            "   RL:({}): {}({:x}){}{}",
            oid_or_zero(rule.objid()),
            rule.index(),
            rule.rule().summary.bits(),
            flag(rule.is_published(), " Pub"),
            flag(rule.is_ll_created(), " LLcrt"),
        )?;
    }
    Ok(())
}

fn dump_counter(
    cntg: &CounterGroup,
    id: CounterId,
    cntr: &Counter,
    hw: &HwNotifier,
    out: &mut dyn Write,
) -> fmt::Result {
    writeln!(
        out,
        "   CT:({}): {}{}{}{}{}",
        oid_or_zero(cntr.objid()),
        cntr.name(),
        flag(cntr.is_published(), " Pub"),
        flag(cntr.is_ll_created(), " LLcrt"),
        flag(cntr.counts_packets(), " Pkt"),
        flag(cntr.counts_bytes(), " Byte"),
    )?;

    if !cntr.is_ll_created() {
        return Ok(());
    }
    match cntg.hw_read(id, hw) {
        Some(CounterValues { packets, bytes }) => {
            let pkts = if cntr.counts_packets() {
                format!("{}/{:x}", packets, packets)
            } else {
                "-".to_string()
            };
            let bytes = if cntr.counts_bytes() {
                format!("{}/{:x}", bytes, bytes)
            } else {
                "-".to_string()
            };
            writeln!(out, "      Pkt({}) Byte({})", pkts, bytes)
        }
        None => writeln!(out, "      (unreadable)"),
    }
}

fn show_cntg(cntg: &CounterGroup, hw: &HwNotifier) -> Vec<ShowCounter> {
    cntg.iter()
        .filter(|(_, c)| c.is_published())
        .map(|(id, cntr)| {
            let hw_values = if cntr.is_ll_created() {
                cntg.hw_read(id, hw).map(|v| ShowHwValues {
                    pkts: cntr.counts_packets().then_some(v.packets),
                    bytes: cntr.counts_bytes().then_some(v.bytes),
                })
            } else {
                None
            };
            ShowCounter {
                name: cntr.name().to_string(),
                cnt_pkts: cntr.counts_packets(),
                cnt_bytes: cntr.counts_bytes(),
                hw: hw_values,
            }
        })
        .collect()
}

/// Selection for show/clear counters.
///
/// The filter is hierarchical: a direction only applies together with an
/// interface, and a group name only together with a direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterFilter {
    pub ifname: Option<String>,
    pub direction: Option<Direction>,
    pub group: Option<String>,
}

impl CounterFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn interface(ifname: impl Into<String>) -> Self {
        Self {
            ifname: Some(ifname.into()),
            ..Self::default()
        }
    }

    pub fn with_direction(mut self, dir: Direction) -> Self {
        self.direction = Some(dir);
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Drops the parts of the filter that lack their parent.
    pub fn normalized(&self) -> Self {
        let ifname = self.ifname.clone();
        let direction = self.direction.filter(|_| ifname.is_some());
        let group = self.group.clone().filter(|_| direction.is_some());
        Self {
            ifname,
            direction,
            group,
        }
    }

    fn matches_ruleset(&self, ruleset: &Ruleset) -> bool {
        self.ifname
            .as_deref()
            .map_or(true, |name| name == ruleset.binding.ifname)
            && self
                .direction
                .map_or(true, |dir| dir == ruleset.binding.direction)
    }

    fn matches_group(&self, group: &Group) -> bool {
        self.group.as_deref().map_or(true, |name| name == group.name())
    }
}

/// Result of "show counters".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShowCounters {
    pub rulesets: Vec<ShowRuleset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowRuleset {
    pub interface: String,
    pub direction: Direction,
    pub groups: Vec<ShowGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowGroup {
    pub name: String,
    pub counters: Vec<ShowCounter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowCounter {
    pub name: String,
    #[serde(rename = "cnt-pkts")]
    pub cnt_pkts: bool,
    #[serde(rename = "cnt-bytes")]
    pub cnt_bytes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hw: Option<ShowHwValues>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShowHwValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filter_hierarchy() {
        let filter = CounterFilter {
            ifname: None,
            direction: Some(Direction::In),
            group: Some("web".to_string()),
        };
        assert_eq!(filter.normalized(), CounterFilter::all());

        let filter = CounterFilter::interface("dp0p1").with_group("web");
        assert_eq!(filter.normalized(), CounterFilter::interface("dp0p1"));

        let filter = CounterFilter::interface("dp0p1")
            .with_direction(Direction::Out)
            .with_group("web");
        assert_eq!(filter.normalized(), filter);
    }

    #[test]
    fn test_show_counter_json_shape() {
        let counter = ShowCounter {
            name: "accept".to_string(),
            cnt_pkts: true,
            cnt_bytes: false,
            hw: Some(ShowHwValues {
                pkts: Some(12),
                bytes: None,
            }),
        };
        let json = serde_json::to_value(&counter).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "accept",
                "cnt-pkts": true,
                "cnt-bytes": false,
                "hw": { "pkts": 12 }
            })
        );

        let ruleset = ShowRuleset {
            interface: "dp0p1".to_string(),
            direction: Direction::In,
            groups: vec![],
        };
        let json = serde_json::to_value(&ruleset).unwrap();
        assert_eq!(json["direction"], "in");
    }
}
