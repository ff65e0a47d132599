//! Intent expansion.
//!
//! [`RuleCompiler`] turns intents into per-switch table entries. It keeps the
//! registries needed for cross-intent checks (tunnel ids, selection ranges,
//! port directions, claimed entry keys) in the compiler value itself; a
//! failed intent leaves them untouched.

use super::entry::{CompiledBatch, CompiledEntry, MatchField, TableEntry};
use super::error::{CompileError, IntentError};
use super::lower::lower;
use super::plan::TablePlan;
use crate::intent::{
    Direction, EcmpIntent, FirewallPortIntent, ForwardIntent, Intent, NextHopIntent,
    RewriteIntent, TraceIntent, TunnelIntent,
};
use crate::schema::SchemaResolver;
use crate::topology::{Switch, Topology};
use log::{debug, info};
use p4ctl_southbound::{DeviceEntry, EntryKey, MatchValue};
use p4ctl_types::{Ipv4Address, Ipv4Prefix, MacAddress, PortNumber};
use std::collections::BTreeMap;

/// Priority of an LPM entry: longer prefixes win and priorities stay positive.
pub fn lpm_priority(prefix_len: u8) -> i32 {
    i32::from(prefix_len) + 1
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TunnelBinding {
    ingress: String,
    egress: String,
    dst_ip: Ipv4Address,
    dst_mac: MacAddress,
}

impl TunnelBinding {
    fn describe(&self) -> String {
        format!("{} -> {} to {}", self.ingress, self.egress, self.dst_ip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SelectionRange {
    base: u32,
    end: u64,
    prefix: Ipv4Prefix,
}

impl SelectionRange {
    fn overlaps(&self, other: &SelectionRange) -> bool {
        u64::from(self.base) < other.end && u64::from(other.base) < self.end
    }

    fn contains(&self, index: u32) -> bool {
        u64::from(self.base) <= u64::from(index) && u64::from(index) < self.end
    }
}

#[derive(Debug, Clone)]
struct Claim {
    entry: TableEntry,
    device: DeviceEntry,
}

/// Registry updates an intent makes once it compiles cleanly.
#[derive(Debug, Default)]
struct Pending {
    tunnel: Option<(u32, TunnelBinding)>,
    range: Option<(String, SelectionRange)>,
    direction: Option<((String, PortNumber, PortNumber), Direction)>,
}

/// Expands intents into ordered per-switch table entries.
///
/// Compilation is deterministic: the same topology, plan, schema and intent
/// sequence always produce the same batch.
pub struct RuleCompiler<'a> {
    topology: &'a Topology,
    plan: &'a TablePlan,
    resolver: &'a SchemaResolver,
    claims: BTreeMap<(String, EntryKey), Claim>,
    tunnels: BTreeMap<u32, TunnelBinding>,
    ranges: BTreeMap<String, Vec<SelectionRange>>,
    directions: BTreeMap<(String, PortNumber, PortNumber), Direction>,
    compiled: usize,
}

impl<'a> RuleCompiler<'a> {
    pub fn new(topology: &'a Topology, plan: &'a TablePlan, resolver: &'a SchemaResolver) -> Self {
        Self {
            topology,
            plan,
            resolver,
            claims: BTreeMap::new(),
            tunnels: BTreeMap::new(),
            ranges: BTreeMap::new(),
            directions: BTreeMap::new(),
            compiled: 0,
        }
    }

    /// Compiles every intent in order.
    ///
    /// Stops at the first failure and reports which intent caused it.
    pub fn compile_all(&mut self, intents: &[Intent]) -> Result<CompiledBatch, IntentError> {
        let mut entries = Vec::new();
        for (index, intent) in intents.iter().enumerate() {
            let compiled = self.compile(intent).map_err(|error| IntentError {
                index,
                intent: intent.clone(),
                error,
            })?;
            entries.extend(compiled);
        }

        let batch = CompiledBatch::new(entries);
        info!(
            "Compiled {} intents into {} entries across {} switches",
            intents.len(),
            batch.len(),
            batch.switches().len()
        );
        Ok(batch)
    }

    /// Compiles one intent.
    ///
    /// Returns only the entries this intent adds; entries identical to ones
    /// already compiled are dropped.
    pub fn compile(&mut self, intent: &Intent) -> Result<Vec<CompiledEntry>, CompileError> {
        let mut pending = Pending::default();
        let named = match intent {
            Intent::Tunnel(t) => self.expand_tunnel(t, &mut pending)?,
            Intent::Ecmp(e) => self.expand_ecmp(e, &mut pending)?,
            Intent::NextHop(n) => self.expand_next_hop(n)?,
            Intent::Rewrite(r) => self.expand_rewrite(r)?,
            Intent::FirewallPort(f) => self.expand_firewall(f, &mut pending)?,
            Intent::Forward(f) => self.expand_forward(f)?,
            Intent::Trace(t) => self.expand_trace(t)?,
        };

        let origin = self.compiled;
        let mut fresh: Vec<CompiledEntry> = Vec::with_capacity(named.len());
        for (switch, entry) in named {
            let device = lower(self.resolver, &entry)?;
            let key = (switch.clone(), device.key());

            let claimed = self
                .claims
                .get(&key)
                .map(|c| (&c.entry, &c.device))
                .or_else(|| {
                    fresh
                        .iter()
                        .find(|c| c.switch == switch && c.device.key() == key.1)
                        .map(|c| (&c.entry, &c.device))
                });
            match claimed {
                Some((_, existing)) if *existing == device => {
                    debug!("Skipping duplicate entry on {}: {}", switch, entry);
                    continue;
                }
                Some((existing, _)) => return Err(clash(&switch, &entry, &device, existing)),
                None => {}
            }

            fresh.push(CompiledEntry {
                switch,
                entry,
                device,
                origin,
            });
        }

        if let Some((id, binding)) = pending.tunnel {
            self.tunnels.insert(id, binding);
        }
        if let Some((switch, range)) = pending.range {
            let ranges = self.ranges.entry(switch).or_default();
            if !ranges.contains(&range) {
                ranges.push(range);
            }
        }
        if let Some((key, direction)) = pending.direction {
            self.directions.insert(key, direction);
        }
        for c in &fresh {
            self.claims.insert(
                (c.switch.clone(), c.device.key()),
                Claim {
                    entry: c.entry.clone(),
                    device: c.device.clone(),
                },
            );
            debug!("{}: {}", c.switch, c.entry);
        }
        self.compiled += 1;
        Ok(fresh)
    }

    fn switch(&self, name: &str) -> Result<&'a Switch, CompileError> {
        self.topology
            .get(name)
            .ok_or_else(|| CompileError::UnknownSwitch(name.to_string()))
    }

    fn port(&self, switch: &Switch, port: PortNumber) -> Result<(), CompileError> {
        if switch.has_port(port) {
            Ok(())
        } else {
            Err(CompileError::UnknownPort {
                switch: switch.name.clone(),
                port,
            })
        }
    }

    fn expand_tunnel(
        &self,
        t: &TunnelIntent,
        pending: &mut Pending,
    ) -> Result<Vec<(String, TableEntry)>, CompileError> {
        let ingress = self.switch(&t.ingress)?;
        let egress = self.switch(&t.egress)?;
        if ingress.name == egress.name {
            return Err(CompileError::InvalidIntent(format!(
                "tunnel {} starts and ends on {}",
                t.tunnel_id, ingress.name
            )));
        }
        self.port(ingress, t.egress_port)?;
        self.port(egress, egress.host_port)?;

        let binding = TunnelBinding {
            ingress: t.ingress.clone(),
            egress: t.egress.clone(),
            dst_ip: t.dst_ip,
            dst_mac: t.dst_mac,
        };
        if let Some(existing) = self.tunnels.get(&t.tunnel_id) {
            if *existing != binding {
                return Err(CompileError::DuplicateTunnelId {
                    tunnel_id: t.tunnel_id,
                    existing: existing.describe(),
                    requested: binding.describe(),
                });
            }
        }
        pending.tunnel = Some((t.tunnel_id, binding));

        let plan = &self.plan.tunnel;
        let route = Ipv4Prefix::host(t.dst_ip);
        let encap = TableEntry::new(&plan.lpm_table, &plan.encap_action)
            .with_match(MatchField::lpm(&plan.lpm_field, route.address(), route.prefix_len()))
            .with_param(&plan.encap_id_param, t.tunnel_id)
            .with_priority(lpm_priority(route.prefix_len()));
        let forward = TableEntry::new(&plan.tunnel_table, &plan.forward_action)
            .with_match(MatchField::exact(&plan.tunnel_field, t.tunnel_id))
            .with_param(&plan.forward_port_param, t.egress_port);
        let decap = TableEntry::new(&plan.tunnel_table, &plan.decap_action)
            .with_match(MatchField::exact(&plan.tunnel_field, t.tunnel_id))
            .with_param(&plan.decap_mac_param, t.dst_mac)
            .with_param(&plan.decap_port_param, egress.host_port);

        Ok(vec![
            (ingress.name.clone(), encap),
            (ingress.name.clone(), forward),
            (egress.name.clone(), decap),
        ])
    }

    fn expand_ecmp(
        &self,
        e: &EcmpIntent,
        pending: &mut Pending,
    ) -> Result<Vec<(String, TableEntry)>, CompileError> {
        let switch = self.switch(&e.switch)?;
        if e.count == 0 {
            return Err(CompileError::InvalidIntent(format!(
                "ecmp group {} on {} has no members",
                e.dst_prefix, e.switch
            )));
        }
        if e.end().is_none() {
            return Err(CompileError::InvalidIntent(format!(
                "ecmp range starting at {} with {} members overflows",
                e.base, e.count
            )));
        }

        let range = SelectionRange {
            base: e.base,
            end: u64::from(e.base) + u64::from(e.count),
            prefix: e.dst_prefix,
        };
        let existing = self
            .ranges
            .get(&switch.name)
            .into_iter()
            .flatten()
            .find(|r| **r != range && r.overlaps(&range));
        if let Some(existing) = existing {
            return Err(CompileError::RangeConflict {
                switch: switch.name.clone(),
                base: range.base,
                end: range.end,
                existing_base: existing.base,
                existing_end: existing.end,
            });
        }
        pending.range = Some((switch.name.clone(), range));

        let plan = &self.plan.ecmp;
        let prefix = e.dst_prefix;
        let entry = TableEntry::new(&plan.table, &plan.action)
            .with_match(MatchField::lpm(&plan.field, prefix.address(), prefix.prefix_len()))
            .with_param(&plan.base_param, e.base)
            .with_param(&plan.count_param, e.count)
            .with_priority(lpm_priority(prefix.prefix_len()));
        Ok(vec![(switch.name.clone(), entry)])
    }

    fn expand_next_hop(&self, n: &NextHopIntent) -> Result<Vec<(String, TableEntry)>, CompileError> {
        let switch = self.switch(&n.switch)?;
        self.port(switch, n.port)?;

        let covered = self
            .ranges
            .get(&switch.name)
            .is_some_and(|ranges| ranges.iter().any(|r| r.contains(n.select)));
        if !covered {
            return Err(CompileError::DanglingSelectionIndex {
                switch: switch.name.clone(),
                index: n.select,
            });
        }

        let plan = &self.plan.next_hop;
        let entry = TableEntry::new(&plan.table, &plan.action)
            .with_match(MatchField::exact(&plan.field, n.select))
            .with_param(&plan.mac_param, n.nhop_mac)
            .with_param(&plan.ip_param, n.nhop_ip)
            .with_param(&plan.port_param, n.port);
        Ok(vec![(switch.name.clone(), entry)])
    }

    fn expand_rewrite(&self, r: &RewriteIntent) -> Result<Vec<(String, TableEntry)>, CompileError> {
        let switch = self.switch(&r.switch)?;
        self.port(switch, r.egress_port)?;

        let plan = &self.plan.rewrite;
        let entry = TableEntry::new(&plan.table, &plan.action)
            .with_match(MatchField::exact(&plan.field, r.egress_port))
            .with_param(&plan.mac_param, r.smac);
        Ok(vec![(switch.name.clone(), entry)])
    }

    fn expand_firewall(
        &self,
        f: &FirewallPortIntent,
        pending: &mut Pending,
    ) -> Result<Vec<(String, TableEntry)>, CompileError> {
        let switch = self.switch(&f.switch)?;
        self.port(switch, f.ingress_port)?;
        self.port(switch, f.egress_port)?;

        let key = (switch.name.clone(), f.ingress_port, f.egress_port);
        if let Some(existing) = self.directions.get(&key) {
            if *existing != f.direction {
                return Err(CompileError::ConflictingDirection {
                    switch: switch.name.clone(),
                    ingress_port: f.ingress_port,
                    egress_port: f.egress_port,
                    existing: existing.to_string(),
                    requested: f.direction.to_string(),
                });
            }
        }
        pending.direction = Some((key, f.direction));

        let plan = &self.plan.firewall;
        let entry = TableEntry::new(&plan.table, &plan.action)
            .with_match(MatchField::exact(&plan.ingress_field, f.ingress_port))
            .with_match(MatchField::exact(&plan.egress_field, f.egress_port))
            .with_param(&plan.direction_param, f.direction.code());
        Ok(vec![(switch.name.clone(), entry)])
    }

    fn expand_forward(&self, f: &ForwardIntent) -> Result<Vec<(String, TableEntry)>, CompileError> {
        let switch = self.switch(&f.switch)?;
        self.port(switch, f.port)?;

        let plan = &self.plan.forward;
        let prefix = f.dst_prefix;
        let entry = TableEntry::new(&plan.table, &plan.action)
            .with_match(MatchField::lpm(&plan.field, prefix.address(), prefix.prefix_len()))
            .with_param(&plan.mac_param, f.dst_mac)
            .with_param(&plan.port_param, f.port)
            .with_priority(lpm_priority(prefix.prefix_len()));
        Ok(vec![(switch.name.clone(), entry)])
    }

    fn expand_trace(&self, t: &TraceIntent) -> Result<Vec<(String, TableEntry)>, CompileError> {
        let switch = self.switch(&t.switch)?;

        let plan = &self.plan.trace;
        let entry = TableEntry::new(&plan.table, &plan.action).with_param(&plan.swid_param, t.swid);
        Ok(vec![(switch.name.clone(), entry)])
    }
}

/// Error for an entry whose key is already taken by a different entry.
fn clash(switch: &str, entry: &TableEntry, device: &DeviceEntry, existing: &TableEntry) -> CompileError {
    let is_route = device
        .matches
        .iter()
        .any(|m| matches!(m.value, MatchValue::Lpm { .. }));
    let prefix = entry
        .matches
        .iter()
        .find_map(|m| m.prefix_len.map(|len| format!("{}/{}", m.value, len)));

    match prefix {
        Some(prefix) if is_route => CompileError::DuplicateRoute {
            switch: switch.to_string(),
            table: entry.table.clone(),
            prefix,
        },
        _ => CompileError::ConflictingEntry {
            switch: switch.to_string(),
            entry: entry.to_string(),
            existing: existing.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TUTORIAL: &str = include_str!("../../tests/fixtures/tutorial.p4info.json");

    fn resolver() -> SchemaResolver {
        SchemaResolver::from_json(TUTORIAL).unwrap()
    }

    fn topology() -> Topology {
        Topology::new(vec![
            Switch::new("s1", "127.0.0.1:50051", 0).with_ports([1, 2, 3]),
            Switch::new("s2", "127.0.0.1:50052", 1).with_ports([1, 2, 3]),
            Switch::new("s3", "127.0.0.1:50053", 2),
        ])
        .unwrap()
    }

    fn intents(yaml: &str) -> Vec<Intent> {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn tunnel(tunnel_id: u32, dst_ip: &str, egress_port: PortNumber) -> Intent {
        Intent::Tunnel(TunnelIntent {
            ingress: "s1".to_string(),
            egress: "s2".to_string(),
            tunnel_id,
            dst_mac: "08:00:00:00:02:22".parse().unwrap(),
            dst_ip: dst_ip.parse().unwrap(),
            egress_port,
        })
    }

    fn rendered(batch: &CompiledBatch) -> Vec<String> {
        batch
            .iter()
            .map(|c| format!("{}: {}", c.switch, c.entry))
            .collect()
    }

    #[test]
    fn test_tunnel_expands_to_three_entries() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);

        let batch = compiler
            .compile_all(&intents(
                r#"
- { kind: tunnel, ingress: s1, egress: s2, tunnel_id: 100, dst_mac: "08:00:00:00:02:22", dst_ip: 10.0.2.2, egress_port: 2 }
"#,
            ))
            .unwrap();

        assert_eq!(
            rendered(&batch),
            vec![
                "s1: MyIngress.ipv4_lpm [hdr.ipv4.dstAddr=10.0.2.2/32] -> MyIngress.myTunnel_ingress(dst_id=100) priority 33",
                "s1: MyIngress.myTunnel_exact [hdr.myTunnel.dst_id=100] -> MyIngress.myTunnel_forward(port=2)",
                "s2: MyIngress.myTunnel_exact [hdr.myTunnel.dst_id=100] -> MyIngress.myTunnel_egress(dstAddr=08:00:00:00:02:22, port=1)",
            ]
        );
        assert_eq!(batch.entries()[0].device.priority, Some(33));
        assert!(batch.iter().all(|c| c.origin == 0));
        assert_eq!(batch.switches(), vec!["s1", "s2"]);
    }

    #[test]
    fn test_tunnel_field_order_irrelevant() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());

        let ordered = RuleCompiler::new(&topo, &plan, &schema)
            .compile_all(&intents(
                r#"
- { kind: tunnel, ingress: s1, egress: s2, tunnel_id: 100, dst_mac: "08:00:00:00:02:22", dst_ip: 10.0.2.2, egress_port: 2 }
"#,
            ))
            .unwrap();
        let shuffled = RuleCompiler::new(&topo, &plan, &schema)
            .compile_all(&intents(
                r#"
- egress_port: 2
  dst_ip: 10.0.2.2
  egress: s2
  tunnel_id: 100
  kind: tunnel
  dst_mac: "08:00:00:00:02:22"
  ingress: s1
"#,
            ))
            .unwrap();

        assert_eq!(shuffled, ordered);
        assert_eq!(shuffled.len(), 3);
    }

    #[test]
    fn test_tunnel_host_port_must_exist() {
        let topo = Topology::new(vec![
            Switch::new("s1", "127.0.0.1:50051", 0).with_ports([1, 2, 3]),
            Switch::new("s2", "127.0.0.1:50052", 1).with_ports([2, 3]),
        ])
        .unwrap();
        let (plan, schema) = (TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);

        let err = compiler.compile_all(&[tunnel(100, "10.0.2.2", 2)]).unwrap_err();
        assert!(matches!(
            err.error,
            CompileError::UnknownPort { ref switch, port: 1 } if switch == "s2"
        ));

        // A declared host port is accepted.
        let topo = Topology::new(vec![
            Switch::new("s1", "127.0.0.1:50051", 0).with_ports([1, 2, 3]),
            Switch::new("s2", "127.0.0.1:50052", 1).with_ports([2, 3]).with_host_port(3),
        ])
        .unwrap();
        let batch = RuleCompiler::new(&topo, &plan, &schema)
            .compile_all(&[tunnel(100, "10.0.2.2", 2)])
            .unwrap();
        assert_eq!(
            batch.entries()[2].entry.to_string(),
            "MyIngress.myTunnel_exact [hdr.myTunnel.dst_id=100] -> MyIngress.myTunnel_egress(dstAddr=08:00:00:00:02:22, port=3)"
        );
    }

    #[test]
    fn test_tunnel_same_switch_rejected() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let err = compiler
            .compile_all(&intents(
                r#"
- { kind: tunnel, ingress: s1, egress: s1, tunnel_id: 100, dst_mac: "08:00:00:00:01:11", dst_ip: 10.0.1.1, egress_port: 1 }
"#,
            ))
            .unwrap_err();
        assert!(matches!(err.error, CompileError::InvalidIntent(_)));
    }

    #[test]
    fn test_duplicate_tunnel_id() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let err = compiler
            .compile_all(&intents(
                r#"
- { kind: tunnel, ingress: s1, egress: s2, tunnel_id: 100, dst_mac: "08:00:00:00:02:22", dst_ip: 10.0.2.2, egress_port: 2 }
- { kind: tunnel, ingress: s2, egress: s1, tunnel_id: 100, dst_mac: "08:00:00:00:01:11", dst_ip: 10.0.1.1, egress_port: 2 }
"#,
            ))
            .unwrap_err();

        assert_eq!(err.index, 1);
        assert!(matches!(err.error, CompileError::DuplicateTunnelId { tunnel_id: 100, .. }));
    }

    #[test]
    fn test_identical_intents_deduplicated() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let batch = compiler
            .compile_all(&intents(
                r#"
- { kind: forward, switch: s1, dst_prefix: 10.0.1.0/24, dst_mac: "08:00:00:00:01:11", port: 1 }
- { kind: forward, switch: s1, dst_prefix: 10.0.1.0/24, dst_mac: "08:00:00:00:01:11", port: 1 }
- { kind: tunnel, ingress: s1, egress: s2, tunnel_id: 100, dst_mac: "08:00:00:00:02:22", dst_ip: 10.0.2.2, egress_port: 2 }
- { kind: tunnel, ingress: s1, egress: s2, tunnel_id: 100, dst_mac: "08:00:00:00:02:22", dst_ip: 10.0.2.2, egress_port: 2 }
"#,
            ))
            .unwrap();
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn test_duplicate_route() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let err = compiler
            .compile_all(&intents(
                r#"
- { kind: forward, switch: s1, dst_prefix: 10.0.1.0/24, dst_mac: "08:00:00:00:01:11", port: 1 }
- { kind: forward, switch: s1, dst_prefix: 10.0.1.7/24, dst_mac: "08:00:00:00:01:11", port: 3 }
"#,
            ))
            .unwrap_err();

        assert_eq!(err.index, 1);
        match err.error {
            CompileError::DuplicateRoute { switch, prefix, .. } => {
                assert_eq!(switch, "s1");
                assert_eq!(prefix, "10.0.1.0/24");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_forward_clashes_with_tunnel_route() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let err = compiler
            .compile_all(&intents(
                r#"
- { kind: tunnel, ingress: s1, egress: s2, tunnel_id: 100, dst_mac: "08:00:00:00:02:22", dst_ip: 10.0.2.2, egress_port: 2 }
- { kind: forward, switch: s1, dst_prefix: 10.0.2.2/32, dst_mac: "08:00:00:00:02:22", port: 2 }
"#,
            ))
            .unwrap_err();
        assert!(matches!(err.error, CompileError::DuplicateRoute { .. }));
    }

    #[test]
    fn test_lpm_priority_orders_prefixes() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let batch = compiler
            .compile_all(&intents(
                r#"
- { kind: forward, switch: s1, dst_prefix: 0.0.0.0/0, dst_mac: "08:00:00:00:01:00", port: 3 }
- { kind: forward, switch: s1, dst_prefix: 10.0.0.0/8, dst_mac: "08:00:00:00:01:08", port: 2 }
- { kind: forward, switch: s1, dst_prefix: 10.0.1.1/32, dst_mac: "08:00:00:00:01:11", port: 1 }
"#,
            ))
            .unwrap();

        let priorities: Vec<Option<i32>> = batch.iter().map(|c| c.device.priority).collect();
        assert_eq!(priorities, vec![Some(1), Some(9), Some(33)]);
    }

    #[test]
    fn test_ecmp_ranges() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());

        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let err = compiler
            .compile_all(&intents(
                r#"
- { kind: ecmp, switch: s1, dst_prefix: 10.0.0.1/32, base: 0, count: 2 }
- { kind: ecmp, switch: s1, dst_prefix: 10.0.0.2/32, base: 1, count: 1 }
"#,
            ))
            .unwrap_err();
        assert!(matches!(
            err.error,
            CompileError::RangeConflict {
                base: 1,
                end: 2,
                existing_base: 0,
                existing_end: 2,
                ..
            }
        ));

        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let batch = compiler
            .compile_all(&intents(
                r#"
- { kind: ecmp, switch: s1, dst_prefix: 10.0.0.1/32, base: 0, count: 2 }
- { kind: ecmp, switch: s1, dst_prefix: 10.0.0.2/32, base: 2, count: 1 }
- { kind: ecmp, switch: s2, dst_prefix: 10.0.0.1/32, base: 0, count: 2 }
"#,
            ))
            .unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_ecmp_zero_count() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let err = compiler
            .compile_all(&intents(
                "- { kind: ecmp, switch: s1, dst_prefix: 10.0.0.1/32, base: 0, count: 0 }",
            ))
            .unwrap_err();
        assert!(matches!(err.error, CompileError::InvalidIntent(_)));
    }

    #[test]
    fn test_next_hop_needs_range() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let err = compiler
            .compile_all(&intents(
                r#"
- { kind: ecmp, switch: s1, dst_prefix: 10.0.0.1/32, base: 0, count: 2 }
- { kind: next_hop, switch: s1, select: 0, nhop_mac: "00:00:00:00:01:02", nhop_ip: 10.0.2.2, port: 2 }
- { kind: next_hop, switch: s1, select: 1, nhop_mac: "00:00:00:00:01:03", nhop_ip: 10.0.3.3, port: 3 }
- { kind: next_hop, switch: s1, select: 2, nhop_mac: "00:00:00:00:01:03", nhop_ip: 10.0.3.3, port: 3 }
"#,
            ))
            .unwrap_err();

        assert_eq!(err.index, 3);
        assert!(matches!(
            err.error,
            CompileError::DanglingSelectionIndex { index: 2, .. }
        ));
    }

    #[test]
    fn test_load_balance_group() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let batch = compiler
            .compile_all(&intents(
                r#"
- { kind: ecmp, switch: s1, dst_prefix: 10.0.0.1/32, base: 0, count: 2 }
- { kind: next_hop, switch: s1, select: 0, nhop_mac: "00:00:00:00:01:02", nhop_ip: 10.0.2.2, port: 2 }
- { kind: next_hop, switch: s1, select: 1, nhop_mac: "00:00:00:00:01:03", nhop_ip: 10.0.3.3, port: 3 }
- { kind: rewrite, switch: s1, egress_port: 2, smac: "00:00:00:01:02:00" }
"#,
            ))
            .unwrap();

        assert_eq!(
            rendered(&batch),
            vec![
                "s1: MyIngress.ecmp_group [hdr.ipv4.dstAddr=10.0.0.1/32] -> MyIngress.set_ecmp_select(ecmp_base=0, ecmp_count=2) priority 33",
                "s1: MyIngress.ecmp_nhop [meta.ecmp_select=0] -> MyIngress.set_nhop(nhop_dmac=00:00:00:00:01:02, nhop_ipv4=10.0.2.2, port=2)",
                "s1: MyIngress.ecmp_nhop [meta.ecmp_select=1] -> MyIngress.set_nhop(nhop_dmac=00:00:00:00:01:03, nhop_ipv4=10.0.3.3, port=3)",
                "s1: MyEgress.send_frame [standard_metadata.egress_port=2] -> MyEgress.rewrite_mac(smac=00:00:00:01:02:00)",
            ]
        );
        let origins: Vec<usize> = batch.iter().map(|c| c.origin).collect();
        assert_eq!(origins, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_firewall_directions() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let batch = compiler
            .compile_all(&intents(
                r#"
- { kind: firewall_port, switch: s1, ingress_port: 1, egress_port: 3, direction: outbound }
- { kind: firewall_port, switch: s1, ingress_port: 3, egress_port: 1, direction: inbound }
"#,
            ))
            .unwrap();
        let dirs: Vec<Vec<u8>> = batch
            .iter()
            .map(|c| c.device.action.params[0].value.clone())
            .collect();
        assert_eq!(dirs, vec![vec![0], vec![1]]);

        let err = compiler
            .compile(&Intent::FirewallPort(FirewallPortIntent {
                switch: "s1".to_string(),
                ingress_port: 1,
                egress_port: 3,
                direction: Direction::Inbound,
            }))
            .unwrap_err();
        assert!(matches!(err, CompileError::ConflictingDirection { .. }));
    }

    #[test]
    fn test_trace_default_action() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        let batch = compiler
            .compile_all(&intents("- { kind: trace, switch: s3, swid: 3 }"))
            .unwrap();
        let entry = &batch.entries()[0];
        assert!(entry.device.is_default_action);
        assert!(entry.device.matches.is_empty());
        assert_eq!(entry.device.action.params[0].value, vec![0, 0, 0, 3]);

        let err = compiler
            .compile(&Intent::Trace(TraceIntent {
                switch: "s3".to_string(),
                swid: 4,
            }))
            .unwrap_err();
        assert!(matches!(err, CompileError::ConflictingEntry { .. }));
    }

    #[test]
    fn test_conflicting_tunnel_port() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);
        compiler.compile(&tunnel(100, "10.0.2.2", 2)).unwrap();
        let err = compiler.compile(&tunnel(100, "10.0.2.2", 3)).unwrap_err();
        assert!(matches!(err, CompileError::ConflictingEntry { .. }));
    }

    #[test]
    fn test_unknown_switch_and_port() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);

        let err = compiler
            .compile_all(&intents("- { kind: trace, switch: s9, swid: 9 }"))
            .unwrap_err();
        assert!(matches!(err.error, CompileError::UnknownSwitch(ref name) if name == "s9"));
        assert_eq!(err.to_string(), "intent #0 (trace swid 9 on s9): unknown switch: s9");

        let err = compiler
            .compile_all(&intents(
                r#"- { kind: rewrite, switch: s1, egress_port: 7, smac: "00:00:00:01:02:00" }"#,
            ))
            .unwrap_err();
        assert!(matches!(err.error, CompileError::UnknownPort { port: 7, .. }));
    }

    #[test]
    fn test_failed_intent_leaves_state_untouched() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);

        // The 16-bit tunnel id field cannot hold 70000.
        assert!(matches!(
            compiler.compile(&tunnel(70000, "10.0.2.2", 2)),
            Err(CompileError::InvalidValue { .. })
        ));

        let entries = compiler.compile(&tunnel(200, "10.0.2.3", 2)).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].origin, 0);

        // The same route may now be claimed again by a fresh tunnel id.
        assert!(compiler.compile(&tunnel(300, "10.0.2.2", 2)).is_ok());
    }

    #[test]
    fn test_plan_overrides_with_aliases() {
        let (topo, schema) = (topology(), resolver());
        let mut plan = TablePlan::default();
        plan.forward.table = "ipv4_lpm".to_string();
        plan.forward.action = "ipv4_forward".to_string();
        let mut compiler = RuleCompiler::new(&topo, &plan, &schema);

        let batch = compiler
            .compile_all(&intents(
                r#"- { kind: forward, switch: s1, dst_prefix: 10.0.1.1/32, dst_mac: "08:00:00:00:01:11", port: 1 }"#,
            ))
            .unwrap();
        assert_eq!(batch.entries()[0].device.table_id.as_raw(), 37375156);
    }

    #[test]
    fn test_deterministic() {
        let (topo, plan, schema) = (topology(), TablePlan::default(), resolver());
        let input = intents(
            r#"
- { kind: tunnel, ingress: s1, egress: s2, tunnel_id: 100, dst_mac: "08:00:00:00:02:22", dst_ip: 10.0.2.2, egress_port: 2 }
- { kind: tunnel, ingress: s2, egress: s1, tunnel_id: 101, dst_mac: "08:00:00:00:01:11", dst_ip: 10.0.1.1, egress_port: 2 }
- { kind: trace, switch: s1, swid: 1 }
"#,
        );
        let first = RuleCompiler::new(&topo, &plan, &schema).compile_all(&input).unwrap();
        let second = RuleCompiler::new(&topo, &plan, &schema).compile_all(&input).unwrap();
        assert_eq!(first, second);
    }
}
