//! Operator intents.
//!
//! Intents are immutable values supplied by the caller (usually loaded from
//! the topology file) before anything is installed. In YAML each intent is a
//! map tagged with `kind`.

use p4ctl_types::{Ipv4Address, Ipv4Prefix, MacAddress, PortNumber};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic direction tag written by the firewall port check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    /// Value of the one-bit `dir` action parameter.
    pub const fn code(&self) -> u64 {
        match self {
            Direction::Outbound => 0,
            Direction::Inbound => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => write!(f, "outbound"),
            Direction::Inbound => write!(f, "inbound"),
        }
    }
}

/// Tunnel traffic for one host from an ingress switch to an egress switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelIntent {
    pub ingress: String,
    pub egress: String,
    pub tunnel_id: u32,
    pub dst_mac: MacAddress,
    pub dst_ip: Ipv4Address,
    /// Port on the ingress switch toward the next hop.
    pub egress_port: PortNumber,
}

/// Spread a destination prefix over the selection range `[base, base + count)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcmpIntent {
    pub switch: String,
    pub dst_prefix: Ipv4Prefix,
    pub base: u32,
    pub count: u32,
}

impl EcmpIntent {
    /// Exclusive end of the selection range, `None` on overflow.
    pub fn end(&self) -> Option<u32> {
        self.base.checked_add(self.count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopIntent {
    pub switch: String,
    /// Selection index produced by the ECMP hash.
    pub select: u32,
    pub nhop_mac: MacAddress,
    pub nhop_ip: Ipv4Address,
    pub port: PortNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteIntent {
    pub switch: String,
    pub egress_port: PortNumber,
    pub smac: MacAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallPortIntent {
    pub switch: String,
    pub ingress_port: PortNumber,
    pub egress_port: PortNumber,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardIntent {
    pub switch: String,
    pub dst_prefix: Ipv4Prefix,
    pub dst_mac: MacAddress,
    pub port: PortNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceIntent {
    pub switch: String,
    pub swid: u32,
}

/// A high-level forwarding intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    Tunnel(TunnelIntent),
    Ecmp(EcmpIntent),
    NextHop(NextHopIntent),
    Rewrite(RewriteIntent),
    FirewallPort(FirewallPortIntent),
    Forward(ForwardIntent),
    Trace(TraceIntent),
}

impl Intent {
    /// Switches this intent writes to.
    pub fn switches(&self) -> Vec<&str> {
        match self {
            Intent::Tunnel(t) => vec![t.ingress.as_str(), t.egress.as_str()],
            Intent::Ecmp(i) => vec![i.switch.as_str()],
            Intent::NextHop(i) => vec![i.switch.as_str()],
            Intent::Rewrite(i) => vec![i.switch.as_str()],
            Intent::FirewallPort(i) => vec![i.switch.as_str()],
            Intent::Forward(i) => vec![i.switch.as_str()],
            Intent::Trace(i) => vec![i.switch.as_str()],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Tunnel(_) => "tunnel",
            Intent::Ecmp(_) => "ecmp",
            Intent::NextHop(_) => "next_hop",
            Intent::Rewrite(_) => "rewrite",
            Intent::FirewallPort(_) => "firewall_port",
            Intent::Forward(_) => "forward",
            Intent::Trace(_) => "trace",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Tunnel(t) => write!(
                f,
                "tunnel {} {} -> {} to {} ({})",
                t.tunnel_id, t.ingress, t.egress, t.dst_ip, t.dst_mac
            ),
            Intent::Ecmp(i) => write!(
                f,
                "ecmp {} on {} over [{}, {})",
                i.dst_prefix,
                i.switch,
                i.base,
                u64::from(i.base) + u64::from(i.count)
            ),
            Intent::NextHop(i) => write!(
                f,
                "next_hop {} on {} via {} ({}) port {}",
                i.select, i.switch, i.nhop_ip, i.nhop_mac, i.port
            ),
            Intent::Rewrite(i) => write!(
                f,
                "rewrite port {} on {} to {}",
                i.egress_port, i.switch, i.smac
            ),
            Intent::FirewallPort(i) => write!(
                f,
                "firewall_port {} -> {} on {} is {}",
                i.ingress_port, i.egress_port, i.switch, i.direction
            ),
            Intent::Forward(i) => write!(
                f,
                "forward {} on {} to {} port {}",
                i.dst_prefix, i.switch, i.dst_mac, i.port
            ),
            Intent::Trace(i) => write!(f, "trace swid {} on {}", i.swid, i.switch),
        }
    }
}
