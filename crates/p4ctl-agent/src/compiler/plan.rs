//! Table plan: which P4 objects each intent kind compiles against.
//!
//! Defaults follow the P4 tutorial programs (`basic_tunnel`, `mri`,
//! `load_balance`, `firewall`). Any name can be overridden from the `tables`
//! section of the config file; names may be fully qualified or aliases.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelPlan {
    pub lpm_table: String,
    pub lpm_field: String,
    pub encap_action: String,
    pub encap_id_param: String,
    pub tunnel_table: String,
    pub tunnel_field: String,
    pub forward_action: String,
    pub forward_port_param: String,
    pub decap_action: String,
    pub decap_mac_param: String,
    pub decap_port_param: String,
}

impl Default for TunnelPlan {
    fn default() -> Self {
        Self {
            lpm_table: "MyIngress.ipv4_lpm".to_string(),
            lpm_field: "hdr.ipv4.dstAddr".to_string(),
            encap_action: "MyIngress.myTunnel_ingress".to_string(),
            encap_id_param: "dst_id".to_string(),
            tunnel_table: "MyIngress.myTunnel_exact".to_string(),
            tunnel_field: "hdr.myTunnel.dst_id".to_string(),
            forward_action: "MyIngress.myTunnel_forward".to_string(),
            forward_port_param: "port".to_string(),
            decap_action: "MyIngress.myTunnel_egress".to_string(),
            decap_mac_param: "dstAddr".to_string(),
            decap_port_param: "port".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcmpPlan {
    pub table: String,
    pub field: String,
    pub action: String,
    pub base_param: String,
    pub count_param: String,
}

impl Default for EcmpPlan {
    fn default() -> Self {
        Self {
            table: "MyIngress.ecmp_group".to_string(),
            field: "hdr.ipv4.dstAddr".to_string(),
            action: "MyIngress.set_ecmp_select".to_string(),
            base_param: "ecmp_base".to_string(),
            count_param: "ecmp_count".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NextHopPlan {
    pub table: String,
    pub field: String,
    pub action: String,
    pub mac_param: String,
    pub ip_param: String,
    pub port_param: String,
}

impl Default for NextHopPlan {
    fn default() -> Self {
        Self {
            table: "MyIngress.ecmp_nhop".to_string(),
            field: "meta.ecmp_select".to_string(),
            action: "MyIngress.set_nhop".to_string(),
            mac_param: "nhop_dmac".to_string(),
            ip_param: "nhop_ipv4".to_string(),
            port_param: "port".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewritePlan {
    pub table: String,
    pub field: String,
    pub action: String,
    pub mac_param: String,
}

impl Default for RewritePlan {
    fn default() -> Self {
        Self {
            table: "MyEgress.send_frame".to_string(),
            field: "standard_metadata.egress_port".to_string(),
            action: "MyEgress.rewrite_mac".to_string(),
            mac_param: "smac".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallPlan {
    pub table: String,
    pub ingress_field: String,
    pub egress_field: String,
    pub action: String,
    pub direction_param: String,
}

impl Default for FirewallPlan {
    fn default() -> Self {
        Self {
            table: "MyIngress.check_ports".to_string(),
            ingress_field: "standard_metadata.ingress_port".to_string(),
            egress_field: "standard_metadata.egress_spec".to_string(),
            action: "MyIngress.set_direction".to_string(),
            direction_param: "dir".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardPlan {
    pub table: String,
    pub field: String,
    pub action: String,
    pub mac_param: String,
    pub port_param: String,
}

impl Default for ForwardPlan {
    fn default() -> Self {
        Self {
            table: "MyIngress.ipv4_lpm".to_string(),
            field: "hdr.ipv4.dstAddr".to_string(),
            action: "MyIngress.ipv4_forward".to_string(),
            mac_param: "dstAddr".to_string(),
            port_param: "port".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracePlan {
    pub table: String,
    pub action: String,
    pub swid_param: String,
}

impl Default for TracePlan {
    fn default() -> Self {
        Self {
            table: "MyEgress.swtrace".to_string(),
            action: "MyEgress.add_swtrace".to_string(),
            swid_param: "swid".to_string(),
        }
    }
}

/// Object names for every intent kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablePlan {
    pub tunnel: TunnelPlan,
    pub ecmp: EcmpPlan,
    pub next_hop: NextHopPlan,
    pub rewrite: RewritePlan,
    pub firewall: FirewallPlan,
    pub forward: ForwardPlan,
    pub trace: TracePlan,
}
