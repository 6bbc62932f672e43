//! Huawei VRP adapter.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use super::{AdapterSpec, MacFormat, Vendor, VendorAdapter, actions};

static SPEC: AdapterSpec = AdapterSpec {
    vendor: Vendor::Huawei,
    commands: &[
        (actions::GET_VERSION, "display version"),
        (actions::GET_INTERFACES, "display interface brief"),
        (actions::GET_INTERFACE_DETAIL, "display interface {interface}"),
        (actions::GET_MAC_TABLE, "display mac-address"),
        (actions::GET_ARP_TABLE, "display arp all"),
        (actions::GET_VLAN, "display vlan"),
        (actions::GET_VLAN_DETAIL, "display vlan {vlan_id}"),
        (
            actions::FIND_MAC,
            "display mac-address | include {mac_address}",
        ),
        (actions::FIND_ARP, "display arp | include {ip_address}"),
        (actions::SHOW_RUNNING, "display current-configuration"),
        (actions::SHOW_STARTUP, "display saved-configuration"),
        (actions::PING, "ping {target}"),
        (actions::TRACEROUTE, "tracert {target}"),
        (actions::SAVE_CONFIG, "save"),
    ],
    required_params: &[
        (actions::GET_INTERFACE_DETAIL, &["interface"]),
        (actions::GET_VLAN_DETAIL, &["vlan_id"]),
        (actions::FIND_MAC, &["mac_address"]),
        (actions::FIND_ARP, &["ip_address"]),
        (actions::PING, &["target"]),
        (actions::TRACEROUTE, &["target"]),
    ],
    connection_extras: &["screen-length 0 temporary", "undo terminal monitor"],
    mac_format: MacFormat::Hyphenated,
    fallback_parsers: &[
        (actions::GET_VERSION, parse_version),
        (actions::GET_INTERFACES, parse_interfaces),
        (actions::GET_MAC_TABLE, parse_mac_rows),
        (actions::FIND_MAC, parse_mac_rows),
        (actions::PING, parse_ping),
    ],
};

/// Adapter for Huawei VRP switches and routers.
pub struct HuaweiAdapter;

impl VendorAdapter for HuaweiAdapter {
    fn spec(&self) -> &'static AdapterSpec {
        &SPEC
    }
}

static VRP_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"VRP \(R\) software, Version ([\d.]+) \((.+?)\)").expect("static pattern")
});
static UPTIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)uptime is (.*)").expect("static pattern"));
static INTERFACE_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<interface>\S+)\s+(?P<phy>\*?(?:down|up))\s+(?P<protocol>\*?(?:down|up))\s+.*")
        .expect("static pattern")
});
static PACKET_LOSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d.]+)% packet loss").expect("static pattern"));

fn parse_version(output: &str) -> Option<Value> {
    let mut info = serde_json::Map::new();
    if let Some(m) = VRP_VERSION_RE.captures(output) {
        info.insert("vrp_version".into(), json!(&m[1]));
        info.insert("full_version".into(), json!(&m[2]));
    }
    if let Some(m) = UPTIME_RE.captures(output) {
        info.insert("uptime".into(), json!(m[1].trim()));
    }
    (!info.is_empty()).then(|| Value::Object(info))
}

fn parse_interfaces(output: &str) -> Option<Value> {
    let mut rows = Vec::new();
    for line in output.trim().lines() {
        if let Some(captures) = INTERFACE_ROW_RE.captures(line) {
            rows.push(json!({
                "interface": &captures["interface"],
                "phy": &captures["phy"],
                "protocol": &captures["protocol"],
            }));
        }
    }
    (!rows.is_empty()).then(|| Value::Array(rows))
}

/// VRP MAC table rows share the Comware column layout.
fn parse_mac_rows(output: &str) -> Option<Value> {
    let mut rows = Vec::new();
    for line in output.trim().lines() {
        let line = line.trim();
        if line.is_empty() || line.contains("MAC") || line.contains("---") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 4 {
            rows.push(json!({
                "mac": parts[0],
                "vlan": parts[1],
                "status": parts[2],
                "interface": parts[3],
            }));
        }
    }
    (!rows.is_empty()).then(|| Value::Array(rows))
}

fn parse_ping(output: &str) -> Option<Value> {
    let mut info = serde_json::Map::new();
    if let Some(m) = PACKET_LOSS_RE.captures(output) {
        let loss: f64 = m[1].parse().unwrap_or(100.0);
        info.insert("packet_loss".into(), json!(m[1].to_string()));
        info.insert(
            "success_rate".into(),
            json!(format!("{}", 100.0 - loss)),
        );
    }
    (!info.is_empty()).then(|| Value::Object(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ActionParams, ParseMethod};

    #[test]
    fn find_mac_command_uses_hyphenated_dialect() {
        let mut params = ActionParams::new();
        params.insert("mac_address".to_string(), "AA-BB-CC-DD-EE-FF".to_string());
        let command = HuaweiAdapter
            .get_command(actions::FIND_MAC, &params)
            .expect("render find_mac");
        assert_eq!(command, "display mac-address | include aabb-ccdd-eeff");
    }

    #[test]
    fn arp_table_command_targets_all_entries() {
        let command = HuaweiAdapter
            .get_command(actions::GET_ARP_TABLE, &ActionParams::new())
            .expect("render arp");
        assert_eq!(command, "display arp all");
    }

    #[test]
    fn vrp_version_fields_are_extracted() {
        let output = "\
Huawei Versatile Routing Platform Software
VRP (R) software, Version 8.191 (CE6850 V200R019C10SPC800)
Huawei CE6850-48S6Q-HI Switch uptime is 2 weeks, 4 days, 21 hours, 3 minutes
";
        let result = HuaweiAdapter.parse_output(actions::GET_VERSION, output);
        assert_eq!(result.method, Some(ParseMethod::Fallback));
        let parsed = result.parsed.expect("version fields");
        assert_eq!(parsed["vrp_version"], "8.191");
        assert_eq!(parsed["full_version"], "CE6850 V200R019C10SPC800");
        assert_eq!(parsed["uptime"], "2 weeks, 4 days, 21 hours, 3 minutes");
    }

    #[test]
    fn interface_brief_prefers_template_parse() {
        let output = "\
PHY: Physical state, Protocol: Link-layer state
Interface                   PHY   Protocol  InUti/OutUti   inErrors/outErrors
Eth-Trunk1                  up    up        0.01%/0.01%          0/0
GigabitEthernet0/0/0        down  down         0%/0%             0/0
";
        let result = HuaweiAdapter.parse_output(actions::GET_INTERFACES, output);
        assert_eq!(result.method, Some(ParseMethod::Template));
        let rows = result.parsed.expect("rows");
        assert_eq!(rows[0]["interface"], "Eth-Trunk1");
        assert_eq!(rows[1]["phy"], "down");
    }
}
