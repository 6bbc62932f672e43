//! H3C Comware adapter.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use super::{AdapterSpec, MacFormat, Vendor, VendorAdapter, actions};

static SPEC: AdapterSpec = AdapterSpec {
    vendor: Vendor::H3c,
    commands: &[
        (actions::GET_VERSION, "display version"),
        (actions::GET_INTERFACES, "display interface brief"),
        (actions::GET_INTERFACE_DETAIL, "display interface {interface}"),
        (actions::GET_MAC_TABLE, "display mac-address"),
        (actions::GET_ARP_TABLE, "display arp"),
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
    connection_extras: &["screen-length disable", "undo terminal monitor"],
    mac_format: MacFormat::Hyphenated,
    fallback_parsers: &[
        (actions::GET_VERSION, parse_version),
        (actions::GET_INTERFACES, parse_interfaces),
        (actions::GET_INTERFACE_DETAIL, parse_interface_detail),
        (actions::GET_MAC_TABLE, parse_mac_rows),
        (actions::FIND_MAC, parse_mac_rows),
        (actions::FIND_ARP, parse_arp_rows),
        (actions::GET_ARP_TABLE, parse_arp_rows),
        (actions::GET_VLAN, parse_vlans),
        (actions::PING, parse_ping),
    ],
};

/// Adapter for H3C Comware switches, routers and firewalls.
pub struct H3cAdapter;

impl VendorAdapter for H3cAdapter {
    fn spec(&self) -> &'static AdapterSpec {
        &SPEC
    }
}

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"H3C Comware Software, Version (.+)").expect("static pattern"));
static MODEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"H3C (.+?) uptime").expect("static pattern"));
static SERIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Device serial number : (.+)").expect("static pattern"));
static UPTIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"uptime is (.+)").expect("static pattern"));
static HW_ADDR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Hardware address is (.+)").expect("static pattern"));
static IP_PROCESSING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Internet protocol processing : (.+)").expect("static pattern"));
static PACKET_LOSS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)% packet loss").expect("static pattern"));
static PING_STATS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+) packets? transmitted, (\d+) received").expect("static pattern"));

fn parse_version(output: &str) -> Option<Value> {
    let mut info = serde_json::Map::new();
    if let Some(m) = VERSION_RE.captures(output) {
        info.insert("version".into(), json!(m[1].trim()));
    }
    if let Some(m) = MODEL_RE.captures(output) {
        info.insert("device_model".into(), json!(m[1].trim()));
    }
    if let Some(m) = SERIAL_RE.captures(output) {
        info.insert("serial_number".into(), json!(m[1].trim()));
    }
    if let Some(m) = UPTIME_RE.captures(output) {
        info.insert("uptime".into(), json!(m[1].trim()));
    }
    (!info.is_empty()).then(|| Value::Object(info))
}

fn parse_interfaces(output: &str) -> Option<Value> {
    let mut rows = Vec::new();
    for line in output.trim().lines() {
        if line.contains("Interface") || line.contains("---") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 3 {
            rows.push(json!({
                "interface": parts[0],
                "link": parts[1],
                "protocol": parts[2],
                "ip_address": parts.get(3).copied(),
            }));
        }
    }
    (!rows.is_empty()).then(|| Value::Array(rows))
}

fn parse_interface_detail(output: &str) -> Option<Value> {
    let mut info = serde_json::Map::new();
    let status = if output.contains("line protocol current state : UP")
        || output.contains("line protocol is up")
    {
        "up"
    } else if output.contains("line protocol current state : DOWN")
        || output.contains("line protocol is down")
    {
        "down"
    } else {
        "unknown"
    };
    info.insert("status".into(), json!(status));
    if let Some(m) = HW_ADDR_RE.captures(output) {
        info.insert("mac_address".into(), json!(m[1].trim()));
    }
    if let Some(m) = IP_PROCESSING_RE.captures(output) {
        info.insert("ip_info".into(), json!(m[1].trim()));
    }
    Some(Value::Object(info))
}

/// Comware MAC table rows: MAC, VLAN, state, port.
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

fn parse_arp_rows(output: &str) -> Option<Value> {
    let mut rows = Vec::new();
    for line in output.trim().lines() {
        let line = line.trim();
        if line.is_empty()
            || line.contains("Internet")
            || line.contains("IP Address")
            || line.contains("Type:")
            || line.contains("---")
        {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 4 {
            rows.push(json!({
                "ip": parts[0],
                "mac": parts[1],
                "vlan": parts[2],
                "interface": parts[3],
            }));
        }
    }
    (!rows.is_empty()).then(|| Value::Array(rows))
}

fn parse_vlans(output: &str) -> Option<Value> {
    let mut rows = Vec::new();
    for line in output.trim().lines() {
        if line.contains("VLAN") || line.contains("---") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 2 {
            rows.push(json!({
                "vlan_id": parts[0],
                "name": parts[1],
                "status": parts.get(2).copied().unwrap_or("unknown"),
            }));
        }
    }
    (!rows.is_empty()).then(|| Value::Array(rows))
}

fn parse_ping(output: &str) -> Option<Value> {
    let mut info = serde_json::Map::new();
    if let Some(m) = PACKET_LOSS_RE.captures(output) {
        let loss: u32 = m[1].parse().unwrap_or(100);
        info.insert("packet_loss".into(), json!(loss.to_string()));
        info.insert("success_rate".into(), json!((100 - loss).to_string()));
    }
    if let Some(m) = PING_STATS_RE.captures(output) {
        info.insert("packets_sent".into(), json!(m[1].to_string()));
        info.insert("packets_received".into(), json!(m[2].to_string()));
    }
    (!info.is_empty()).then(|| Value::Object(info))
}
