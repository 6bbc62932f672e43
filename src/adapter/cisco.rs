//! Cisco IOS-XE adapter.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use super::{AdapterSpec, MacFormat, Vendor, VendorAdapter, actions};

static SPEC: AdapterSpec = AdapterSpec {
    vendor: Vendor::Cisco,
    commands: &[
        (actions::GET_VERSION, "show version"),
        (actions::GET_INTERFACES, "show ip interface brief"),
        (actions::GET_INTERFACE_DETAIL, "show interfaces {interface}"),
        (actions::GET_MAC_TABLE, "show mac address-table"),
        (actions::GET_ARP_TABLE, "show ip arp"),
        (actions::GET_VLAN, "show vlan brief"),
        (actions::GET_VLAN_DETAIL, "show vlan id {vlan_id}"),
        (
            actions::FIND_MAC,
            "show mac address-table | include {mac_address}",
        ),
        (actions::FIND_ARP, "show ip arp | include {ip_address}"),
        (actions::SHOW_RUNNING, "show running-config"),
        (actions::SHOW_STARTUP, "show startup-config"),
        (actions::PING, "ping {target}"),
        (actions::TRACEROUTE, "traceroute {target}"),
        (actions::SAVE_CONFIG, "write memory"),
    ],
    required_params: &[
        (actions::GET_INTERFACE_DETAIL, &["interface"]),
        (actions::GET_VLAN_DETAIL, &["vlan_id"]),
        (actions::FIND_MAC, &["mac_address"]),
        (actions::FIND_ARP, &["ip_address"]),
        (actions::PING, &["target"]),
        (actions::TRACEROUTE, &["target"]),
    ],
    connection_extras: &["terminal length 0"],
    mac_format: MacFormat::Dotted,
    fallback_parsers: &[
        (actions::GET_VERSION, parse_version),
        (actions::GET_INTERFACE_DETAIL, parse_interface_detail),
        (actions::PING, parse_ping),
    ],
};

/// Adapter for Cisco IOS / IOS-XE devices.
pub struct CiscoAdapter;

impl VendorAdapter for CiscoAdapter {
    fn spec(&self) -> &'static AdapterSpec {
        &SPEC
    }
}

static IOSXE_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Cisco IOS XE Software, Version (\S+)").expect("static pattern"));
static IOS_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Cisco IOS Software, .* Version (\S+),").expect("static pattern"));
static IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"System image file is "([^"]+)""#).expect("static pattern"));
static UPTIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)uptime is (.+)").expect("static pattern"));
static LINE_PROTOCOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<interface>\S+) is (?P<status>[\w ]+?), line protocol is (?P<protocol>\w+)")
        .expect("static pattern")
});
static HW_ADDR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"address is ([0-9a-fA-F.]{14})").expect("static pattern"));
static PING_SUCCESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Success rate is (\d+) percent \((\d+)/(\d+)\)").expect("static pattern")
});

fn parse_version(output: &str) -> Option<Value> {
    let mut info = serde_json::Map::new();
    if let Some(m) = IOSXE_VERSION_RE.captures(output) {
        info.insert("version".into(), json!(&m[1]));
    } else if let Some(m) = IOS_VERSION_RE.captures(output) {
        info.insert("version".into(), json!(m[1].trim_end_matches(',')));
    }
    if let Some(m) = IMAGE_RE.captures(output) {
        info.insert("system_image".into(), json!(&m[1]));
    }
    if let Some(m) = UPTIME_RE.captures(output) {
        info.insert("uptime".into(), json!(m[1].trim()));
    }
    (!info.is_empty()).then(|| Value::Object(info))
}

fn parse_interface_detail(output: &str) -> Option<Value> {
    let mut info = serde_json::Map::new();
    if let Some(m) = LINE_PROTOCOL_RE.captures(output) {
        info.insert("interface".into(), json!(&m["interface"]));
        info.insert("status".into(), json!(m["status"].trim()));
        info.insert("protocol".into(), json!(&m["protocol"]));
    }
    if let Some(m) = HW_ADDR_RE.captures(output) {
        info.insert("mac_address".into(), json!(&m[1]));
    }
    (!info.is_empty()).then(|| Value::Object(info))
}

fn parse_ping(output: &str) -> Option<Value> {
    let m = PING_SUCCESS_RE.captures(output)?;
    Some(json!({
        "success_rate": m[1].to_string(),
        "packets_received": m[2].to_string(),
        "packets_sent": m[3].to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ActionParams, ParseMethod};

    #[test]
    fn find_mac_command_uses_dotted_dialect() {
        let mut params = ActionParams::new();
        params.insert("mac_address".to_string(), "AA:BB:CC:DD:EE:FF".to_string());
        let command = CiscoAdapter
            .get_command(actions::FIND_MAC, &params)
            .expect("render find_mac");
        assert_eq!(command, "show mac address-table | include aabb.ccdd.eeff");
    }

    #[test]
    fn save_config_maps_to_write_memory() {
        let command = CiscoAdapter
            .get_command(actions::SAVE_CONFIG, &ActionParams::new())
            .expect("render save");
        assert_eq!(command, "write memory");
    }

    #[test]
    fn iosxe_version_fields_are_extracted() {
        let output = "\
Cisco IOS XE Software, Version 16.09.03
System image file is \"flash:cat9k_iosxe.16.09.03.SPA.bin\"
Switch uptime is 2 weeks, 4 days, 21 hours, 3 minutes
";
        let result = CiscoAdapter.parse_output(actions::GET_VERSION, output);
        assert_eq!(result.method, Some(ParseMethod::Fallback));
        let parsed = result.parsed.expect("version fields");
        assert_eq!(parsed["version"], "16.09.03");
        assert_eq!(parsed["system_image"], "flash:cat9k_iosxe.16.09.03.SPA.bin");
    }

    #[test]
    fn ping_success_rate_is_extracted() {
        let output = "\
Type escape sequence to abort.
Sending 5, 100-byte ICMP Echos to 10.0.0.1, timeout is 2 seconds:
!!!!!
Success rate is 100 percent (5/5), round-trip min/avg/max = 1/2/4 ms
";
        let result = CiscoAdapter.parse_output(actions::PING, output);
        let parsed = result.parsed.expect("ping stats");
        assert_eq!(parsed["success_rate"], "100");
        assert_eq!(parsed["packets_sent"], "5");
    }

    #[test]
    fn mac_table_prefers_template_parse() {
        let output = "\
          Mac Address Table
-------------------------------------------
Vlan    Mac Address       Type        Ports
----    -----------       --------    -----
   1    0050.5688.70c0    DYNAMIC     Gi0/1
  10    0050.5688.70c1    DYNAMIC     Gi0/2
";
        let result = CiscoAdapter.parse_output(actions::GET_MAC_TABLE, output);
        assert_eq!(result.method, Some(ParseMethod::Template));
        let rows = result.parsed.expect("rows");
        assert_eq!(rows[0]["mac"], "0050.5688.70c0");
        assert_eq!(rows[1]["interface"], "Gi0/2");
    }
}
