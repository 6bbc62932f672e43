//! Structured row-template output parsing.
//!
//! Each template binds a (platform, command) pair to a row regex with
//! named captures. Parsing maps every matching output line to a JSON
//! object keyed by the capture names. Commands carrying output filters
//! (`... | include x`) resolve to the template of their base command.
//!
//! A miss here is not an error: the adapter falls back to its per-action
//! parser table.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

struct RowTemplate {
    platform: &'static str,
    command: &'static str,
    row: Regex,
}

fn template(platform: &'static str, command: &'static str, row: &str) -> RowTemplate {
    RowTemplate {
        platform,
        command,
        row: Regex::new(row).expect("static row pattern compiles"),
    }
}

static TEMPLATES: Lazy<Vec<RowTemplate>> = Lazy::new(|| {
    vec![
        template(
            "hp_comware",
            "display interface brief",
            r"^(?P<interface>[A-Za-z][\w/.:-]*)\s+(?P<link>UP|DOWN|ADM|Stby)\s+(?P<protocol>UP|DOWN|UP\(s\))\s*(?P<primary_ip>\d+\.\d+\.\d+\.\d+|--)?\s*(?P<description>.*)$",
        ),
        template(
            "hp_comware",
            "display mac-address",
            r"^(?P<mac>[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4})\s+(?P<vlan>\d+)\s+(?P<state>\S+)\s+(?P<interface>\S+)\s+(?P<aging>\S+)",
        ),
        template(
            "hp_comware",
            "display arp",
            r"^(?P<ip>\d+\.\d+\.\d+\.\d+)\s+(?P<mac>[0-9a-fA-F-]{14})\s+(?P<vlan>\d+)\s+(?P<interface>\S+)\s+(?P<aging>\d+)\s+(?P<kind>\S+)",
        ),
        template(
            "huawei_vrp",
            "display interface brief",
            r"^(?P<interface>[A-Za-z][\w/.:-]*)\s+(?P<phy>\*?(?:up|down))\s+(?P<protocol>\*?(?:up|down))",
        ),
        template(
            "huawei_vrp",
            "display arp all",
            r"^(?P<ip>\d+\.\d+\.\d+\.\d+)\s+(?P<mac>[0-9a-fA-F-]{14})\s+(?P<expire>\d+)?\s*(?P<kind>[DSI])\S*\s+(?P<interface>\S+)",
        ),
        template(
            "cisco_iosxe",
            "show ip interface brief",
            r"^(?P<interface>[A-Za-z][\w/.:-]*)\s+(?P<ip_address>\d+\.\d+\.\d+\.\d+|unassigned)\s+(?P<ok>YES|NO)\s+(?P<method>\S+)\s+(?P<status>up|down|administratively down)\s+(?P<protocol>up|down)",
        ),
        template(
            "cisco_iosxe",
            "show ip arp",
            r"^Internet\s+(?P<ip>\d+\.\d+\.\d+\.\d+)\s+(?P<age>\S+)\s+(?P<mac>[0-9a-fA-F]{4}\.[0-9a-fA-F]{4}\.[0-9a-fA-F]{4})\s+(?P<kind>\S+)\s+(?P<interface>\S+)",
        ),
        template(
            "cisco_iosxe",
            "show mac address-table",
            r"^\s*(?P<vlan>\d+)\s+(?P<mac>[0-9a-fA-F]{4}\.[0-9a-fA-F]{4}\.[0-9a-fA-F]{4})\s+(?P<kind>\S+)\s+(?P<interface>\S+)",
        ),
    ]
});

/// Base command text with any output filter stripped.
fn base_command(command: &str) -> &str {
    command.split(" | ").next().unwrap_or(command).trim()
}

/// Parses `output` with the template registered for (platform, command).
///
/// Returns `None` when no template is registered; `Some(rows)` otherwise,
/// where non-matching lines (headers, separators) are skipped.
pub fn parse(platform: &str, command: &str, output: &str) -> Option<Vec<Value>> {
    let base = base_command(command);
    let template = TEMPLATES
        .iter()
        .find(|t| t.platform == platform && t.command == base)?;

    let mut rows = Vec::new();
    for line in output.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        if let Some(captures) = template.row.captures(line) {
            let mut row = Map::new();
            for name in template.row.capture_names().flatten() {
                let value = captures
                    .name(name)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                row.insert(name.to_string(), Value::String(value));
            }
            rows.push(Value::Object(row));
        }
    }
    Some(rows)
}

/// True when a template is registered for (platform, command).
pub fn has_template(platform: &str, command: &str) -> bool {
    let base = base_command(command);
    TEMPLATES
        .iter()
        .any(|t| t.platform == platform && t.command == base)
}
