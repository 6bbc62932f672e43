//! Vendor command/output translation for multi-vendor device fleets.
//!
//! Every supported vendor implements [`VendorAdapter`]: an immutable
//! mapping from abstract actions (`get_version`, `find_mac`, ...) to the
//! vendor's concrete command dialect, plus output parsing. Parsing is
//! two-stage: a structured row-template pass keyed by platform and command
//! ([`templates`]), falling back to per-action hand-written parsers when no
//! template matches.
//!
//! Adapters are stateless; [`adapter_for`] returns a `'static` reference
//! from a fixed vendor table.

use std::collections::HashMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NetError;

mod cisco;
mod h3c;
mod huawei;
pub mod templates;

pub use cisco::CiscoAdapter;
pub use h3c::H3cAdapter;
pub use huawei::HuaweiAdapter;

/// Abstract action names shared by all adapters.
pub mod actions {
    pub const GET_VERSION: &str = "get_version";
    pub const GET_INTERFACES: &str = "get_interfaces";
    pub const GET_INTERFACE_DETAIL: &str = "get_interface_detail";
    pub const GET_MAC_TABLE: &str = "get_mac_table";
    pub const GET_ARP_TABLE: &str = "get_arp_table";
    pub const GET_VLAN: &str = "get_vlan";
    pub const GET_VLAN_DETAIL: &str = "get_vlan_detail";
    pub const FIND_MAC: &str = "find_mac";
    pub const FIND_ARP: &str = "find_arp";
    pub const SHOW_RUNNING: &str = "show_running";
    pub const SHOW_STARTUP: &str = "show_startup";
    pub const PING: &str = "ping";
    pub const TRACEROUTE: &str = "traceroute";
    pub const SAVE_CONFIG: &str = "save_config";
}

/// Free-form action parameters (interface names, MAC addresses, ...).
pub type ActionParams = HashMap<String, String>;

/// Per-action fallback parser. Returns best-effort structure or `None`.
pub type FallbackParser = fn(&str) -> Option<Value>;

/// Supported device vendors. The set is closed: unknown brand codes are
/// rejected at the inventory boundary instead of degrading to a generic
/// platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Cisco,
    Huawei,
    H3c,
}

impl Vendor {
    /// Parses a brand code (case-insensitive, common aliases accepted).
    pub fn parse(code: &str) -> Option<Vendor> {
        match code.to_ascii_lowercase().as_str() {
            "cisco" | "cisco_ios" | "cisco_iosxe" => Some(Vendor::Cisco),
            "huawei" | "huawei_vrp" => Some(Vendor::Huawei),
            "h3c" | "hp_comware" | "comware" => Some(Vendor::H3c),
            _ => None,
        }
    }

    /// Canonical brand code.
    pub fn code(&self) -> &'static str {
        match self {
            Vendor::Cisco => "cisco",
            Vendor::Huawei => "huawei",
            Vendor::H3c => "h3c",
        }
    }

    /// Platform id used for transport driver selection and as the parse
    /// template namespace.
    pub fn platform(&self) -> &'static str {
        match self {
            Vendor::Cisco => "cisco_iosxe",
            Vendor::Huawei => "huawei_vrp",
            Vendor::H3c => "hp_comware",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// MAC address rendering dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacFormat {
    /// `aabb-ccdd-eeff` (Huawei VRP, H3C Comware).
    Hyphenated,
    /// `aabb.ccdd.eeff` (Cisco IOS).
    Dotted,
}

/// Normalizes a MAC address into the given dialect.
///
/// Strips every non-hex separator and requires exactly 12 hex digits.
pub fn normalize_mac(mac: &str, format: MacFormat) -> Result<String, NetError> {
    let clean: String = mac
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect();

    if clean.len() != 12 {
        return Err(NetError::Command(format!("invalid MAC address: {mac}")));
    }

    let sep = match format {
        MacFormat::Hyphenated => '-',
        MacFormat::Dotted => '.',
    };
    Ok(format!(
        "{}{sep}{}{sep}{}",
        &clean[0..4],
        &clean[4..8],
        &clean[8..12]
    ))
}

/// How a piece of output was parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParseMethod {
    Template,
    Fallback,
}

/// Result of [`VendorAdapter::parse_output`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ParsedOutput {
    /// The raw text as received from the device.
    pub raw: String,
    /// Structured rows or fields, when any parser produced them.
    pub parsed: Option<Value>,
    /// Which parse stage produced `parsed`; `None` for empty input.
    pub method: Option<ParseMethod>,
    /// The action the output belongs to.
    pub action: String,
}

impl ParsedOutput {
    fn empty(action: &str) -> Self {
        Self {
            raw: String::new(),
            parsed: None,
            method: None,
            action: action.to_string(),
        }
    }
}

/// Immutable per-vendor definition driving the default trait methods.
pub struct AdapterSpec {
    pub vendor: Vendor,
    /// action -> command template with `{param}` placeholders.
    pub commands: &'static [(&'static str, &'static str)],
    /// action -> parameters that must be supplied.
    pub required_params: &'static [(&'static str, &'static [&'static str])],
    /// Commands run once per opened connection, before caller commands.
    pub connection_extras: &'static [&'static str],
    /// MAC rendering dialect for `find_mac`-style actions.
    pub mac_format: MacFormat,
    /// Explicit per-action fallback parser table.
    pub fallback_parsers: &'static [(&'static str, FallbackParser)],
}

/// Stateless translator between abstract actions and one vendor's CLI
/// dialect.
pub trait VendorAdapter: Send + Sync {
    /// The immutable vendor definition.
    fn spec(&self) -> &'static AdapterSpec;

    fn vendor(&self) -> Vendor {
        self.spec().vendor
    }

    /// Platform id, shared by driver selection and the template namespace.
    fn platform(&self) -> &'static str {
        self.vendor().platform()
    }

    /// Actions this vendor supports, in definition order.
    fn supported_actions(&self) -> Vec<&'static str> {
        self.spec().commands.iter().map(|(a, _)| *a).collect()
    }

    fn is_action_supported(&self, action: &str) -> bool {
        self.spec().commands.iter().any(|(a, _)| *a == action)
    }

    /// Vendor post-connect command sequence (disable pagination and
    /// terminal monitoring).
    fn connection_extras(&self) -> &'static [&'static str] {
        self.spec().connection_extras
    }

    /// Renders the concrete command for `action`.
    fn get_command(&self, action: &str, params: &ActionParams) -> Result<String, NetError> {
        let spec = self.spec();
        let template = spec
            .commands
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, t)| *t)
            .ok_or_else(|| NetError::UnsupportedAction {
                vendor: spec.vendor.code().to_string(),
                action: action.to_string(),
            })?;

        let required = spec
            .required_params
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, p)| *p)
            .unwrap_or(&[]);
        for param in required {
            if !params.contains_key(*param) {
                return Err(NetError::Command(format!(
                    "action {action} missing required param: {param}"
                )));
            }
        }

        let mut rendered = params.clone();
        if let Some(mac) = params.get("mac_address") {
            rendered.insert(
                "mac_address".to_string(),
                normalize_mac(mac, spec.mac_format)?,
            );
        }

        render_template(template, &rendered)
    }

    /// Parses raw device output for `action`.
    ///
    /// Empty or whitespace-only input short-circuits without invoking any
    /// parser. Content the fallback cannot structure is returned raw with
    /// `parsed: None`; parsing never fails past this boundary.
    fn parse_output(&self, action: &str, output: &str) -> ParsedOutput {
        if output.trim().is_empty() {
            return ParsedOutput::empty(action);
        }

        let spec = self.spec();
        let command = spec
            .commands
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, t)| *t)
            .unwrap_or("");

        if let Some(rows) = templates::parse(self.platform(), command, output)
            && !rows.is_empty()
        {
            return ParsedOutput {
                raw: output.to_string(),
                parsed: Some(Value::Array(rows)),
                method: Some(ParseMethod::Template),
                action: action.to_string(),
            };
        }

        let parsed = spec
            .fallback_parsers
            .iter()
            .find(|(a, _)| *a == action)
            .and_then(|(_, parser)| parser(output));

        ParsedOutput {
            raw: output.to_string(),
            parsed,
            method: Some(ParseMethod::Fallback),
            action: action.to_string(),
        }
    }
}

/// Fixed vendor-code to implementation table.
pub fn adapter_for(vendor: Vendor) -> &'static dyn VendorAdapter {
    match vendor {
        Vendor::Cisco => &CiscoAdapter,
        Vendor::Huawei => &HuaweiAdapter,
        Vendor::H3c => &H3cAdapter,
    }
}

/// Substitutes `{name}` placeholders from `params`.
fn render_template(template: &str, params: &ActionParams) -> Result<String, NetError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            NetError::Command(format!("unterminated placeholder in template: {template}"))
        })?;
        let name = &after[..end];
        let value = params
            .get(name)
            .ok_or_else(|| NetError::Command(format!("missing command parameter: {name}")))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ActionParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn vendor_parse_accepts_aliases_case_insensitively() {
        assert_eq!(Vendor::parse("H3C"), Some(Vendor::H3c));
        assert_eq!(Vendor::parse("hp_comware"), Some(Vendor::H3c));
        assert_eq!(Vendor::parse("CISCO_IOSXE"), Some(Vendor::Cisco));
        assert_eq!(Vendor::parse("huawei_vrp"), Some(Vendor::Huawei));
        assert_eq!(Vendor::parse("juniper"), None);
    }

    #[test]
    fn normalize_mac_renders_vendor_dialects() {
        let hyphen = normalize_mac("AA:BB:CC:DD:EE:FF", MacFormat::Hyphenated).expect("hyphen");
        assert_eq!(hyphen, "aabb-ccdd-eeff");

        let dotted = normalize_mac("AA:BB:CC:DD:EE:FF", MacFormat::Dotted).expect("dotted");
        assert_eq!(dotted, "aabb.ccdd.eeff");
    }

    #[test]
    fn normalize_mac_rejects_malformed_input() {
        let err = normalize_mac("aabb-ccdd", MacFormat::Hyphenated).expect_err("short mac");
        assert!(matches!(err, NetError::Command(_)));

        let err = normalize_mac("zz:zz:zz:zz:zz:zz", MacFormat::Dotted).expect_err("non-hex mac");
        assert!(matches!(err, NetError::Command(_)));
    }

    #[test]
    fn get_command_succeeds_for_every_supported_action_with_valid_params() {
        let filled = params(&[
            ("interface", "GE1/0/1"),
            ("mac_address", "aa:bb:cc:dd:ee:ff"),
            ("ip_address", "10.0.0.1"),
            ("vlan_id", "10"),
            ("target", "10.0.0.1"),
        ]);
        for vendor in [Vendor::Cisco, Vendor::Huawei, Vendor::H3c] {
            let adapter = adapter_for(vendor);
            for action in adapter.supported_actions() {
                let command = adapter
                    .get_command(action, &filled)
                    .unwrap_or_else(|e| panic!("{vendor}/{action} should render: {e}"));
                assert!(!command.is_empty(), "{vendor}/{action} rendered empty");
                assert!(
                    !command.contains('{'),
                    "{vendor}/{action} left an unresolved placeholder: {command}"
                );
            }
        }
    }

    #[test]
    fn get_command_rejects_unsupported_action() {
        let err = adapter_for(Vendor::Cisco)
            .get_command("reboot_everything", &ActionParams::new())
            .expect_err("unsupported action");
        assert!(matches!(err, NetError::UnsupportedAction { .. }));
    }

    #[test]
    fn get_command_rejects_missing_required_param() {
        let err = adapter_for(Vendor::H3c)
            .get_command(actions::FIND_MAC, &ActionParams::new())
            .expect_err("missing mac_address");
        assert!(matches!(err, NetError::Command(_)));
    }

    #[test]
    fn parse_output_short_circuits_on_empty_input_for_every_action() {
        for vendor in [Vendor::Cisco, Vendor::Huawei, Vendor::H3c] {
            let adapter = adapter_for(vendor);
            for action in adapter.supported_actions() {
                for input in ["", "   ", "\n\t \n"] {
                    let result = adapter.parse_output(action, input);
                    assert_eq!(result.raw, "");
                    assert!(result.parsed.is_none());
                    assert!(result.method.is_none());
                }
            }
        }
    }

    #[test]
    fn render_template_reports_missing_parameter() {
        let err =
            render_template("ping {target}", &ActionParams::new()).expect_err("missing target");
        assert!(matches!(err, NetError::Command(_)));
    }
}
