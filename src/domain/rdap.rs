//! Extraction of an ISP name from ARIN RDAP `ip` responses.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;

pub const UNKNOWN_PROVIDER: &str = "Unknown";
pub const PRIVATE_IP_PROVIDER: &str = "Private IP";
pub const VERIZON_BUSINESS: &str = "Verizon Business";

static PRIVATE_CUSTOMER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Private Customer -\s*").expect("valid regex"));

const PERSONAL_TITLES: &[&str] = &["Mr.", "Ms.", "Dr.", "Mrs.", "Miss"];
const ROLE_NAMES: &[&str] = &["admin", "technical", "abuse", "noc"];

/// 依序比對，第一個命中的 variant 決定公司名稱
const COMPANY_VARIANTS: &[(&str, &[&str])] = &[
    (
        "AT&T",
        &[
            "AT&T",
            "AT&T Internet Services",
            "AT&T Enterprises, LLC",
            "AT&T Broadband",
            "IPAdmin-ATT Internet Services",
            "AT&T Communications",
            "AT&T Business",
        ],
    ),
    (
        "Charter Communications",
        &[
            "Charter Communications LLC",
            "Charter Communications Inc",
            "Charter Communications, LLC",
            "Charter Communications",
        ],
    ),
    (
        "Comcast",
        &[
            "Comcast Cable Communications, LLC",
            "Comcast Communications",
            "Comcast Cable",
            "Comcast Corporation",
        ],
    ),
    (
        "Cox Communications",
        &["Cox Communications Inc.", "Cox Communications", "Cox Communications Group"],
    ),
    (
        "CenturyLink",
        &[
            "CenturyLink Communications",
            "CenturyLink",
            "Lumen Technologies",
            "Level 3 Parent, LLC",
            "Level 3 Communications",
            "Level3",
        ],
    ),
    (
        "Frontier Communications",
        &[
            "Frontier Communications Corporation",
            "Frontier Communications",
            "Frontier Communications Inc.",
        ],
    ),
    (
        "Verizon",
        &["Verizon Communications", "Verizon Internet", "Verizon Business", "Verizon Wireless"],
    ),
    ("Optimum", &["Optimum", "Altice USA", "Suddenlink Communications"]),
    ("Crown Castle", &["Crown Castle"]),
    ("Cable One, Inc.", &["Cable One, Inc.", "Cable One"]),
];

/// Network-name fallbacks when the response has no usable org entity.
const NETWORK_NAME_HINTS: &[(&str, &str)] = &[
    ("CHARTER", "Charter Communications"),
    ("COMCAST", "Comcast"),
    ("COX", "Cox Communications"),
    ("VERIZON", "Verizon"),
    ("CENTURYLINK", "CenturyLink"),
    ("FRONTIER", "Frontier Communications"),
    ("CC04", "Charter Communications"),
];

#[derive(Debug, Clone, PartialEq)]
struct OrgCandidate {
    name: String,
    latest: Option<DateTime<Utc>>,
}

fn vcard_property<'a>(properties: &'a [Value], label: &str) -> Option<&'a str> {
    properties.iter().find_map(|prop| {
        let prop = prop.as_array()?;
        if prop.len() < 4 || prop[0].as_str()? != label {
            return None;
        }
        prop[3].as_str()
    })
}

fn is_person_or_role(name: &str) -> bool {
    let lowered = name.to_lowercase();
    PERSONAL_TITLES.iter().any(|title| name.contains(title))
        || ROLE_NAMES.iter().any(|role| lowered.contains(role))
}

fn latest_event(entity: &Value) -> Option<DateTime<Utc>> {
    entity
        .get("events")?
        .as_array()?
        .iter()
        .filter(|event| {
            event
                .get("eventAction")
                .and_then(Value::as_str)
                .map(|action| {
                    let action = action.to_lowercase();
                    action == "registration" || action == "last changed"
                })
                .unwrap_or(false)
        })
        .filter_map(|event| event.get("eventDate").and_then(Value::as_str))
        .filter_map(|date| DateTime::parse_from_rfc3339(date).ok())
        .map(|date| date.with_timezone(&Utc))
        .max()
}

fn collect_org_entities(entities: &[Value], out: &mut Vec<OrgCandidate>) {
    for entity in entities {
        let properties = entity
            .get("vcardArray")
            .and_then(Value::as_array)
            .and_then(|vcard| vcard.get(1))
            .and_then(Value::as_array);

        if let Some(properties) = properties {
            let name = vcard_property(properties, "fn");
            let kind = vcard_property(properties, "kind");
            if let (Some(name), Some(kind)) = (name, kind) {
                if kind.eq_ignore_ascii_case("org") && !name.is_empty() && !is_person_or_role(name) {
                    out.push(OrgCandidate {
                        name: name.to_string(),
                        latest: latest_event(entity),
                    });
                }
            }
        }

        if let Some(children) = entity.get("entities").and_then(Value::as_array) {
            collect_org_entities(children, out);
        }
    }
}

fn canonical_company(name: &str) -> Option<&'static str> {
    let lowered = name.to_lowercase();
    COMPANY_VARIANTS
        .iter()
        .find(|(_, variants)| {
            variants
                .iter()
                .any(|variant| lowered.contains(&variant.to_lowercase()))
        })
        .map(|(company, _)| *company)
}

fn provider_from_network_name(network_name: &str) -> String {
    if network_name.starts_with("SBC-") {
        return "AT&T".to_string();
    }
    let upper = network_name.to_uppercase();
    NETWORK_NAME_HINTS
        .iter()
        .find(|(hint, _)| upper.contains(hint))
        .map(|(_, provider)| provider.to_string())
        .unwrap_or_else(|| network_name.to_string())
}

/// Provider name for an RDAP response, or `"Unknown"`.
pub fn parse_arin_response(rdap: &Value) -> String {
    let network_name = rdap
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let mut orgs = Vec::new();
    if let Some(entities) = rdap.get("entities").and_then(Value::as_array) {
        collect_org_entities(entities, &mut orgs);
    }
    // newest first; entities without dates sort last
    orgs.sort_by(|a, b| b.latest.cmp(&a.latest));

    if network_name == Some("CABLEONE")
        && orgs.iter().any(|o| o.name.to_lowercase().contains("cable one"))
    {
        return "Cable One, Inc.".to_string();
    }

    if let Some(org) = orgs.first() {
        let name = PRIVATE_CUSTOMER.replace(&org.name, "").trim().to_string();
        return canonical_company(&name)
            .map(str::to_string)
            .unwrap_or(name);
    }

    network_name
        .map(provider_from_network_name)
        .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string())
}

/// What kind of address a WAN IP is, before any registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpClass {
    Invalid,
    VerizonBusiness,
    Private,
    Public(IpAddr),
}

pub fn classify_ip(ip: &str) -> IpClass {
    let addr: IpAddr = match ip.trim().parse() {
        Ok(addr) => addr,
        Err(_) => return IpClass::Invalid,
    };

    match addr {
        IpAddr::V4(v4) => {
            let [a, b, _, _] = v4.octets();
            if a == 166 && b == 80 {
                IpClass::VerizonBusiness
            } else if is_private_v4(&v4) {
                IpClass::Private
            } else {
                IpClass::Public(addr)
            }
        }
        IpAddr::V6(v6) => {
            let unique_local = (v6.segments()[0] & 0xfe00) == 0xfc00;
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            if v6.is_loopback() || v6.is_unspecified() || unique_local || link_local {
                IpClass::Private
            } else {
                IpClass::Public(addr)
            }
        }
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
}
