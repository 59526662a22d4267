//! Physical-inventory classification of ENTITY-MIB rows.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

pub const CLASS_PROCESSOR: u8 = 1;
pub const CLASS_CHASSIS: u8 = 3;
pub const CLASS_POWER_SUPPLY: u8 = 6;
pub const CLASS_FAN: u8 = 7;
pub const CLASS_SENSOR: u8 = 8;
pub const CLASS_MODULE: u8 = 9;
pub const CLASS_PORT: u8 = 10;

const KNOWN_MODULE_PATTERNS: &[&str] = &["SUP", "FAB", "N7K-", "N5K-", "N9K-", "C8", "WS-", "C9"];
const TRANSCEIVER_KEYWORDS: &[&str] = &["transceiver", "sfp", "qsfp"];
const TRANSCEIVER_MODEL_PREFIXES: &[&str] = &["GLC-", "SFP-", "QSFP-"];
const FABRIC_EXTENDER: &str = "Fabric Extender";

static FEX_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)48x1GE.*4x10GE.*N2K-C2248TP", "N2K-C2248TP-1GE"),
        (r"(?i)32x10GE.*8x10GE.*N2K-C2232PP", "N2K-C2232PP-10GE"),
        (r"(?i)16x10GE.*8x10GE.*N2K-B22", "N2K-B22DELL-P"),
        (r"(?i)48x1GE.*4x10GE.*N2K-C2148T", "N2K-C2148T-1GE"),
        (r"(?i)48x1GE.*4x10GE", "N2K-C2248TP-1GE"),
        (r"(?i)32x10GE.*8x10GE", "N2K-C2232PP-10GE"),
        (r"(?i)16x10GE.*8x10GE", "N2K-B22DELL-P"),
        (r"(?i)N56-M24UP2Q", "N56-M24UP2Q"),
        (r"(?i)N5K-C56128P", "N5K-C56128P"),
        (r"(?i)N5K-C5010P-BF", "N5K-C5010P-BF"),
        (r"(?i)N5K-C5020P-BF", "N5K-C5020P-BF"),
    ]
    .into_iter()
    .map(|(pattern, model)| (Regex::new(pattern).expect("valid regex"), model))
    .collect()
});

static EMBEDDED_N2K: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(N2K-[A-Z0-9\-]+)").expect("valid regex"));

static PORT_LAYOUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+x\d+G[BE].*\d+x\d+G[BE])").expect("valid regex"));

/// SNMP dumps carry the class both as `"9"` and as `9`.
fn class_from_any<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawClass {
        Number(u8),
        Text(String),
    }

    match RawClass::deserialize(deserializer)? {
        RawClass::Number(n) => Ok(n),
        RawClass::Text(s) => Ok(s.trim().parse().unwrap_or(0)),
    }
}

/// Quoted-empty `""` strings from SNMP become empty.
fn clean_field(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed == "\"\"" {
        String::new()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityRow {
    #[serde(default)]
    pub entity_id: String,
    #[serde(deserialize_with = "class_from_any", default)]
    pub class: u8,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "model_name")]
    pub model: String,
    #[serde(default, alias = "serial_number")]
    pub serial: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceEntities {
    #[serde(alias = "device_name")]
    pub hostname: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub entities: Vec<EntityRow>,
}

impl DeviceEntities {
    /// Collections that failed upstream carry `status != "success"`.
    pub fn is_collected(&self) -> bool {
        self.status
            .as_deref()
            .map_or(true, |s| s.eq_ignore_ascii_case("success"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    Chassis,
    Module,
    PowerSupply,
    Fan,
    Transceiver,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Chassis => "chassis",
            ComponentType::Module => "module",
            ComponentType::PowerSupply => "power_supply",
            ComponentType::Fan => "fan",
            ComponentType::Transceiver => "transceiver",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub component_type: ComponentType,
    pub entity_id: String,
    pub model: String,
    pub serial: String,
    pub description: String,
    pub name: String,
}

fn looks_like_transceiver(description: &str, model: &str) -> bool {
    let description = description.to_lowercase();
    TRANSCEIVER_KEYWORDS.iter().any(|k| description.contains(k))
        || TRANSCEIVER_MODEL_PREFIXES.iter().any(|p| model.contains(p))
}

pub fn is_physical(entity: &EntityRow) -> bool {
    let model = clean_field(&entity.model);
    let serial = clean_field(&entity.serial);
    let transceiver = looks_like_transceiver(&entity.description, &model);

    match entity.class {
        CLASS_SENSOR | CLASS_PROCESSOR => false,
        CLASS_PORT if !transceiver => false,
        CLASS_CHASSIS | CLASS_POWER_SUPPLY | CLASS_FAN => true,
        _ if transceiver => !model.is_empty(),
        CLASS_MODULE => {
            KNOWN_MODULE_PATTERNS.iter().any(|p| model.contains(p)) || !serial.is_empty()
        }
        _ => !serial.is_empty(),
    }
}

pub fn classify(entity: &EntityRow) -> Option<ComponentType> {
    let model = clean_field(&entity.model);
    match entity.class {
        CLASS_CHASSIS => Some(ComponentType::Chassis),
        CLASS_POWER_SUPPLY => Some(ComponentType::PowerSupply),
        CLASS_FAN => Some(ComponentType::Fan),
        _ if looks_like_transceiver(&entity.description, &model) => Some(ComponentType::Transceiver),
        CLASS_MODULE => Some(ComponentType::Module),
        _ => None,
    }
}

/// Real FEX model for a Fabric Extender entity, or `current_model` unchanged.
pub fn extract_fex_model(description: &str, current_model: &str) -> String {
    if current_model.contains("-N2K-") {
        if let Some(found) = EMBEDDED_N2K.find(current_model) {
            return found.as_str().to_string();
        }
    }

    let full_text = format!("{} {}", description, current_model);
    if let Some((_, model)) = FEX_PATTERNS.iter().find(|(re, _)| re.is_match(&full_text)) {
        return model.to_string();
    }

    if description.contains(FABRIC_EXTENDER) {
        if let Some(caps) = PORT_LAYOUT.captures(description) {
            return format!("FEX-{}", &caps[1]);
        }
    }

    current_model.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub chassis_model: String,
    pub chassis_serial: String,
    pub module_count: usize,
    pub power_supply_count: usize,
    pub fan_count: usize,
    pub transceiver_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInventory {
    pub hostname: String,
    pub ip: String,
    pub components: Vec<Component>,
}

impl DeviceInventory {
    pub fn count(&self, kind: ComponentType) -> usize {
        self.components
            .iter()
            .filter(|c| c.component_type == kind)
            .count()
    }

    pub fn summary(&self) -> DeviceSummary {
        let chassis = self
            .components
            .iter()
            .find(|c| c.component_type == ComponentType::Chassis);
        DeviceSummary {
            chassis_model: chassis.map_or_else(|| "Unknown".to_string(), |c| c.model.clone()),
            chassis_serial: chassis.map(|c| c.serial.clone()).unwrap_or_default(),
            module_count: self.count(ComponentType::Module),
            power_supply_count: self.count(ComponentType::PowerSupply),
            fan_count: self.count(ComponentType::Fan),
            transceiver_count: self.count(ComponentType::Transceiver),
        }
    }
}

/// Classifies every device, dropping serials already reported by an
/// earlier device.
#[derive(Debug, Default)]
pub struct InventoryClassifier {
    seen_serials: HashSet<String>,
    pub duplicates_skipped: usize,
    pub fex_models_fixed: usize,
}

impl InventoryClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify_device(&mut self, device: &DeviceEntities) -> DeviceInventory {
        let mut components = Vec::new();

        for entity in device.entities.iter().filter(|e| is_physical(e)) {
            let Some(component_type) = classify(entity) else {
                continue;
            };

            let serial = clean_field(&entity.serial);
            if !serial.is_empty() && !self.seen_serials.insert(serial.clone()) {
                self.duplicates_skipped += 1;
                continue;
            }

            let mut model = clean_field(&entity.model);
            let is_fex = matches!(component_type, ComponentType::Chassis | ComponentType::Module)
                && (entity.description.contains(FABRIC_EXTENDER) || model.contains(FABRIC_EXTENDER));
            if is_fex {
                let fixed = extract_fex_model(&entity.description, &model);
                if fixed != model {
                    self.fex_models_fixed += 1;
                    model = fixed;
                }
            }

            components.push(Component {
                component_type,
                entity_id: entity.entity_id.clone(),
                model,
                serial,
                description: entity.description.trim().to_string(),
                name: entity.name.clone(),
            });
        }

        DeviceInventory {
            hostname: device.hostname.clone(),
            ip: device.ip.clone(),
            components,
        }
    }
}
