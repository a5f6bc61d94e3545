#![allow(dead_code)]

use serde::Serialize;

/// Namespace token prefixing unique ids and device identifiers.
pub const DISCOVERY_NAMESPACE: &str = "solaredge";

/// One row of the field-name classification table.
#[derive(Debug, Clone, Copy)]
pub struct PatternRule {
    pub pattern: &'static str,
    pub device_class: Option<&'static str>,
    pub unit: &'static str,
}

/// Ordered classification table; the first substring match wins, so the
/// more specific patterns (reactive, apparent, factor, efficiency) must
/// sit above the generic "power" row.
pub const DEFAULT_RULES: &[PatternRule] = &[
    PatternRule { pattern: "voltage", device_class: Some("voltage"), unit: "V" },
    PatternRule { pattern: "current", device_class: Some("current"), unit: "A" },
    PatternRule { pattern: "reactive", device_class: Some("reactive_power"), unit: "var" },
    PatternRule { pattern: "apparent", device_class: Some("apparent_power"), unit: "VA" },
    PatternRule { pattern: "factor", device_class: Some("power_factor"), unit: "%" },
    PatternRule { pattern: "efficiency", device_class: None, unit: "%" },
    PatternRule { pattern: "power", device_class: Some("power"), unit: "W" },
    PatternRule { pattern: "temperature", device_class: Some("temperature"), unit: "°C" },
    PatternRule { pattern: "frequency", device_class: Some("frequency"), unit: "Hz" },
    PatternRule { pattern: "time", device_class: Some("duration"), unit: "s" },
];

/// Entities announced to the hub each cycle, when present in the state
/// payload.
pub const DEFAULT_ENTITIES: &[&str] = &[
    "l1_current",
    "l1_voltage",
    "power_apparent",
    "power_reactive",
    "power_factor",
    "power_ac",
    "frequency",
    "voltage_dc",
    "power_dc",
    "temperature",
    "efficiency",
];

/// Home Assistant sensor config document, republished every cycle so the
/// hub can rebuild its registry without manual setup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryEntry {
    pub state_topic: String,
    pub state_class: &'static str,
    pub name: String,
    pub device: DeviceBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    pub unit_of_measurement: &'static str,
    pub unique_id: String,
    pub value_template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceBlock {
    pub name: String,
    pub identifiers: String,
}

/// Maps field names onto the device-class/unit taxonomy and synthesizes
/// per-entity discovery documents.
#[derive(Debug, Clone)]
pub struct DiscoveryMapper {
    rules: &'static [PatternRule],
    entities: &'static [&'static str],
}

impl Default for DiscoveryMapper {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES,
            entities: DEFAULT_ENTITIES,
        }
    }
}

impl DiscoveryMapper {
    pub fn new(rules: &'static [PatternRule], entities: &'static [&'static str]) -> Self {
        Self { rules, entities }
    }

    pub fn entities(&self) -> &'static [&'static str] {
        self.entities
    }

    /// First matching rule's class and unit; unmatched names get no class
    /// and an empty unit.
    pub fn classify(&self, field_name: &str) -> (Option<&'static str>, &'static str) {
        for rule in self.rules {
            if field_name.contains(rule.pattern) {
                return (rule.device_class, rule.unit);
            }
        }
        (None, "")
    }

    pub fn entry(
        &self,
        field_name: &str,
        device_serial: &str,
        state_topic: &str,
    ) -> DiscoveryEntry {
        let (device_class, unit) = self.classify(field_name);
        DiscoveryEntry {
            state_topic: state_topic.to_string(),
            state_class: "measurement",
            name: field_name.to_string(),
            device: DeviceBlock {
                name: format!("SolarEdge {device_serial}"),
                identifiers: format!("{DISCOVERY_NAMESPACE}_{device_serial}"),
            },
            device_class,
            unit_of_measurement: unit,
            unique_id: format!("{DISCOVERY_NAMESPACE}_{device_serial}_{field_name}"),
            value_template: format!("{{{{ value_json.{field_name} }}}}"),
        }
    }

    /// `homeassistant/sensor/<namespace>_<serial>/<entity>/config`
    pub fn config_topic(&self, device_serial: &str, field_name: &str) -> String {
        format!(
            "homeassistant/sensor/{DISCOVERY_NAMESPACE}_{device_serial}/{field_name}/config"
        )
    }
}
