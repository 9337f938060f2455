use std::collections::HashMap;

use log::warn;

use crate::metering_p1::structs::{CosemObject, RawCosem};

/// Turns a raw identifier/value entry into a recognized object, or `None` if unknown.
pub trait CosemObjectFactory {
    fn create(&self, raw: &RawCosem) -> Option<CosemObject>;
}

impl<F> CosemObjectFactory for F
where
    F: Fn(&RawCosem) -> Option<CosemObject>,
{
    fn create(&self, raw: &RawCosem) -> Option<CosemObject> {
        self(raw)
    }
}

#[derive(Debug, Clone)]
pub struct ObisDefinition {
    pub key: String,
    pub description: String,
}

/// Lookup table of known identifiers.
///
/// M-Bus channel identifiers (`0-1:24.2.1`, `0-2:24.2.1`, ...) are registered once as
/// `0-n:24.2.1`.
#[derive(Debug, Clone, Default)]
pub struct ObisRegistry {
    definitions: HashMap<String, ObisDefinition>,
}

impl ObisRegistry {
    pub fn new() -> Self {
        return ObisRegistry { definitions: HashMap::new() };
    }

    /// Registry with the DSMR 5 and Belgian e-MUCS objects
    pub fn dsmr() -> Self {
        let mut registry = ObisRegistry::new();
        for (obis, key, description) in DSMR_OBJECTS {
            registry.register(obis, key, description);
        }
        return registry;
    }

    /// Adds or replaces a definition. Malformed identifiers are refused, `0-n:` stands for
    /// any M-Bus channel.
    pub fn register(&mut self, obis: &str, key: &str, description: &str) -> bool {
        if !validate_obis_code(&obis.replace("0-n:", "0-1:")) {
            warn!("Not registering {} under malformed OBIS code {:?}", key, obis);
            return false;
        }
        self.definitions.insert(obis.to_string(), ObisDefinition {
            key: key.to_string(),
            description: description.to_string(),
        });
        return true;
    }

    pub fn len(&self) -> usize {
        return self.definitions.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.definitions.is_empty();
    }

    pub fn lookup(&self, obis: &str) -> Option<&ObisDefinition> {
        if let Some(def) = self.definitions.get(obis) {
            return Some(def);
        }
        let generic = channel_key(obis)?;
        return self.definitions.get(&generic);
    }
}

impl CosemObjectFactory for ObisRegistry {
    fn create(&self, raw: &RawCosem) -> Option<CosemObject> {
        let def = self.lookup(&raw.obis)?;
        Some(CosemObject {
            obis: raw.obis.clone(),
            key: def.key.clone(),
            description: def.description.clone(),
            values: raw.values.clone(),
        })
    }
}

/* 0-1:24.2.1 -> 0-n:24.2.1, anything not on an M-Bus channel has no generic form */
fn channel_key(obis: &str) -> Option<String> {
    let (medium_channel, rest) = obis.split_once(':')?;
    let (medium, channel) = medium_channel.split_once('-')?;
    if medium != "0" || channel == "0" || channel.parse::<u8>().is_err() {
        return None;
    }
    Some(format!("0-n:{}", rest))
}

pub fn validate_obis_code(code: &str) -> bool {
    // OBIS code format: A-B:C.D.E*F
    // A: Medium (0=abstract, 1=electricity, 6=heat, 7=gas, 8=water)
    // B: Channel (0-64)
    // C: Physical value
    // D: Processing method
    // E: Tariff/Time
    // F: Storage (optional)

    let parts: Vec<&str> = code.split(':').collect();
    if parts.len() != 2 {
        return false;
    }

    let ab_parts: Vec<&str> = parts[0].split('-').collect();
    if ab_parts.len() != 2 {
        return false;
    }

    let (cde_part, storage) = match parts[1].split_once('*') {
        Some((cde, f)) => (cde, Some(f)),
        None => (parts[1], None),
    };
    let cde_parts: Vec<&str> = cde_part.split('.').collect();
    if cde_parts.len() != 3 {
        return false;
    }

    ab_parts
        .iter()
        .chain(cde_parts.iter())
        .chain(storage.iter())
        .all(|part| part.parse::<u8>().is_ok())
}

const DSMR_OBJECTS: [(&str, &str, &str); 47] = [
    // Header objects
    ("1-3:0.2.8", "p1_version", "P1 version information"),
    ("0-0:96.1.4", "p1_version_be", "P1 version information (e-MUCS)"),
    ("0-0:1.0.0", "timestamp", "Date and time"),
    ("0-0:96.1.1", "equipment_identifier", "Equipment identifier"),

    // Energy registers
    ("1-0:1.8.1", "energy_delivered_t1", "Electricity delivered to client (tariff 1)"),
    ("1-0:1.8.2", "energy_delivered_t2", "Electricity delivered to client (tariff 2)"),
    ("1-0:2.8.1", "energy_returned_t1", "Electricity delivered by client (tariff 1)"),
    ("1-0:2.8.2", "energy_returned_t2", "Electricity delivered by client (tariff 2)"),
    ("0-0:96.14.0", "tariff_indicator", "Tariff indicator electricity"),

    // Power
    ("1-0:1.7.0", "power_delivered", "Actual electricity power delivered (+P)"),
    ("1-0:2.7.0", "power_returned", "Actual electricity power received (-P)"),
    ("1-0:21.7.0", "power_delivered_l1", "Instantaneous active power L1 (+P)"),
    ("1-0:41.7.0", "power_delivered_l2", "Instantaneous active power L2 (+P)"),
    ("1-0:61.7.0", "power_delivered_l3", "Instantaneous active power L3 (+P)"),
    ("1-0:22.7.0", "power_returned_l1", "Instantaneous active power L1 (-P)"),
    ("1-0:42.7.0", "power_returned_l2", "Instantaneous active power L2 (-P)"),
    ("1-0:62.7.0", "power_returned_l3", "Instantaneous active power L3 (-P)"),

    // Peak demand (e-MUCS)
    ("1-0:1.4.0", "current_average_demand", "Current average demand (quarter hour)"),
    ("1-0:1.6.0", "maximum_demand_month", "Maximum demand of the running month"),
    ("0-0:98.1.0", "maximum_demand_history", "Maximum demand of the last 13 months"),

    // Power quality
    ("0-0:96.7.21", "power_failures", "Number of power failures in any phase"),
    ("0-0:96.7.9", "long_power_failures", "Number of long power failures in any phase"),
    ("1-0:99.97.0", "power_failure_log", "Power failure event log"),
    ("1-0:32.32.0", "voltage_sags_l1", "Number of voltage sags (L1)"),
    ("1-0:52.32.0", "voltage_sags_l2", "Number of voltage sags (L2)"),
    ("1-0:72.32.0", "voltage_sags_l3", "Number of voltage sags (L3)"),
    ("1-0:32.36.0", "voltage_swells_l1", "Number of voltage swells (L1)"),
    ("1-0:52.36.0", "voltage_swells_l2", "Number of voltage swells (L2)"),
    ("1-0:72.36.0", "voltage_swells_l3", "Number of voltage swells (L3)"),
    ("1-0:32.7.0", "voltage_l1", "Instantaneous voltage (L1)"),
    ("1-0:52.7.0", "voltage_l2", "Instantaneous voltage (L2)"),
    ("1-0:72.7.0", "voltage_l3", "Instantaneous voltage (L3)"),
    ("1-0:31.7.0", "current_l1", "Instantaneous current (L1)"),
    ("1-0:51.7.0", "current_l2", "Instantaneous current (L2)"),
    ("1-0:71.7.0", "current_l3", "Instantaneous current (L3)"),

    // Messages and breaker (e-MUCS)
    ("0-0:96.13.0", "text_message", "Text message"),
    ("0-0:96.13.1", "text_message_code", "Text message code"),
    ("0-0:96.3.10", "breaker_state", "Breaker state"),
    ("0-0:17.0.0", "limiter_threshold", "Limiter threshold"),
    ("1-0:31.4.0", "fuse_supervision_threshold", "Fuse supervision threshold (L1)"),

    // M-Bus devices, any channel
    ("0-n:24.1.0", "mbus_device_type", "M-Bus device type"),
    ("0-n:96.1.0", "mbus_equipment_identifier", "M-Bus equipment identifier"),
    ("0-n:96.1.1", "mbus_equipment_identifier_be", "M-Bus equipment identifier (e-MUCS)"),
    ("0-n:24.2.1", "mbus_reading", "M-Bus last 5-minute value"),
    ("0-n:24.2.3", "mbus_reading_be", "M-Bus last value (e-MUCS)"),
    ("0-n:24.4.0", "mbus_valve_state", "M-Bus valve state"),
    ("0-n:24.3.0", "mbus_reading_legacy", "M-Bus reading (DSMR 2.2 / 3)"),
];
