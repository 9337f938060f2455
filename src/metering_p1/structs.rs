use serde::Serialize;

use super::utils;

/// One identifier with all of its parenthesised value groups, as read from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCosem {
    pub obis: String,
    pub values: Vec<String>,
}

impl RawCosem {
    pub fn new(obis: &str, values: &[&str]) -> Self {
        return RawCosem {
            obis: obis.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        };
    }

    /// First value group, or an empty string for `0-0:96.13.0()` style objects
    pub fn value(&self) -> &str {
        return self.values.first().map(|v| v.as_str()).unwrap_or("");
    }
}

/// A COSEM object the registry recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CosemObject {
    pub obis: String,
    pub key: String,
    pub description: String,
    pub values: Vec<String>,
}

impl CosemObject {
    pub fn value(&self) -> &str {
        return self.values.first().map(|v| v.as_str()).unwrap_or("");
    }

    /// Value of the last group; for objects like `0-1:24.2.3(ts)(value)` this is the reading
    pub fn last_value(&self) -> &str {
        return self.values.last().map(|v| v.as_str()).unwrap_or("");
    }

    pub fn unit(&self) -> Option<String> {
        return utils::extract_unit(self.last_value());
    }

    pub fn numeric_value(&self) -> Option<f64> {
        return utils::extract_numeric_value(self.last_value());
    }
}

/// Result of one successfully framed (and, if a CRC was sent, validated) telegram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Telegram {
    /// Identification line without the leading `/`
    pub header: String,
    pub objects: Vec<CosemObject>,
    /// Only filled in lenient mode
    pub raw_text: String,
    /// Only filled in lenient mode
    pub unknown_objects: Vec<RawCosem>,
}

impl Telegram {
    pub fn get(&self, obis: &str) -> Option<&CosemObject> {
        return self.objects.iter().find(|o| o.obis == obis);
    }
}
