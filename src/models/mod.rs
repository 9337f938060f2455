use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metering_p1::structs::{CosemObject, Telegram};
use crate::metering_p1::utils::{self, DeviceIdentification};

/// Whether the meter behind a P1 port is delivering usable telegrams
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MeterStatus {
    Online,
    Offline,
    Unknown,
}

/// Tracks consecutive failed telegrams. The parser has no notion of this, the owner decides
/// when a meter is considered offline.
#[derive(Debug, Clone)]
pub struct MeterHealth {
    pub status: MeterStatus,
    pub consecutive_failures: u32,
    pub threshold: u32,
    pub telegrams_received: u64,
}

impl MeterHealth {
    pub fn new(threshold: u32) -> Self {
        return MeterHealth {
            status: MeterStatus::Unknown,
            consecutive_failures: 0,
            threshold: threshold.max(1),
            telegrams_received: 0,
        };
    }

    /// Returns the new status if it changed
    pub fn record_success(&mut self) -> Option<MeterStatus> {
        self.telegrams_received += 1;
        self.consecutive_failures = 0;
        return self.set_status(MeterStatus::Online);
    }

    /// Returns the new status if it changed
    pub fn record_failure(&mut self) -> Option<MeterStatus> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures < self.threshold {
            return None;
        }
        return self.set_status(MeterStatus::Offline);
    }

    fn set_status(&mut self, status: MeterStatus) -> Option<MeterStatus> {
        if self.status == status {
            return None;
        }
        self.status = status;
        Some(status)
    }
}

/// One telegram flattened for output, one JSON document per telegram.
#[derive(Debug, Serialize)]
pub struct TelegramReport {
    pub meter_name: String,
    pub identification: Option<DeviceIdentification>,
    pub received_at: DateTime<Utc>,
    pub metered_time: Option<NaiveDateTime>,
    pub metered_values: serde_json::Map<String, Value>,
    pub unknown_values: serde_json::Map<String, Value>,
}

impl TelegramReport {
    pub fn new(telegram: &Telegram, received_at: DateTime<Utc>) -> Self {
        let mut metered_values = serde_json::Map::new();
        for obj in telegram.objects.iter() {
            metered_values.insert(obj.key.clone(), object_value(obj));
            if let Some(unit) = obj.unit() {
                metered_values.insert(format!("{}_unit", obj.key), unit.into());
            }
        }

        let mut unknown_values = serde_json::Map::new();
        for raw in telegram.unknown_objects.iter() {
            unknown_values.insert(raw.obis.clone(), raw.values.clone().into());
        }

        let metered_time = telegram
            .get("0-0:1.0.0")
            .and_then(|ts| utils::parse_timestamp(ts.value()))
            .map(|(ts, _)| ts);

        return TelegramReport {
            meter_name: telegram.header.clone(),
            identification: utils::parse_identification_line(&telegram.header),
            received_at,
            metered_time,
            metered_values,
            unknown_values,
        };
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        return serde_json::to_string(self);
    }
}

/* Single numeric values become numbers, everything else stays text */
fn object_value(obj: &CosemObject) -> Value {
    if obj.values.len() > 1 {
        return obj.values.clone().into();
    }
    if obj.unit().is_some() {
        if let Some(number) = obj.numeric_value() {
            return number.into();
        }
    }
    return obj.value().into();
}
