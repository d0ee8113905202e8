//! Protobuf payload carried on the alert topic.

use crate::error::{AlertError, AlertResult};
use crate::models::alert::{AlertTrigger, AlertType, Severity};
use crate::models::location::LocationKey;
use chrono::{DateTime, Utc};
use prost::Message;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum WireAlertType {
    Unspecified = 0,
    HighWind = 1,
    ExtremeTemperature = 2,
    HeavyPrecipitation = 3,
    StormWarning = 4,
    HeatWave = 5,
    ColdWave = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum WireSeverity {
    Unspecified = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Severe = 4,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AlertTriggerMessage {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub location_id: String,
    #[prost(string, tag = "3")]
    pub city: String,
    #[prost(string, tag = "4")]
    pub region: String,
    #[prost(string, tag = "5")]
    pub country: String,
    #[prost(enumeration = "WireAlertType", tag = "6")]
    pub alert_type: i32,
    #[prost(string, tag = "7")]
    pub condition_label: String,
    #[prost(double, tag = "8")]
    pub observed_value: f64,
    #[prost(double, tag = "9")]
    pub threshold_value: f64,
    #[prost(enumeration = "WireSeverity", tag = "10")]
    pub severity: i32,
    #[prost(int64, tag = "11")]
    pub triggered_at_ms: i64,
}

impl From<AlertType> for WireAlertType {
    fn from(t: AlertType) -> Self {
        match t {
            AlertType::HighWind => WireAlertType::HighWind,
            AlertType::ExtremeTemperature => WireAlertType::ExtremeTemperature,
            AlertType::HeavyPrecipitation => WireAlertType::HeavyPrecipitation,
            AlertType::StormWarning => WireAlertType::StormWarning,
            AlertType::HeatWave => WireAlertType::HeatWave,
            AlertType::ColdWave => WireAlertType::ColdWave,
        }
    }
}

impl From<Severity> for WireSeverity {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Low => WireSeverity::Low,
            Severity::Medium => WireSeverity::Medium,
            Severity::High => WireSeverity::High,
            Severity::Severe => WireSeverity::Severe,
        }
    }
}

impl From<&AlertTrigger> for AlertTriggerMessage {
    fn from(t: &AlertTrigger) -> Self {
        Self {
            id: t.id.to_string(),
            location_id: t.location_id.to_string(),
            city: t.location_key.city().to_string(),
            region: t.location_key.region().to_string(),
            country: t.location_key.country().to_string(),
            alert_type: WireAlertType::from(t.alert_type) as i32,
            condition_label: t.condition_label.clone(),
            observed_value: t.observed_value,
            threshold_value: t.threshold_value,
            severity: WireSeverity::from(t.severity) as i32,
            triggered_at_ms: t.triggered_at.timestamp_millis(),
        }
    }
}

impl TryFrom<AlertTriggerMessage> for AlertTrigger {
    type Error = AlertError;

    fn try_from(m: AlertTriggerMessage) -> AlertResult<Self> {
        let bad = |what: &str| AlertError::MalformedEvent(format!("invalid {}", what));

        let alert_type = match WireAlertType::try_from(m.alert_type) {
            Ok(WireAlertType::HighWind) => AlertType::HighWind,
            Ok(WireAlertType::ExtremeTemperature) => AlertType::ExtremeTemperature,
            Ok(WireAlertType::HeavyPrecipitation) => AlertType::HeavyPrecipitation,
            Ok(WireAlertType::StormWarning) => AlertType::StormWarning,
            Ok(WireAlertType::HeatWave) => AlertType::HeatWave,
            Ok(WireAlertType::ColdWave) => AlertType::ColdWave,
            Ok(WireAlertType::Unspecified) | Err(_) => return Err(bad("alert_type")),
        };
        let severity = match WireSeverity::try_from(m.severity) {
            Ok(WireSeverity::Low) => Severity::Low,
            Ok(WireSeverity::Medium) => Severity::Medium,
            Ok(WireSeverity::High) => Severity::High,
            Ok(WireSeverity::Severe) => Severity::Severe,
            Ok(WireSeverity::Unspecified) | Err(_) => return Err(bad("severity")),
        };
        let triggered_at: DateTime<Utc> =
            DateTime::from_timestamp_millis(m.triggered_at_ms).ok_or_else(|| bad("triggered_at"))?;

        Ok(AlertTrigger {
            id: Uuid::parse_str(&m.id).map_err(|_| bad("id"))?,
            location_id: Uuid::parse_str(&m.location_id).map_err(|_| bad("location_id"))?,
            location_key: LocationKey::new(&m.city, &m.region, &m.country),
            alert_type,
            condition_label: m.condition_label,
            observed_value: m.observed_value,
            threshold_value: m.threshold_value,
            severity,
            triggered_at,
        })
    }
}

pub fn encode_trigger(trigger: &AlertTrigger) -> Vec<u8> {
    AlertTriggerMessage::from(trigger).encode_to_vec()
}

pub fn decode_trigger(payload: &[u8]) -> AlertResult<AlertTrigger> {
    let message = AlertTriggerMessage::decode(payload)?;
    AlertTrigger::try_from(message)
}
