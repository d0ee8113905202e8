use crate::models::location::LocationKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    HighWind,
    ExtremeTemperature,
    HeavyPrecipitation,
    StormWarning,
    HeatWave,
    ColdWave,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::HighWind => "HIGH_WIND",
            AlertType::ExtremeTemperature => "EXTREME_TEMPERATURE",
            AlertType::HeavyPrecipitation => "HEAVY_PRECIPITATION",
            AlertType::StormWarning => "STORM_WARNING",
            AlertType::HeatWave => "HEAT_WAVE",
            AlertType::ColdWave => "COLD_WAVE",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH_WIND" => Ok(AlertType::HighWind),
            "EXTREME_TEMPERATURE" => Ok(AlertType::ExtremeTemperature),
            "HEAVY_PRECIPITATION" => Ok(AlertType::HeavyPrecipitation),
            "STORM_WARNING" => Ok(AlertType::StormWarning),
            "HEAT_WAVE" => Ok(AlertType::HeatWave),
            "COLD_WAVE" => Ok(AlertType::ColdWave),
            other => Err(format!("unknown alert type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Severe,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Severe => "SEVERE",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "SEVERE" => Ok(Severity::Severe),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// A threshold breach that survived the cooldown check.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertTrigger {
    pub id: Uuid,
    pub location_id: Uuid,
    pub location_key: LocationKey,
    pub alert_type: AlertType,
    pub condition_label: String,
    pub observed_value: f64,
    pub threshold_value: f64,
    pub severity: Severity,
    pub triggered_at: DateTime<Utc>,
}

impl AlertTrigger {
    pub fn message(&self) -> String {
        format!(
            "{} in {}, {}. Current: {:.1}",
            self.condition_label,
            self.location_key.city(),
            self.location_key.region(),
            self.observed_value
        )
    }
}

/// One delivered alert for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserAlertRecord {
    pub trigger_id: Uuid,
    pub user_id: i64,
    pub location_id: Uuid,
    pub location_key: LocationKey,
    pub alert_type: AlertType,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl UserAlertRecord {
    pub fn from_trigger(trigger: &AlertTrigger, user_id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            trigger_id: trigger.id,
            user_id,
            location_id: trigger.location_id,
            location_key: trigger.location_key.clone(),
            alert_type: trigger.alert_type,
            message: trigger.message(),
            severity: trigger.severity,
            created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserAlertRow {
    pub trigger_id: Uuid,
    pub user_id: i64,
    pub location_id: Uuid,
    pub city: String,
    pub region: String,
    pub country: String,
    pub alert_type: String,
    pub message: String,
    pub severity: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserAlertRow> for UserAlertRecord {
    type Error = String;

    fn try_from(row: UserAlertRow) -> Result<Self, Self::Error> {
        Ok(Self {
            trigger_id: row.trigger_id,
            user_id: row.user_id,
            location_id: row.location_id,
            location_key: LocationKey::new(&row.city, &row.region, &row.country),
            alert_type: row.alert_type.parse()?,
            message: row.message,
            severity: row.severity.parse()?,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(observed: f64) -> AlertTrigger {
        AlertTrigger {
            id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            location_key: LocationKey::new("chicago", "il", "us"),
            alert_type: AlertType::HighWind,
            condition_label: "High Wind Warning".to_string(),
            observed_value: observed,
            threshold_value: 20.0,
            severity: Severity::Severe,
            triggered_at: Utc::now(),
        }
    }

    #[test]
    fn test_message_rendering() {
        assert_eq!(
            trigger(32.04).message(),
            "High Wind Warning in CHICAGO, IL. Current: 32.0"
        );
        assert_eq!(
            trigger(-12.36).message(),
            "High Wind Warning in CHICAGO, IL. Current: -12.4"
        );
    }

    #[test]
    fn test_record_copies_trigger_fields() {
        let t = trigger(26.0);
        let now = Utc::now();
        let record = UserAlertRecord::from_trigger(&t, 7, now);
        assert_eq!(record.trigger_id, t.id);
        assert_eq!(record.user_id, 7);
        assert_eq!(record.severity, Severity::Severe);
        assert_eq!(record.created_at, now);
    }

    #[test]
    fn test_string_forms_parse_back() {
        for ty in [
            AlertType::HighWind,
            AlertType::ExtremeTemperature,
            AlertType::HeavyPrecipitation,
            AlertType::StormWarning,
            AlertType::HeatWave,
            AlertType::ColdWave,
        ] {
            assert_eq!(ty.as_str().parse::<AlertType>().unwrap(), ty);
        }
        assert!("TORNADO".parse::<AlertType>().is_err());
        assert!(Severity::Severe > Severity::High);
    }
}
