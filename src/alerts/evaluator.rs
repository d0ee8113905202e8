use crate::alerts::cooldown::CooldownLedger;
use crate::channel::AlertPublisher;
use crate::config::{PrecipitationSource, ThresholdConfig};
use crate::models::alert::{AlertTrigger, AlertType, Severity};
use crate::models::location::Location;
use crate::models::weather::WeatherSnapshot;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

const SEVERE_WIND: f64 = 30.0;
const HIGH_WIND: f64 = 25.0;

/// A threshold breach before the cooldown check.
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    pub alert_type: AlertType,
    pub label: &'static str,
    pub observed: f64,
    pub threshold: f64,
    pub severity: Severity,
}

/// Compares snapshots against the configured thresholds and publishes the
/// breaches that are outside their cooldown window.
///
/// The ledger entry is committed before the publish and is kept even when
/// the publish fails: a lost alert is preferred over a flood of repeats.
pub struct ThresholdEvaluator {
    thresholds: ThresholdConfig,
    ledger: Arc<CooldownLedger>,
    publisher: Arc<dyn AlertPublisher>,
}

impl ThresholdEvaluator {
    pub fn new(
        thresholds: ThresholdConfig,
        ledger: Arc<CooldownLedger>,
        publisher: Arc<dyn AlertPublisher>,
    ) -> Self {
        Self {
            thresholds,
            ledger,
            publisher,
        }
    }

    /// Every rule runs on its own; a snapshot can breach several at once.
    pub fn breaches(&self, snapshot: &WeatherSnapshot) -> Vec<Breach> {
        let t = &self.thresholds;
        let mut found = Vec::new();

        if let Some(wind) = snapshot.wind_speed.filter(|w| *w > t.wind_speed) {
            let severity = if wind > SEVERE_WIND {
                Severity::Severe
            } else if wind > HIGH_WIND {
                Severity::High
            } else {
                Severity::Medium
            };
            found.push(Breach {
                alert_type: AlertType::HighWind,
                label: "High Wind Warning",
                observed: wind,
                threshold: t.wind_speed,
                severity,
            });
        }

        if let Some(temp) = snapshot.temperature.filter(|v| *v > t.high_temp) {
            found.push(Breach {
                alert_type: AlertType::ExtremeTemperature,
                label: "Heat Warning",
                observed: temp,
                threshold: t.high_temp,
                severity: Severity::High,
            });
        }

        if let Some(temp) = snapshot.temperature.filter(|v| *v < t.low_temp) {
            found.push(Breach {
                alert_type: AlertType::ExtremeTemperature,
                label: "Cold Warning",
                observed: temp,
                threshold: t.low_temp,
                severity: Severity::High,
            });
        }

        let measure = match t.precipitation_source {
            PrecipitationSource::Precipitation => snapshot.precipitation,
            PrecipitationSource::CloudCoverage => snapshot.cloud_coverage,
        };
        if let Some(value) = measure.filter(|v| *v > t.precipitation) {
            found.push(Breach {
                alert_type: AlertType::HeavyPrecipitation,
                label: "Heavy Precipitation Expected",
                observed: value,
                threshold: t.precipitation,
                severity: Severity::Medium,
            });
        }

        found
    }

    pub fn evaluate(&self, location: &Location, snapshot: &WeatherSnapshot) -> Vec<AlertTrigger> {
        self.evaluate_at(location, snapshot, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        location: &Location,
        snapshot: &WeatherSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<AlertTrigger> {
        let mut fired = Vec::new();

        for breach in self.breaches(snapshot) {
            if !self.ledger.try_claim(&location.key, breach.alert_type, now) {
                debug!(
                    "Suppressed {} for {}: inside cooldown window",
                    breach.alert_type, location.key
                );
                continue;
            }

            let trigger = AlertTrigger {
                id: Uuid::new_v4(),
                location_id: location.id,
                location_key: location.key.clone(),
                alert_type: breach.alert_type,
                condition_label: breach.label.to_string(),
                observed_value: breach.observed,
                threshold_value: breach.threshold,
                severity: breach.severity,
                triggered_at: now,
            };

            match self.publisher.publish(&trigger) {
                Ok(()) => info!(
                    "Published {} ({}) for {}: {:.1} vs threshold {:.1}",
                    trigger.alert_type,
                    trigger.severity,
                    location.key,
                    trigger.observed_value,
                    trigger.threshold_value
                ),
                Err(e) => error!(
                    "Publishing {} for {} failed, cooldown kept: {}",
                    trigger.alert_type, location.key, e
                ),
            }
            fired.push(trigger);
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{snapshot_at, RecordingPublisher};
    use crate::models::location::LocationKey;
    use std::time::Duration;

    fn location() -> Location {
        Location {
            id: Uuid::new_v4(),
            key: LocationKey::new("Peoria", "IL", "US"),
            name: None,
        }
    }

    fn evaluator(
        thresholds: ThresholdConfig,
        publisher: Arc<RecordingPublisher>,
    ) -> ThresholdEvaluator {
        let ledger = Arc::new(CooldownLedger::new(thresholds.cooldown));
        ThresholdEvaluator::new(thresholds, ledger, publisher)
    }

    fn calm(now: DateTime<Utc>) -> WeatherSnapshot {
        let mut s = snapshot_at(now, 5.0);
        s.temperature = Some(18.0);
        s.precipitation = Some(0.0);
        s.cloud_coverage = Some(90.0);
        s
    }

    #[test]
    fn test_wind_severity_tiers() {
        let e = evaluator(ThresholdConfig::default(), Arc::new(RecordingPublisher::default()));
        let now = Utc::now();
        for (wind, expected) in [
            (32.0, Some(Severity::Severe)),
            (30.0, Some(Severity::High)),
            (26.0, Some(Severity::High)),
            (25.0, Some(Severity::Medium)),
            (20.5, Some(Severity::Medium)),
            (20.0, None),
        ] {
            let mut s = calm(now);
            s.wind_speed = Some(wind);
            let severity = e
                .breaches(&s)
                .into_iter()
                .find(|b| b.alert_type == AlertType::HighWind)
                .map(|b| b.severity);
            assert_eq!(severity, expected, "wind {}", wind);
        }
    }

    #[test]
    fn test_strong_wind_fires_one_severe_trigger() {
        let publisher = Arc::new(RecordingPublisher::default());
        let e = evaluator(ThresholdConfig::default(), publisher.clone());
        let now = Utc::now();
        let mut s = calm(now);
        s.wind_speed = Some(32.0);

        let fired = e.evaluate_at(&location(), &s, now);

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert_type, AlertType::HighWind);
        assert_eq!(fired[0].severity, Severity::Severe);
        assert_eq!(fired[0].threshold_value, 20.0);
        assert_eq!(publisher.published().len(), 1);
    }

    #[test]
    fn test_heat_fires_exactly_one_temperature_trigger() {
        let e = evaluator(ThresholdConfig::default(), Arc::new(RecordingPublisher::default()));
        let now = Utc::now();
        let mut s = calm(now);
        s.temperature = Some(40.0);

        let fired = e.evaluate_at(&location(), &s, now);

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert_type, AlertType::ExtremeTemperature);
        assert_eq!(fired[0].condition_label, "Heat Warning");
        assert_eq!(fired[0].severity, Severity::High);
    }

    #[test]
    fn test_cold_warning() {
        let e = evaluator(ThresholdConfig::default(), Arc::new(RecordingPublisher::default()));
        let now = Utc::now();
        let mut s = calm(now);
        s.temperature = Some(-14.5);

        let fired = e.evaluate_at(&location(), &s, now);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].condition_label, "Cold Warning");
        assert_eq!(fired[0].threshold_value, -10.0);
    }

    #[test]
    fn test_both_temperature_rules_are_checked() {
        // Overlapping thresholds make both rules breach; they share one cooldown slot.
        let thresholds = ThresholdConfig {
            high_temp: 10.0,
            low_temp: 20.0,
            ..ThresholdConfig::default()
        };
        let e = evaluator(thresholds, Arc::new(RecordingPublisher::default()));
        let now = Utc::now();
        let mut s = calm(now);
        s.temperature = Some(15.0);

        let labels: Vec<_> = e.breaches(&s).into_iter().map(|b| b.label).collect();
        assert_eq!(labels, vec!["Heat Warning", "Cold Warning"]);
        assert_eq!(e.evaluate_at(&location(), &s, now).len(), 1);
    }

    #[test]
    fn test_precipitation_source_is_configurable() {
        let now = Utc::now();
        let mut s = calm(now);
        s.precipitation = None;
        s.cloud_coverage = Some(90.0);

        let by_volume = evaluator(ThresholdConfig::default(), Arc::new(RecordingPublisher::default()));
        assert!(by_volume.breaches(&s).is_empty());

        let by_clouds = evaluator(
            ThresholdConfig {
                precipitation_source: PrecipitationSource::CloudCoverage,
                ..ThresholdConfig::default()
            },
            Arc::new(RecordingPublisher::default()),
        );
        let breaches = by_clouds.breaches(&s);
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].alert_type, AlertType::HeavyPrecipitation);
        assert_eq!(breaches[0].observed, 90.0);
        assert_eq!(breaches[0].severity, Severity::Medium);
    }

    #[test]
    fn test_missing_measurements_never_fire() {
        let e = evaluator(ThresholdConfig::default(), Arc::new(RecordingPublisher::default()));
        let now = Utc::now();
        let s = WeatherSnapshot {
            condition: None,
            temperature: None,
            high_temp: None,
            low_temp: None,
            cloud_coverage: None,
            wind_speed: None,
            precipitation: None,
            fetched_at: now,
        };
        assert!(e.evaluate_at(&location(), &s, now).is_empty());
    }

    #[test]
    fn test_cooldown_window_scenario() {
        let publisher = Arc::new(RecordingPublisher::default());
        let e = evaluator(ThresholdConfig::default(), publisher.clone());
        let loc = location();
        let t0 = Utc::now();
        let mut s = calm(t0);
        s.wind_speed = Some(27.0);

        assert_eq!(e.evaluate_at(&loc, &s, t0).len(), 1);
        assert!(e.evaluate_at(&loc, &s, t0 + chrono::Duration::minutes(30)).is_empty());
        assert_eq!(e.evaluate_at(&loc, &s, t0 + chrono::Duration::minutes(61)).len(), 1);
        assert_eq!(publisher.published().len(), 2);
    }

    #[test]
    fn test_publish_failure_keeps_cooldown() {
        let publisher = Arc::new(RecordingPublisher::failing());
        let thresholds = ThresholdConfig {
            cooldown: Duration::from_secs(600),
            ..ThresholdConfig::default()
        };
        let e = evaluator(thresholds, publisher.clone());
        let loc = location();
        let t0 = Utc::now();
        let mut s = calm(t0);
        s.wind_speed = Some(22.0);

        assert_eq!(e.evaluate_at(&loc, &s, t0).len(), 1);
        assert!(e.evaluate_at(&loc, &s, t0 + chrono::Duration::minutes(1)).is_empty());
        assert!(publisher.published().is_empty());
    }
}
