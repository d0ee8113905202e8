use crate::models::location::LocationKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Current conditions for one place. Replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub condition: Option<String>,
    pub temperature: Option<f64>,
    pub high_temp: Option<f64>,
    pub low_temp: Option<f64>,
    pub cloud_coverage: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

/// A cache row: the latest snapshot for a key and when it goes stale.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedWeather {
    pub key: LocationKey,
    pub snapshot: WeatherSnapshot,
    pub expires_at: DateTime<Utc>,
    pub source: String,
}

impl CachedWeather {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Whether this entry may replace `existing`. An older fetch that
    /// finishes late never overwrites a newer one; the upsert query applies
    /// the same rule.
    pub fn supersedes(&self, existing: &CachedWeather) -> bool {
        self.snapshot.fetched_at >= existing.snapshot.fetched_at
    }
}

#[derive(Debug, FromRow)]
pub struct CachedWeatherRow {
    pub city: String,
    pub region: String,
    pub country: String,
    pub condition: Option<String>,
    pub temperature: Option<f64>,
    pub high_temp: Option<f64>,
    pub low_temp: Option<f64>,
    pub cloud_coverage: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation: Option<f64>,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub source: String,
}

impl From<CachedWeatherRow> for CachedWeather {
    fn from(row: CachedWeatherRow) -> Self {
        Self {
            key: LocationKey::new(&row.city, &row.region, &row.country),
            snapshot: WeatherSnapshot {
                condition: row.condition,
                temperature: row.temperature,
                high_temp: row.high_temp,
                low_temp: row.low_temp,
                cloud_coverage: row.cloud_coverage,
                wind_speed: row.wind_speed,
                precipitation: row.precipitation,
                fetched_at: row.fetched_at,
            },
            expires_at: row.expires_at,
            source: row.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::snapshot_at;

    fn entry(fetched_at: DateTime<Utc>) -> CachedWeather {
        CachedWeather {
            key: LocationKey::new("Peoria", "IL", "US"),
            snapshot: snapshot_at(fetched_at, 10.0),
            expires_at: fetched_at + chrono::Duration::minutes(5),
            source: "OPENWEATHER".to_string(),
        }
    }

    #[test]
    fn test_fresh_until_expiry() {
        let t0 = Utc::now();
        let e = entry(t0);
        assert!(e.is_fresh(t0));
        assert!(e.is_fresh(t0 + chrono::Duration::seconds(299)));
        assert!(!e.is_fresh(t0 + chrono::Duration::minutes(5)));
    }

    #[test]
    fn test_older_fetch_does_not_supersede() {
        let t1 = Utc::now();
        let t0 = t1 - chrono::Duration::minutes(1);

        assert!(!entry(t0).supersedes(&entry(t1)));
        assert!(entry(t1).supersedes(&entry(t0)));
        assert!(entry(t1).supersedes(&entry(t1)));
    }
}
