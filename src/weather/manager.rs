use crate::config::to_chrono;
use crate::db::weather_store::WeatherCacheStore;
use crate::error::{AlertError, AlertResult};
use crate::models::location::LocationKey;
use crate::models::weather::{CachedWeather, WeatherSnapshot};
use crate::weather::source::WeatherSource;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Serves weather from the cache while it is fresh and refreshes it from the
/// source otherwise. A failed refresh falls back to the last stored row.
pub struct WeatherCacheManager {
    store: Arc<dyn WeatherCacheStore>,
    source: Arc<dyn WeatherSource>,
    ttl: Duration,
}

impl WeatherCacheManager {
    pub fn new(store: Arc<dyn WeatherCacheStore>, source: Arc<dyn WeatherSource>, ttl: Duration) -> Self {
        Self { store, source, ttl }
    }

    pub async fn get_weather(&self, key: &LocationKey) -> AlertResult<WeatherSnapshot> {
        self.get_weather_at(key, Utc::now()).await
    }

    pub async fn get_weather_at(&self, key: &LocationKey, now: DateTime<Utc>) -> AlertResult<WeatherSnapshot> {
        // Callers may hand in a key built from raw input.
        let key = LocationKey::new(key.city(), key.region(), key.country());

        match self.store.find_fresh(&key, now).await {
            Ok(Some(row)) => {
                debug!("Cache hit for {}", key);
                return Ok(row.snapshot);
            }
            Ok(None) => {}
            Err(e) => warn!("Cache read failed for {}, treating as miss: {}", key, e),
        }

        info!("No fresh weather for {}, fetching from {}", key, self.source.name());

        match self.source.fetch(&key).await {
            Ok(snapshot) => {
                let entry = CachedWeather {
                    key: key.clone(),
                    expires_at: snapshot.fetched_at + to_chrono(self.ttl),
                    snapshot,
                    source: self.source.name().to_string(),
                };
                if let Err(e) = self.store.upsert(&entry).await {
                    error!("Failed to store weather for {}: {}", key, e);
                }
                Ok(entry.snapshot)
            }
            Err(fetch_err) => {
                error!("Weather fetch failed for {}: {}", key, fetch_err);
                match self.store.find(&key).await {
                    Ok(Some(stale)) => {
                        warn!(
                            "Serving stale weather for {} fetched at {}",
                            key, stale.snapshot.fetched_at
                        );
                        Ok(stale.snapshot)
                    }
                    Ok(None) => Err(AlertError::WeatherUnavailable(key)),
                    Err(e) => {
                        error!("Stale cache read failed for {}: {}", key, e);
                        Err(AlertError::WeatherUnavailable(key))
                    }
                }
            }
        }
    }
}
