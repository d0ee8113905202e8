use crate::db::{queries, DbPool};
use crate::error::AlertResult;
use crate::models::location::LocationKey;
use crate::models::weather::{CachedWeather, CachedWeatherRow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Persistent weather cache: one row per location key.
#[async_trait]
pub trait WeatherCacheStore: Send + Sync {
    /// Returns the row for `key` whether or not it has expired.
    async fn find(&self, key: &LocationKey) -> AlertResult<Option<CachedWeather>>;

    /// Inserts the row, or replaces it in place unless the stored fetch is newer.
    async fn upsert(&self, entry: &CachedWeather) -> AlertResult<()>;

    async fn find_fresh(
        &self,
        key: &LocationKey,
        now: DateTime<Utc>,
    ) -> AlertResult<Option<CachedWeather>> {
        Ok(self.find(key).await?.filter(|row| row.is_fresh(now)))
    }
}

pub struct PgWeatherStore {
    pool: DbPool,
}

impl PgWeatherStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WeatherCacheStore for PgWeatherStore {
    async fn find(&self, key: &LocationKey) -> AlertResult<Option<CachedWeather>> {
        let row = sqlx::query_as::<_, CachedWeatherRow>(queries::SELECT_CACHED_WEATHER)
            .bind(key.city())
            .bind(key.region())
            .bind(key.country())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CachedWeather::from))
    }

    async fn upsert(&self, entry: &CachedWeather) -> AlertResult<()> {
        let s = &entry.snapshot;
        sqlx::query(queries::UPSERT_CACHED_WEATHER)
            .bind(entry.key.city())
            .bind(entry.key.region())
            .bind(entry.key.country())
            .bind(s.condition.as_deref())
            .bind(s.temperature)
            .bind(s.high_temp)
            .bind(s.low_temp)
            .bind(s.cloud_coverage)
            .bind(s.wind_speed)
            .bind(s.precipitation)
            .bind(s.fetched_at)
            .bind(entry.expires_at)
            .bind(&entry.source)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
