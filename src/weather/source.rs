use crate::error::{AlertError, AlertResult};
use crate::models::location::LocationKey;
use crate::models::weather::WeatherSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Upstream provider of current conditions.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, key: &LocationKey) -> AlertResult<WeatherSnapshot>;

    /// Stored alongside cache rows.
    fn name(&self) -> &str;
}

/// Client for an OpenWeather-compatible `/data/2.5/weather` endpoint.
pub struct OpenWeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> AlertResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch(&self, key: &LocationKey) -> AlertResult<WeatherSnapshot> {
        let query = format!("{},{},{}", key.city(), key.region(), key.country());
        debug!("Fetching weather for {}", query);

        let response = self
            .http
            .get(format!("{}/data/2.5/weather", self.base_url))
            .query(&[
                ("q", query.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| AlertError::SourceTransient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::SourceTransient(format!(
                "provider returned {} for {}",
                status, key
            )));
        }

        let body: ProviderResponse = response
            .json()
            .await
            .map_err(|e| AlertError::SourceTransient(e.to_string()))?;

        Ok(body.into_snapshot(Utc::now()))
    }

    fn name(&self) -> &str {
        "OPENWEATHER"
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderResponse {
    #[serde(default)]
    pub weather: Vec<ProviderCondition>,
    pub main: Option<ProviderMain>,
    pub wind: Option<ProviderWind>,
    pub clouds: Option<ProviderClouds>,
    pub rain: Option<ProviderVolume>,
    pub snow: Option<ProviderVolume>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderCondition {
    pub main: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderMain {
    pub temp: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderWind {
    pub speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderClouds {
    pub all: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderVolume {
    #[serde(rename = "1h")]
    pub one_hour: Option<f64>,
    #[serde(rename = "3h")]
    pub three_hours: Option<f64>,
}

impl ProviderResponse {
    /// Missing sub-objects become `None` fields.
    pub fn into_snapshot(self, fetched_at: DateTime<Utc>) -> WeatherSnapshot {
        let condition = self.weather.into_iter().next().and_then(|w| {
            w.description
                .filter(|d| !d.trim().is_empty())
                .or(w.main)
        });

        let precipitation = self
            .rain
            .as_ref()
            .and_then(|r| r.one_hour)
            .or_else(|| self.snow.as_ref().and_then(|s| s.one_hour))
            .or_else(|| self.rain.as_ref().and_then(|r| r.three_hours).map(|v| v / 3.0))
            .or_else(|| self.snow.as_ref().and_then(|s| s.three_hours).map(|v| v / 3.0));

        WeatherSnapshot {
            condition,
            temperature: self.main.as_ref().and_then(|m| m.temp),
            high_temp: self.main.as_ref().and_then(|m| m.temp_max),
            low_temp: self.main.as_ref().and_then(|m| m.temp_min),
            cloud_coverage: self.clouds.and_then(|c| c.all),
            wind_speed: self.wind.and_then(|w| w.speed),
            precipitation,
            fetched_at,
        }
    }
}
