use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which processing stages this process runs.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    All,
    Poller,
    Fanout,
}

impl ServiceRole {
    pub fn runs_poller(self) -> bool {
        matches!(self, ServiceRole::All | ServiceRole::Poller)
    }

    pub fn runs_fanout(self) -> bool {
        matches!(self, ServiceRole::All | ServiceRole::Fanout)
    }
}

impl FromStr for ServiceRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(ServiceRole::All),
            "poller" => Ok(ServiceRole::Poller),
            "fanout" => Ok(ServiceRole::Fanout),
            other => anyhow::bail!("unknown SERVICE_ROLE '{}'", other),
        }
    }
}

/// Transport used between the threshold evaluator and the fan-out side.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Kafka,
    Memory,
}

impl FromStr for ChannelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "kafka" => Ok(ChannelKind::Kafka),
            "memory" => Ok(ChannelKind::Memory),
            other => anyhow::bail!("unknown ALERT_CHANNEL '{}'", other),
        }
    }
}

/// Measurement compared against the precipitation threshold.
///
/// Some deployments never receive rain/snow volumes from the provider and use
/// cloud coverage instead, so both are kept selectable.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrecipitationSource {
    Precipitation,
    CloudCoverage,
}

impl FromStr for PrecipitationSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "precipitation" => Ok(PrecipitationSource::Precipitation),
            "cloud_coverage" | "clouds" => Ok(PrecipitationSource::CloudCoverage),
            other => anyhow::bail!("unknown WEATHER_PRECIPITATION_SOURCE '{}'", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdConfig {
    pub wind_speed: f64,
    pub high_temp: f64,
    pub low_temp: f64,
    pub precipitation: f64,
    pub precipitation_source: PrecipitationSource,
    pub cooldown: Duration,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            wind_speed: 20.0,
            high_temp: 35.0,
            low_temp: -10.0,
            precipitation: 50.0,
            precipitation_source: PrecipitationSource::Precipitation,
            cooldown: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub lock_name: String,
    pub lock_at_most: Duration,
    pub lock_at_least: Duration,
    pub workers: usize,
    pub instance_id: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            lock_name: "checkWeatherForAlerts".to_string(),
            lock_at_most: Duration::from_secs(10 * 60),
            lock_at_least: Duration::from_secs(30),
            workers: 8,
            instance_id: "weather-alerts".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service_role: ServiceRole,
    pub alert_channel: ChannelKind,
    pub kafka_bootstrap_servers: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,
    pub kafka_auto_offset_reset: String,
    pub kafka_sasl_mechanism: String,
    pub kafka_username: String,
    pub kafka_password: String,
    pub kafka_security_protocol: String,
    pub kafka_max_retries: u32,
    pub kafka_circuit_breaker_cooldown: u64,
    pub fanout_max_in_flight: u32,
    pub database_url: String,
    pub log_level: String,
    pub weather_api_url: String,
    pub weather_api_key: String,
    pub weather_ttl: Duration,
    pub user_service_url: String,
    pub http_timeout: Duration,
    pub thresholds: ThresholdConfig,
    pub poll: PollConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let service_role = env::var("SERVICE_ROLE")
            .unwrap_or_else(|_| "all".to_string())
            .parse()?;
        let alert_channel = env::var("ALERT_CHANNEL")
            .unwrap_or_else(|_| "kafka".to_string())
            .parse()?;

        let kafka_bootstrap_servers =
            env::var("KAFKA_BOOTSTRAP_SERVERS").unwrap_or_else(|_| "localhost:9092".to_string());
        let kafka_topic = env::var("KAFKA_TOPIC").unwrap_or_else(|_| "weatherAlerts".to_string());
        let kafka_group_id =
            env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "weather-alerts-fanout".to_string());
        let kafka_auto_offset_reset =
            env::var("KAFKA_AUTO_OFFSET_RESET").unwrap_or_else(|_| "earliest".to_string());
        let kafka_sasl_mechanism =
            env::var("KAFKA_SASL_MECHANISM").unwrap_or_else(|_| "SCRAM-SHA-256".to_string());
        let kafka_username = env::var("KAFKA_USERNAME").unwrap_or_default();
        let kafka_password = env::var("KAFKA_PASSWORD").unwrap_or_default();
        let kafka_security_protocol =
            env::var("KAFKA_SECURITY_PROTOCOL").unwrap_or_else(|_| "SASL_PLAINTEXT".to_string());
        let kafka_max_retries = env_parse("KAFKA_MAX_RETRIES", 5);
        let kafka_circuit_breaker_cooldown = env_parse("KAFKA_CIRCUIT_BREAKER_COOLDOWN", 300);
        let fanout_max_in_flight = env_parse("FANOUT_MAX_IN_FLIGHT", 32);

        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "weather_alerts".to_string());
        let db_user = env::var("DB_USER").unwrap_or_else(|_| "weather".to_string());
        let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "weather".to_string());

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let weather_api_url = env::var("WEATHER_API_URL")
            .unwrap_or_else(|_| "https://api.openweathermap.org".to_string());
        let weather_api_key = env::var("WEATHER_API_KEY").unwrap_or_default();
        let weather_ttl = env_minutes("WEATHER_TTL_MINUTES", 5);
        let user_service_url =
            env::var("USER_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8081".to_string());
        let http_timeout = Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", 10));

        let defaults = ThresholdConfig::default();
        let thresholds = ThresholdConfig {
            wind_speed: env_parse("WEATHER_THRESHOLD_WIND_SPEED", defaults.wind_speed),
            high_temp: env_parse("WEATHER_THRESHOLD_HIGH_TEMP", defaults.high_temp),
            low_temp: env_parse("WEATHER_THRESHOLD_LOW_TEMP", defaults.low_temp),
            precipitation: env_parse("WEATHER_THRESHOLD_PRECIPITATION", defaults.precipitation),
            precipitation_source: env::var("WEATHER_PRECIPITATION_SOURCE")
                .ok()
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(defaults.precipitation_source),
            cooldown: env_minutes("ALERT_COOLDOWN_MINUTES", 60),
        };

        let poll_defaults = PollConfig::default();
        let poll = PollConfig {
            interval: Duration::from_secs(env_parse("POLL_INTERVAL_SECS", 300)),
            lock_name: env::var("POLL_LOCK_NAME").unwrap_or(poll_defaults.lock_name),
            lock_at_most: Duration::from_secs(env_parse("POLL_LOCK_AT_MOST_SECS", 600)),
            lock_at_least: Duration::from_secs(env_parse("POLL_LOCK_AT_LEAST_SECS", 30)),
            workers: env_parse("POLL_WORKERS", poll_defaults.workers).max(1),
            instance_id: env::var("INSTANCE_ID")
                .or_else(|_| env::var("HOSTNAME"))
                .unwrap_or(poll_defaults.instance_id),
        };

        Ok(Self {
            service_role,
            alert_channel,
            kafka_bootstrap_servers,
            kafka_topic,
            kafka_group_id,
            kafka_auto_offset_reset,
            kafka_sasl_mechanism,
            kafka_username,
            kafka_password,
            kafka_security_protocol,
            kafka_max_retries,
            kafka_circuit_breaker_cooldown,
            fanout_max_in_flight,
            database_url,
            log_level,
            weather_api_url,
            weather_api_key,
            weather_ttl,
            user_service_url,
            http_timeout,
            thresholds,
            poll,
        })
    }
}

/// Converts a configured duration for timestamp arithmetic, saturating at
/// about a century.
pub fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_minutes(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_parse(key, default).saturating_mul(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("ALL".parse::<ServiceRole>().unwrap(), ServiceRole::All);
        assert_eq!(" fanout ".parse::<ServiceRole>().unwrap(), ServiceRole::Fanout);
        assert!(ServiceRole::Poller.runs_poller());
        assert!(!ServiceRole::Poller.runs_fanout());
        assert!("both".parse::<ServiceRole>().is_err());
    }

    #[test]
    fn test_precipitation_source_parsing() {
        assert_eq!(
            "cloud_coverage".parse::<PrecipitationSource>().unwrap(),
            PrecipitationSource::CloudCoverage
        );
        assert_eq!(
            "Precipitation".parse::<PrecipitationSource>().unwrap(),
            PrecipitationSource::Precipitation
        );
    }

    #[test]
    fn test_reference_thresholds() {
        let t = ThresholdConfig::default();
        assert_eq!(t.wind_speed, 20.0);
        assert_eq!(t.high_temp, 35.0);
        assert_eq!(t.low_temp, -10.0);
        assert_eq!(t.precipitation, 50.0);
        assert_eq!(t.cooldown, Duration::from_secs(3600));
    }

    #[test]
    fn test_minutes_saturate_instead_of_overflowing() {
        env::set_var("WEATHER_ALERTS_TEST_HUGE_MINUTES", u64::MAX.to_string());
        assert_eq!(
            env_minutes("WEATHER_ALERTS_TEST_HUGE_MINUTES", 5),
            Duration::from_secs(u64::MAX)
        );

        env::set_var("WEATHER_ALERTS_TEST_MINUTES", "7");
        assert_eq!(env_minutes("WEATHER_ALERTS_TEST_MINUTES", 5), Duration::from_secs(420));
        assert_eq!(env_minutes("WEATHER_ALERTS_TEST_UNSET_MINUTES", 5), Duration::from_secs(300));
    }
}
