mod alerts;
mod channel;
mod config;
mod db;
mod error;
mod kafka;
mod models;
mod processor;
mod scheduler;
mod weather;

#[cfg(test)]
mod testing;

use alerts::cooldown::CooldownLedger;
use alerts::directory::HttpUserDirectory;
use alerts::evaluator::ThresholdEvaluator;
use alerts::fanout::FanoutAggregator;
use channel::{AlertPublisher, BroadcastChannel};
use config::{AppConfig, ChannelKind};
use db::alert_store::PgAlertStore;
use db::location_store::{seed_locations, LocationStore, PgLocationStore};
use db::lock::PgSweepLock;
use db::weather_store::PgWeatherStore;
use processor::InFlight;
use scheduler::PollLoop;
use std::sync::Arc;
use tracing::{error, info, warn};
use weather::manager::WeatherCacheManager;
use weather::source::OpenWeatherClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!(
        "Starting Weather Alerts Service (role: {:?}, channel: {:?})...",
        config.service_role, config.alert_channel
    );

    // Init DB
    let pool = db::init_pool(&config.database_url).await?;
    db::init_schema(&pool).await?;
    info!("Connected to database");

    let locations: Arc<dyn LocationStore> = Arc::new(PgLocationStore::new(pool.clone()));
    if let Ok(raw) = std::env::var("SEED_LOCATIONS") {
        let applied = seed_locations(locations.as_ref(), &raw).await;
        info!("Seeded {} locations", applied);
    }

    let broadcast = BroadcastChannel::new(1024);
    let publisher: Arc<dyn AlertPublisher> = match config.alert_channel {
        ChannelKind::Kafka => Arc::new(kafka::KafkaAlertPublisher::new(&config)?),
        ChannelKind::Memory => Arc::new(broadcast.clone()),
    };

    let fanout = Arc::new(FanoutAggregator::new(
        Arc::new(HttpUserDirectory::new(&config.user_service_url, config.http_timeout)?),
        Arc::new(PgAlertStore::new(pool.clone())),
    ));

    // Subscribe before the poller can publish anything.
    if config.service_role.runs_fanout() && config.alert_channel == ChannelKind::Memory {
        tokio::spawn(channel::run_broadcast_consumer(
            broadcast.subscribe(),
            fanout.clone(),
            InFlight::new(config.fanout_max_in_flight),
        ));
    }

    let poller = if config.service_role.runs_poller() {
        let source = OpenWeatherClient::new(
            &config.weather_api_url,
            &config.weather_api_key,
            config.http_timeout,
        )?;
        let weather = Arc::new(WeatherCacheManager::new(
            Arc::new(PgWeatherStore::new(pool.clone())),
            Arc::new(source),
            config.weather_ttl,
        ));
        // Empty on every start; see CooldownLedger.
        let ledger = Arc::new(CooldownLedger::new(config.thresholds.cooldown));
        let evaluator = Arc::new(ThresholdEvaluator::new(
            config.thresholds.clone(),
            ledger,
            publisher.clone(),
        ));
        let lock = Arc::new(PgSweepLock::new(pool.clone(), config.poll.instance_id.clone()));
        let poll = Arc::new(PollLoop::new(
            locations.clone(),
            weather,
            evaluator,
            lock,
            config.poll.clone(),
        ));
        Some(tokio::spawn(poll.run()))
    } else {
        None
    };

    if config.service_role.runs_fanout() && config.alert_channel == ChannelKind::Kafka {
        // Start Kafka
        kafka::start_kafka_consumer(&config, fanout).await?;
    } else if let Some(handle) = poller {
        if let Err(e) = handle.await {
            error!("Poll loop stopped: {}", e);
        }
    } else {
        // Fan-out only, in-process channel: nothing publishes here but keep serving.
        warn!("Fan-out role with in-process channel receives no events from other processes");
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
