use crate::alerts::fanout::FanoutAggregator;
use crate::channel::AlertPublisher;
use crate::config::AppConfig;
use crate::error::{AlertError, AlertResult};
use crate::models::alert::AlertTrigger;
use crate::models::wire::encode_trigger;
use crate::processor::{alert_processor, InFlight};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

fn client_config(config: &AppConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_bootstrap_servers)
        // SASL Configuration
        .set("security.protocol", &config.kafka_security_protocol)
        .set("sasl.mechanism", &config.kafka_sasl_mechanism)
        .set("sasl.username", &config.kafka_username)
        .set("sasl.password", &config.kafka_password);
    client_config
}

/// Publishes triggers to the alert topic, keyed by location so events for
/// one place land on one partition.
pub struct KafkaAlertPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaAlertPublisher {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let producer: FutureProducer = client_config(config)
            .set("message.timeout.ms", "10000")
            .create()?;
        info!("Kafka producer ready for topic: {}", config.kafka_topic);
        Ok(Self {
            producer,
            topic: config.kafka_topic.clone(),
        })
    }
}

impl AlertPublisher for KafkaAlertPublisher {
    fn publish(&self, trigger: &AlertTrigger) -> AlertResult<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| AlertError::PublishFailed(e.to_string()))?;

        let producer = self.producer.clone();
        let topic = self.topic.clone();
        let key = trigger.location_id.to_string();
        let payload = encode_trigger(trigger);
        let trigger_id = trigger.id;

        // Delivery is awaited off the evaluator's path.
        handle.spawn(async move {
            let record = FutureRecord::to(&topic).key(&key).payload(&payload);
            match producer.send(record, DELIVERY_TIMEOUT).await {
                Ok((partition, offset)) => debug!(
                    "Alert {} delivered to partition {} offset {}",
                    trigger_id, partition, offset
                ),
                Err((e, _)) => error!("Alert {} delivery failed: {}", trigger_id, e),
            }
        });
        Ok(())
    }
}

/// Starts the Kafka consumer with SASL/SCRAM authentication and a circuit breaker mechanism.
///
/// Returns on ctrl-c once the events already handed to fan-out have finished.
pub async fn start_kafka_consumer(config: &AppConfig, fanout: Arc<FanoutAggregator>) -> anyhow::Result<()> {
    info!("Initializing Kafka consumer for topic: {}", config.kafka_topic);

    let consumer: StreamConsumer = client_config(config)
        .set("group.id", &config.kafka_group_id)
        .set("auto.offset.reset", &config.kafka_auto_offset_reset)
        .create()?;

    consumer.subscribe(&[&config.kafka_topic])?;
    info!("Subscribed to topic: {}", config.kafka_topic);

    let mut consecutive_failures = 0;
    let max_retries = config.kafka_max_retries;
    let cooldown_duration = Duration::from_secs(config.kafka_circuit_breaker_cooldown);
    let in_flight = InFlight::new(config.fanout_max_in_flight);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        // Circuit Breaker Check
        if consecutive_failures >= max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {} seconds...",
                consecutive_failures,
                config.kafka_circuit_breaker_cooldown
            );
            tokio::time::sleep(cooldown_duration).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming consumption.");
        }

        let received = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, waiting for {} alert events in flight", in_flight.active());
                break;
            }
            received = consumer.recv() => received,
        };

        match received {
            Ok(m) => {
                consecutive_failures = 0;

                let payload_vec = match m.payload() {
                    None => {
                        warn!("Received empty payload from Kafka");
                        continue;
                    }
                    Some(p) => p.to_vec(),
                };

                let fanout = fanout.clone();

                // Blocks here while every fan-out slot is taken.
                in_flight
                    .spawn(async move {
                        if let Err(e) = alert_processor::process_message(&fanout, &payload_vec).await {
                            error!("Error processing alert event: {}", e);
                        }
                    })
                    .await;
            }
            Err(e) => {
                error!(
                    "Kafka error: {}. Incrementing failure count ({} / {})",
                    e,
                    consecutive_failures + 1,
                    max_retries
                );
                consecutive_failures += 1;

                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    in_flight.drain().await;
    info!("Kafka consumer stopped");
    Ok(())
}
