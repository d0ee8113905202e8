//! Transport between the threshold evaluator and the fan-out side.

use crate::alerts::fanout::FanoutAggregator;
use crate::error::{AlertError, AlertResult};
use crate::models::alert::AlertTrigger;
use crate::processor::InFlight;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Fire-and-forget publisher. `publish` only hands the event to the
/// transport; delivery failures surface in logs, never to the caller.
pub trait AlertPublisher: Send + Sync {
    fn publish(&self, trigger: &AlertTrigger) -> AlertResult<()>;
}

/// In-process transport for single-node deployments.
#[derive(Clone)]
pub struct BroadcastChannel {
    tx: broadcast::Sender<AlertTrigger>,
}

impl BroadcastChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertTrigger> {
        self.tx.subscribe()
    }
}

impl AlertPublisher for BroadcastChannel {
    fn publish(&self, trigger: &AlertTrigger) -> AlertResult<()> {
        self.tx
            .send(trigger.clone())
            .map(|_| ())
            .map_err(|_| AlertError::PublishFailed("no active alert consumers".to_string()))
    }
}

/// Feeds every received trigger to the aggregator until the channel closes.
pub async fn run_broadcast_consumer(
    mut rx: broadcast::Receiver<AlertTrigger>,
    fanout: Arc<FanoutAggregator>,
    in_flight: InFlight,
) {
    info!("In-process alert consumer started");
    loop {
        match rx.recv().await {
            Ok(trigger) => {
                let fanout = fanout.clone();
                in_flight
                    .spawn(async move {
                        if let Err(e) = fanout.on_trigger(&trigger).await {
                            error!("Error processing alert {}: {}", trigger.id, e);
                        }
                    })
                    .await;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Alert consumer lagged, {} events skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("Alert channel closed, consumer stopping");
                in_flight.drain().await;
                break;
            }
        }
    }
}
