use crate::alerts::fanout::FanoutAggregator;
use crate::error::AlertError;
use crate::models::wire::decode_trigger;
use tracing::{info, warn};

/// Decodes one alert event from the topic and fans it out.
///
/// Undecodable payloads are logged and dropped so a poison message cannot
/// stall the consumer.
pub async fn process_message(fanout: &FanoutAggregator, payload: &[u8]) -> anyhow::Result<()> {
    let trigger = match decode_trigger(payload) {
        Ok(t) => t,
        Err(e @ (AlertError::Decode(_) | AlertError::MalformedEvent(_))) => {
            warn!("Failed to parse alert event: {}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let delivered = fanout.on_trigger(&trigger).await?;
    info!(
        "Alert event {} for {} reached {} users",
        trigger.id, trigger.location_key, delivered
    );

    Ok(())
}
