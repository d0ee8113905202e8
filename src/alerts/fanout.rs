use crate::alerts::directory::UserDirectory;
use crate::db::alert_store::AlertRecordStore;
use crate::error::AlertResult;
use crate::models::alert::{AlertTrigger, UserAlertRecord};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Turns one trigger into one stored alert per affected user.
pub struct FanoutAggregator {
    directory: Arc<dyn UserDirectory>,
    store: Arc<dyn AlertRecordStore>,
}

impl FanoutAggregator {
    pub fn new(directory: Arc<dyn UserDirectory>, store: Arc<dyn AlertRecordStore>) -> Self {
        Self { directory, store }
    }

    /// Resolves favorited and resident users, dedups them and stores the
    /// records in one batch. A failed directory lookup counts as no users
    /// from that source, so the other source is still alerted. A failed
    /// write is returned to the caller.
    pub async fn on_trigger(&self, trigger: &AlertTrigger) -> AlertResult<usize> {
        info!(
            "Processing {} alert {} for {}",
            trigger.alert_type, trigger.id, trigger.location_key
        );

        let (favorited, residents) = tokio::join!(
            self.directory.users_favoriting_location(trigger.location_id),
            self.directory.users_residing_at(&trigger.location_key),
        );

        let favorited = favorited.unwrap_or_else(|e| {
            error!("Favorites lookup for {} failed: {}", trigger.location_id, e);
            Vec::new()
        });
        let residents = residents.unwrap_or_else(|e| {
            error!("Residents lookup for {} failed: {}", trigger.location_key, e);
            Vec::new()
        });

        let users: BTreeSet<i64> = favorited.into_iter().chain(residents).collect();
        if users.is_empty() {
            info!("No users to alert for {}", trigger.location_key);
            return Ok(0);
        }

        let created_at = Utc::now();
        let records: Vec<UserAlertRecord> = users
            .iter()
            .map(|user_id| UserAlertRecord::from_trigger(trigger, *user_id, created_at))
            .collect();

        let inserted = self.store.insert_batch(&records).await?;
        info!("Stored alerts for {} users ({} new)", records.len(), inserted);
        if (inserted as usize) < records.len() {
            debug!("Trigger {} was delivered before; duplicates skipped", trigger.id);
        }
        Ok(records.len())
    }

    /// A user's alerts, newest first.
    pub async fn user_alerts(&self, user_id: i64) -> AlertResult<Vec<UserAlertRecord>> {
        self.store.user_alerts(user_id).await
    }
}
