//! Per-location, per-alert-type cooldown bookkeeping.
//!
//! The ledger lives only in memory. A restart starts it empty, which can let
//! one burst of repeat alerts through, bounded by a single cooldown window.

use crate::config::to_chrono;
use crate::models::alert::AlertType;
use crate::models::location::LocationKey;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug)]
pub struct CooldownLedger {
    cooldown: Duration,
    last_sent: DashMap<LocationKey, HashMap<AlertType, DateTime<Utc>>>,
}

impl CooldownLedger {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_sent: DashMap::new(),
        }
    }

    /// Records `now` as the last send for the pair unless the previous send
    /// is still inside the cooldown window. Check and record happen under the
    /// same shard lock, so concurrent callers cannot both claim.
    pub fn try_claim(&self, key: &LocationKey, alert_type: AlertType, now: DateTime<Utc>) -> bool {
        let mut per_type = self.last_sent.entry(key.clone()).or_default();
        if let Some(last) = per_type.get(&alert_type) {
            if now < *last + to_chrono(self.cooldown) {
                return false;
            }
        }
        per_type.insert(alert_type, now);
        true
    }

    #[cfg(test)]
    pub fn last_sent(&self, key: &LocationKey, alert_type: AlertType) -> Option<DateTime<Utc>> {
        self.last_sent
            .get(key)
            .and_then(|per_type| per_type.get(&alert_type).copied())
    }

    #[cfg(test)]
    pub fn clear(&self) {
        self.last_sent.clear();
    }
}
