use crate::alerts::evaluator::ThresholdEvaluator;
use crate::config::{to_chrono, PollConfig};
use crate::db::location_store::LocationStore;
use crate::db::lock::{Lease, SweepLock};
use crate::error::AlertResult;
use crate::models::location::Location;
use crate::weather::manager::WeatherCacheManager;
use chrono::Utc;
use futures::{future, stream, StreamExt};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Outcome of one sweep over the location registry.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SweepReport {
    pub locations: usize,
    pub checked: usize,
    pub failed: usize,
    pub triggers: usize,
}

impl SweepReport {
    /// Locations left unvisited because the lease ran short.
    pub fn deferred(&self) -> usize {
        self.locations - self.checked - self.failed
    }
}

/// Periodic driver: weather for every location, then threshold evaluation.
///
/// Several processes may run this loop; the sweep lock lets one of them
/// sweep per interval.
pub struct PollLoop {
    locations: Arc<dyn LocationStore>,
    weather: Arc<WeatherCacheManager>,
    evaluator: Arc<ThresholdEvaluator>,
    lock: Arc<dyn SweepLock>,
    config: PollConfig,
}

impl PollLoop {
    pub fn new(
        locations: Arc<dyn LocationStore>,
        weather: Arc<WeatherCacheManager>,
        evaluator: Arc<ThresholdEvaluator>,
        lock: Arc<dyn SweepLock>,
        config: PollConfig,
    ) -> Self {
        Self {
            locations,
            weather,
            evaluator,
            lock,
            config,
        }
    }

    pub async fn run(self: Arc<Self>) {
        info!(
            "Poll loop started: every {:?}, {} workers",
            self.config.interval, self.config.workers
        );
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.sweep().await {
                Ok(Some(report)) => info!(
                    "Completed weather alert check: {} of {} locations checked, {} failed, {} deferred, {} alerts",
                    report.checked,
                    report.locations,
                    report.failed,
                    report.deferred(),
                    report.triggers
                ),
                Ok(None) => debug!("Sweep skipped, lock held by another instance"),
                Err(e) => error!("Sweep could not start: {}", e),
            }
        }
    }

    /// Runs one sweep if the lock is free. `None` means another holder has it.
    pub async fn sweep(&self) -> AlertResult<Option<SweepReport>> {
        let lease = match self
            .lock
            .try_acquire(&self.config.lock_name, self.config.lock_at_most, Utc::now())
            .await?
        {
            Some(lease) => lease,
            None => return Ok(None),
        };

        let report = self.sweep_locations(&lease).await;

        if let Err(e) = self
            .lock
            .release(&lease, self.config.lock_at_least, Utc::now())
            .await
        {
            // The lease still expires by itself at locked_until.
            warn!("Releasing lock {} failed: {}", lease.name, e);
        }

        Ok(Some(report))
    }

    async fn sweep_locations(&self, lease: &Lease) -> SweepReport {
        info!("Checking weather conditions for alerts...");
        let locations = match self.locations.list_locations().await {
            Ok(locations) => locations,
            Err(e) => {
                error!("Listing locations failed: {}", e);
                return SweepReport::default();
            }
        };

        let mut report = SweepReport {
            locations: locations.len(),
            ..SweepReport::default()
        };
        let stop_issuing_at = lease.locked_until - to_chrono(self.config.lock_at_most / 10);

        let outcomes: Vec<AlertResult<usize>> = stream::iter(locations)
            .take_while(|_| future::ready(Utc::now() < stop_issuing_at))
            .map(|location| self.check_location(location))
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Ok(fired) => {
                    report.checked += 1;
                    report.triggers += fired;
                }
                Err(_) => report.failed += 1,
            }
        }

        if report.deferred() > 0 {
            warn!(
                "Lock lease nearly expired, {} locations deferred to the next sweep",
                report.deferred()
            );
        }
        report
    }

    async fn check_location(&self, location: Location) -> AlertResult<usize> {
        let snapshot = match self.weather.get_weather(&location.key).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to check weather for {}: {}", location.key, e);
                return Err(e);
            }
        };
        let fired = self.evaluator.evaluate(&location, &snapshot);
        debug!("Weather check complete for location: {}", location.id);
        Ok(fired.len())
    }
}
