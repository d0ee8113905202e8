//! In-memory collaborators for unit tests.

use crate::alerts::directory::UserDirectory;
use crate::channel::AlertPublisher;
use crate::db::alert_store::AlertRecordStore;
use crate::db::location_store::LocationStore;
use crate::db::lock::{release_deadline, Lease, SweepLock};
use crate::db::weather_store::WeatherCacheStore;
use crate::error::{AlertError, AlertResult};
use crate::models::alert::{AlertTrigger, AlertType, Severity, UserAlertRecord};
use crate::models::location::{Location, LocationKey, LocationUpdate};
use crate::models::weather::{CachedWeather, WeatherSnapshot};
use crate::weather::source::WeatherSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

pub fn snapshot_at(fetched_at: DateTime<Utc>, wind_speed: f64) -> WeatherSnapshot {
    WeatherSnapshot {
        condition: Some("clear sky".to_string()),
        temperature: Some(20.0),
        high_temp: Some(22.0),
        low_temp: Some(15.0),
        cloud_coverage: Some(40.0),
        wind_speed: Some(wind_speed),
        precipitation: None,
        fetched_at,
    }
}

pub fn sample_trigger() -> AlertTrigger {
    AlertTrigger {
        id: Uuid::new_v4(),
        location_id: Uuid::new_v4(),
        location_key: LocationKey::new("Peoria", "IL", "US"),
        alert_type: AlertType::HighWind,
        condition_label: "High Wind Warning".to_string(),
        observed_value: 32.0,
        threshold_value: 20.0,
        severity: Severity::Severe,
        triggered_at: Utc::now(),
    }
}

#[derive(Default)]
pub struct MemoryWeatherStore {
    rows: Mutex<HashMap<LocationKey, CachedWeather>>,
    fail_writes: AtomicBool,
}

impl MemoryWeatherStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, key: &LocationKey) -> Option<CachedWeather> {
        self.rows.lock().unwrap().get(key).cloned()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl WeatherCacheStore for MemoryWeatherStore {
    async fn find(&self, key: &LocationKey) -> AlertResult<Option<CachedWeather>> {
        Ok(self.get(key))
    }

    async fn upsert(&self, entry: &CachedWeather) -> AlertResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AlertError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&entry.key) {
            Some(existing) if !entry.supersedes(existing) => {}
            _ => {
                rows.insert(entry.key.clone(), entry.clone());
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct ScriptedSource {
    queue: Mutex<VecDeque<AlertResult<WeatherSnapshot>>>,
    default: Mutex<Option<WeatherSnapshot>>,
    failing: Mutex<HashSet<LocationKey>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn push_ok(&self, snapshot: WeatherSnapshot) {
        self.queue.lock().unwrap().push_back(Ok(snapshot));
    }

    pub fn push_err(&self, reason: &str) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Err(AlertError::SourceTransient(reason.to_string())));
    }

    pub fn set_default(&self, snapshot: WeatherSnapshot) {
        *self.default.lock().unwrap() = Some(snapshot);
    }

    pub fn fail_for(&self, key: &LocationKey) {
        self.failing.lock().unwrap().insert(key.clone());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for ScriptedSource {
    async fn fetch(&self, key: &LocationKey) -> AlertResult<WeatherSnapshot> {
        // Suspend like a network call would, so concurrent callers interleave.
        tokio::task::yield_now().await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(key) {
            return Err(AlertError::SourceTransient(format!("no data for {}", key)));
        }
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            return next;
        }
        self.default
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AlertError::SourceTransient("nothing scripted".to_string()))
    }

    fn name(&self) -> &str {
        "SCRIPTED"
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<AlertTrigger>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn published(&self) -> Vec<AlertTrigger> {
        self.published.lock().unwrap().clone()
    }
}

impl AlertPublisher for RecordingPublisher {
    fn publish(&self, trigger: &AlertTrigger) -> AlertResult<()> {
        if self.fail {
            return Err(AlertError::PublishFailed("broker unreachable".to_string()));
        }
        self.published.lock().unwrap().push(trigger.clone());
        Ok(())
    }
}

pub struct StaticDirectory {
    favorites: Vec<i64>,
    residents: Vec<i64>,
    fail_favorites: bool,
    fail_residents: bool,
}

impl StaticDirectory {
    pub fn new(favorites: Vec<i64>, residents: Vec<i64>) -> Self {
        Self {
            favorites,
            residents,
            fail_favorites: false,
            fail_residents: false,
        }
    }

    pub fn failing_favorites(mut self) -> Self {
        self.fail_favorites = true;
        self
    }

    pub fn failing_residents(mut self) -> Self {
        self.fail_residents = true;
        self
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn users_favoriting_location(&self, _location_id: Uuid) -> AlertResult<Vec<i64>> {
        if self.fail_favorites {
            return Err(AlertError::DirectoryLookupFailed("favorites unavailable".to_string()));
        }
        Ok(self.favorites.clone())
    }

    async fn users_residing_at(&self, _key: &LocationKey) -> AlertResult<Vec<i64>> {
        if self.fail_residents {
            return Err(AlertError::DirectoryLookupFailed("user service down".to_string()));
        }
        Ok(self.residents.clone())
    }
}

#[derive(Default)]
pub struct MemoryAlertStore {
    records: Mutex<Vec<UserAlertRecord>>,
    batches: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryAlertStore {
    pub fn records(&self) -> Vec<UserAlertRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AlertRecordStore for MemoryAlertStore {
    async fn insert_batch(&self, records: &[UserAlertRecord]) -> AlertResult<u64> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AlertError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut stored = self.records.lock().unwrap();
        let mut inserted = 0;
        for record in records {
            let exists = stored
                .iter()
                .any(|r| r.trigger_id == record.trigger_id && r.user_id == record.user_id);
            if !exists {
                stored.push(record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn user_alerts(&self, user_id: i64) -> AlertResult<Vec<UserAlertRecord>> {
        let mut alerts: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }
}

#[derive(Default)]
pub struct MemoryLocationStore {
    locations: Mutex<Vec<Location>>,
}

impl MemoryLocationStore {
    pub fn insert(&self, key: LocationKey) -> Location {
        let location = Location {
            id: Uuid::new_v4(),
            key,
            name: None,
        };
        self.locations.lock().unwrap().push(location.clone());
        location
    }
}

#[async_trait]
impl LocationStore for MemoryLocationStore {
    async fn list_locations(&self) -> AlertResult<Vec<Location>> {
        Ok(self.locations.lock().unwrap().clone())
    }

    async fn create_location(&self, key: LocationKey, name: Option<String>) -> AlertResult<Location> {
        key.validate()?;
        let mut locations = self.locations.lock().unwrap();
        if locations.iter().any(|l| l.key == key) {
            return Err(AlertError::DuplicateLocation(key));
        }
        let location = Location {
            id: Uuid::new_v4(),
            key,
            name,
        };
        locations.push(location.clone());
        Ok(location)
    }

    async fn find_or_create_location(&self, key: LocationKey) -> AlertResult<Location> {
        let existing = self
            .locations
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.key == key)
            .cloned();
        if let Some(existing) = existing {
            return Ok(existing);
        }
        self.create_location(key, None).await
    }

    async fn update_location(&self, id: Uuid, updates: &[LocationUpdate]) -> AlertResult<Location> {
        let mut locations = self.locations.lock().unwrap();
        let mut location = locations
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(AlertError::LocationNotFound(id))?;
        location.apply(updates)?;
        if locations.iter().any(|l| l.id != id && l.key == location.key) {
            return Err(AlertError::DuplicateLocation(location.key));
        }
        for l in locations.iter_mut().filter(|l| l.id == id) {
            *l = location.clone();
        }
        Ok(location)
    }
}

#[derive(Default)]
pub struct MemoryLock {
    leases: Mutex<HashMap<String, Lease>>,
    holder_seq: AtomicUsize,
}

impl MemoryLock {
    pub fn hold(&self, name: &str, holder: &str, for_duration: Duration) {
        let now = Utc::now();
        self.leases.lock().unwrap().insert(
            name.to_string(),
            Lease {
                name: name.to_string(),
                holder: holder.to_string(),
                locked_at: now,
                locked_until: now + crate::config::to_chrono(for_duration),
            },
        );
    }
}

#[async_trait]
impl SweepLock for MemoryLock {
    async fn try_acquire(
        &self,
        name: &str,
        lock_at_most: Duration,
        now: DateTime<Utc>,
    ) -> AlertResult<Option<Lease>> {
        let mut leases = self.leases.lock().unwrap();
        if let Some(current) = leases.get(name) {
            if current.locked_until > now {
                return Ok(None);
            }
        }
        let holder = format!("test-{}", self.holder_seq.fetch_add(1, Ordering::SeqCst));
        let lease = Lease {
            name: name.to_string(),
            holder,
            locked_at: now,
            locked_until: now + crate::config::to_chrono(lock_at_most),
        };
        leases.insert(name.to_string(), lease.clone());
        Ok(Some(lease))
    }

    async fn release(&self, lease: &Lease, lock_at_least: Duration, now: DateTime<Utc>) -> AlertResult<()> {
        let mut leases = self.leases.lock().unwrap();
        if let Some(current) = leases.get_mut(&lease.name) {
            if current.holder == lease.holder && current.locked_at == lease.locked_at {
                current.locked_until = release_deadline(lease, lock_at_least, now);
            }
        }
        Ok(())
    }
}
