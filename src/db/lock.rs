use crate::config::to_chrono;
use crate::db::{queries, DbPool};
use crate::error::AlertResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// A held sweep lock. Expires on its own at `locked_until`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lease {
    pub name: String,
    pub holder: String,
    pub locked_at: DateTime<Utc>,
    pub locked_until: DateTime<Utc>,
}

/// Cross-process mutual exclusion with a lease.
#[async_trait]
pub trait SweepLock: Send + Sync {
    /// Returns `None` while another holder's lease is still running.
    async fn try_acquire(
        &self,
        name: &str,
        lock_at_most: Duration,
        now: DateTime<Utc>,
    ) -> AlertResult<Option<Lease>>;

    /// Shortens the lease to `max(now, locked_at + lock_at_least)`.
    async fn release(&self, lease: &Lease, lock_at_least: Duration, now: DateTime<Utc>) -> AlertResult<()>;
}

pub fn release_deadline(lease: &Lease, lock_at_least: Duration, now: DateTime<Utc>) -> DateTime<Utc> {
    (lease.locked_at + to_chrono(lock_at_least)).max(now)
}

pub struct PgSweepLock {
    pool: DbPool,
    holder: String,
}

impl PgSweepLock {
    pub fn new(pool: DbPool, holder: impl Into<String>) -> Self {
        Self {
            pool,
            holder: holder.into(),
        }
    }
}

#[async_trait]
impl SweepLock for PgSweepLock {
    async fn try_acquire(
        &self,
        name: &str,
        lock_at_most: Duration,
        now: DateTime<Utc>,
    ) -> AlertResult<Option<Lease>> {
        let locked_until = now + to_chrono(lock_at_most);
        let acquired = sqlx::query(queries::ACQUIRE_LOCK)
            .bind(name)
            .bind(locked_until)
            .bind(now)
            .bind(&self.holder)
            .fetch_optional(&self.pool)
            .await?;

        if acquired.is_none() {
            debug!("Lock {} is held elsewhere", name);
            return Ok(None);
        }

        Ok(Some(Lease {
            name: name.to_string(),
            holder: self.holder.clone(),
            locked_at: now,
            locked_until,
        }))
    }

    async fn release(&self, lease: &Lease, lock_at_least: Duration, now: DateTime<Utc>) -> AlertResult<()> {
        sqlx::query(queries::RELEASE_LOCK)
            .bind(&lease.name)
            .bind(release_deadline(lease, lock_at_least, now))
            .bind(&lease.holder)
            .bind(lease.locked_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
