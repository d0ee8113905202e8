use crate::db::{queries, DbPool};
use crate::error::AlertResult;
use crate::models::alert::{UserAlertRecord, UserAlertRow};
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use tracing::warn;

// 10 binds per row keeps a chunk well under the postgres bind limit.
const INSERT_CHUNK: usize = 1000;

/// Append-only store of per-user alert deliveries.
#[async_trait]
pub trait AlertRecordStore: Send + Sync {
    /// Writes all records in one transaction. Records already stored for the
    /// same (trigger, user) pair are skipped; returns how many were new.
    async fn insert_batch(&self, records: &[UserAlertRecord]) -> AlertResult<u64>;

    /// A user's alerts, newest first.
    async fn user_alerts(&self, user_id: i64) -> AlertResult<Vec<UserAlertRecord>>;
}

pub struct PgAlertStore {
    pool: DbPool,
}

impl PgAlertStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRecordStore for PgAlertStore {
    async fn insert_batch(&self, records: &[UserAlertRecord]) -> AlertResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in records.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(queries::INSERT_USER_ALERTS_PREFIX);
            qb.push_values(chunk, |mut b, record| {
                b.push_bind(record.trigger_id)
                    .push_bind(record.user_id)
                    .push_bind(record.location_id)
                    .push_bind(record.location_key.city().to_string())
                    .push_bind(record.location_key.region().to_string())
                    .push_bind(record.location_key.country().to_string())
                    .push_bind(record.alert_type.as_str())
                    .push_bind(record.message.clone())
                    .push_bind(record.severity.as_str())
                    .push_bind(record.created_at);
            });
            qb.push(queries::INSERT_USER_ALERTS_SUFFIX);

            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn user_alerts(&self, user_id: i64) -> AlertResult<Vec<UserAlertRecord>> {
        let rows = sqlx::query_as::<_, UserAlertRow>(queries::SELECT_USER_ALERTS)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match UserAlertRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable alert row for user {}: {}", user_id, e);
                    None
                }
            })
            .collect())
    }
}
