use crate::db::{queries, DbPool};
use crate::error::{AlertError, AlertResult};
use crate::models::location::{Location, LocationKey, LocationRow, LocationUpdate};
use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

/// Registry of the locations the poll loop sweeps.
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn list_locations(&self) -> AlertResult<Vec<Location>>;

    /// Fails with `DuplicateLocation` if the normalized key is already registered.
    async fn create_location(&self, key: LocationKey, name: Option<String>) -> AlertResult<Location>;

    async fn find_or_create_location(&self, key: LocationKey) -> AlertResult<Location>;

    async fn update_location(&self, id: Uuid, updates: &[LocationUpdate]) -> AlertResult<Location>;
}

pub struct PgLocationStore {
    pool: DbPool,
}

impl PgLocationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, key: &LocationKey, name: Option<&str>) -> AlertResult<Option<Location>> {
        let row = sqlx::query_as::<_, LocationRow>(queries::INSERT_LOCATION)
            .bind(Uuid::new_v4())
            .bind(key.city())
            .bind(key.region())
            .bind(key.country())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Location::from))
    }
}

#[async_trait]
impl LocationStore for PgLocationStore {
    async fn list_locations(&self) -> AlertResult<Vec<Location>> {
        let rows = sqlx::query_as::<_, LocationRow>(queries::SELECT_LOCATIONS)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }

    async fn create_location(&self, key: LocationKey, name: Option<String>) -> AlertResult<Location> {
        key.validate()?;
        match self.insert(&key, name.as_deref()).await? {
            Some(location) => {
                info!("Created location {} ({})", location.id, location.key);
                Ok(location)
            }
            None => Err(AlertError::DuplicateLocation(key)),
        }
    }

    async fn find_or_create_location(&self, key: LocationKey) -> AlertResult<Location> {
        key.validate()?;
        if let Some(location) = self.insert(&key, None).await? {
            info!("Created location {} ({})", location.id, location.key);
            return Ok(location);
        }

        let row = sqlx::query_as::<_, LocationRow>(queries::SELECT_LOCATION_BY_KEY)
            .bind(key.city())
            .bind(key.region())
            .bind(key.country())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn update_location(&self, id: Uuid, updates: &[LocationUpdate]) -> AlertResult<Location> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LocationRow>(queries::SELECT_LOCATION_BY_ID_FOR_UPDATE)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut location: Location = row.ok_or(AlertError::LocationNotFound(id))?.into();

        let key_changed = location.apply(updates)?;

        let result = sqlx::query(queries::UPDATE_LOCATION)
            .bind(location.id)
            .bind(location.key.city())
            .bind(location.key.region())
            .bind(location.key.country())
            .bind(location.name.as_deref())
            .execute(&mut *tx)
            .await;

        if let Err(sqlx::Error::Database(db_err)) = &result {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return Err(AlertError::DuplicateLocation(location.key));
            }
        }
        result?;
        tx.commit().await?;

        if key_changed {
            info!("Location {} moved to {}", location.id, location.key);
        }
        Ok(location)
    }
}

/// Registers the locations listed as `City,Region,Country[,Name]` entries
/// separated by `;`. A named entry that already exists is renamed to match.
/// Returns how many entries were applied.
pub async fn seed_locations(store: &dyn LocationStore, raw: &str) -> usize {
    let mut applied = 0;
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(',').map(str::trim).collect();
        let (key, name) = match parts.as_slice() {
            [city, region, country] => (LocationKey::new(city, region, country), None),
            [city, region, country, name] => (
                LocationKey::new(city, region, country),
                Some(*name).filter(|n| !n.is_empty()),
            ),
            _ => {
                warn!("Ignoring malformed location entry '{}'", entry);
                continue;
            }
        };

        match seed_one(store, key, name).await {
            Ok(location) => {
                info!("Seeded location {} ({})", location.key, location.id);
                applied += 1;
            }
            Err(e) => error!("Seeding location '{}' failed: {}", entry, e),
        }
    }
    applied
}

async fn seed_one(store: &dyn LocationStore, key: LocationKey, name: Option<&str>) -> AlertResult<Location> {
    let Some(name) = name else {
        return store.find_or_create_location(key).await;
    };

    match store.create_location(key.clone(), Some(name.to_string())).await {
        Err(AlertError::DuplicateLocation(_)) => {
            let existing = store.find_or_create_location(key).await?;
            if existing.name.as_deref() == Some(name) {
                return Ok(existing);
            }
            store
                .update_location(existing.id, &[LocationUpdate::Name(Some(name.to_string()))])
                .await
        }
        other => other,
    }
}
