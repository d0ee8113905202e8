use crate::error::{AlertError, AlertResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 100;

/// Normalized `(city, region, country)` triple.
///
/// Fields are trimmed and upper-cased on construction, so derived equality
/// and hashing are case-insensitive with respect to the raw input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationKey {
    city: String,
    region: String,
    country: String,
}

impl LocationKey {
    pub fn new(city: &str, region: &str, country: &str) -> Self {
        Self {
            city: normalize(city),
            region: normalize(region),
            country: normalize(country),
        }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn validate(&self) -> AlertResult<()> {
        for (field, value) in [
            ("city", &self.city),
            ("region", &self.region),
            ("country", &self.country),
        ] {
            if value.is_empty() {
                return Err(AlertError::InvalidUpdate(format!("{} must not be blank", field)));
            }
        }
        Ok(())
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.city, self.region, self.country)
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_uppercase()
}

/// A place the poll loop sweeps.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: Uuid,
    pub key: LocationKey,
    pub name: Option<String>,
}

#[derive(Debug, FromRow)]
pub struct LocationRow {
    pub location_id: Uuid,
    pub city: String,
    pub region: String,
    pub country: String,
    pub name: Option<String>,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Self {
            id: row.location_id,
            key: LocationKey::new(&row.city, &row.region, &row.country),
            name: row.name,
        }
    }
}

/// One permitted change to a location.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum LocationUpdate {
    Name(Option<String>),
    City(String),
    Region(String),
    Country(String),
}

impl LocationUpdate {
    fn validate(&self) -> AlertResult<()> {
        match self {
            LocationUpdate::Name(Some(name)) if name.trim().chars().count() > MAX_NAME_LEN => Err(
                AlertError::InvalidUpdate(format!("name longer than {} characters", MAX_NAME_LEN)),
            ),
            LocationUpdate::Name(_) => Ok(()),
            LocationUpdate::City(v) | LocationUpdate::Region(v) | LocationUpdate::Country(v) => {
                if v.trim().is_empty() {
                    Err(AlertError::InvalidUpdate(format!("{} must not be blank", self.field())))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn field(&self) -> &'static str {
        match self {
            LocationUpdate::Name(_) => "name",
            LocationUpdate::City(_) => "city",
            LocationUpdate::Region(_) => "region",
            LocationUpdate::Country(_) => "country",
        }
    }
}

impl Location {
    /// Applies every update or none of them. Returns whether the key changed.
    pub fn apply(&mut self, updates: &[LocationUpdate]) -> AlertResult<bool> {
        for update in updates {
            update.validate()?;
        }

        let (mut city, mut region, mut country) = (
            self.key.city.clone(),
            self.key.region.clone(),
            self.key.country.clone(),
        );
        let mut name = self.name.clone();

        for update in updates {
            match update {
                LocationUpdate::Name(n) => {
                    name = n.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(String::from)
                }
                LocationUpdate::City(v) => city = v.clone(),
                LocationUpdate::Region(v) => region = v.clone(),
                LocationUpdate::Country(v) => country = v.clone(),
            }
        }

        let key = LocationKey::new(&city, &region, &country);
        let key_changed = key != self.key;
        self.key = key;
        self.name = name;
        Ok(key_changed)
    }
}
