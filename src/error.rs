use crate::models::location::LocationKey;
use thiserror::Error;
use uuid::Uuid;

/// Failures of the alert pipeline.
///
/// Only `WeatherUnavailable` and the location registry errors ever reach a
/// caller; the rest are recovered where they happen and logged.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("weather unavailable for {0}: no source data and no cached row")]
    WeatherUnavailable(LocationKey),

    #[error("weather source error: {0}")]
    SourceTransient(String),

    #[error("user directory lookup failed: {0}")]
    DirectoryLookupFailed(String),

    #[error("alert publish failed: {0}")]
    PublishFailed(String),

    #[error("location already exists: {0}")]
    DuplicateLocation(LocationKey),

    #[error("location not found: {0}")]
    LocationNotFound(Uuid),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("malformed alert event: {0}")]
    MalformedEvent(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("event decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}

pub type AlertResult<T> = Result<T, AlertError>;
