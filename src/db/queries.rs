pub const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS weather_cache (
    city TEXT NOT NULL,
    region TEXT NOT NULL,
    country TEXT NOT NULL,
    condition TEXT NULL,
    temperature FLOAT8 NULL,
    high_temp FLOAT8 NULL,
    low_temp FLOAT8 NULL,
    cloud_coverage FLOAT8 NULL,
    wind_speed FLOAT8 NULL,
    precipitation FLOAT8 NULL,
    fetched_at TIMESTAMPTZ NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL,
    source TEXT NOT NULL,
    PRIMARY KEY (city, region, country)
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS locations (
    location_id UUID PRIMARY KEY,
    city TEXT NOT NULL,
    region TEXT NOT NULL,
    country TEXT NOT NULL,
    name TEXT NULL,
    UNIQUE (city, region, country)
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS user_alerts (
    alert_id BIGSERIAL PRIMARY KEY,
    trigger_id UUID NOT NULL,
    user_id BIGINT NOT NULL,
    location_id UUID NOT NULL,
    city TEXT NOT NULL,
    region TEXT NOT NULL,
    country TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    message TEXT NOT NULL,
    severity TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    UNIQUE (trigger_id, user_id)
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS user_alerts_user_created_idx ON user_alerts (user_id, created_at DESC);
"#,
    r#"
CREATE TABLE IF NOT EXISTS scheduler_locks (
    name TEXT PRIMARY KEY,
    locked_until TIMESTAMPTZ NOT NULL,
    locked_at TIMESTAMPTZ NOT NULL,
    locked_by TEXT NOT NULL
);
"#,
];

pub const SELECT_CACHED_WEATHER: &str = r#"
SELECT city, region, country, condition, temperature, high_temp, low_temp,
       cloud_coverage, wind_speed, precipitation, fetched_at, expires_at, source
FROM weather_cache
WHERE city = $1 AND region = $2 AND country = $3;
"#;

// The WHERE clause keeps the newest fetch when two refreshes race.
pub const UPSERT_CACHED_WEATHER: &str = r#"
INSERT INTO weather_cache (
    city, region, country, condition, temperature, high_temp, low_temp,
    cloud_coverage, wind_speed, precipitation, fetched_at, expires_at, source
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
ON CONFLICT (city, region, country) DO UPDATE
SET condition = EXCLUDED.condition,
    temperature = EXCLUDED.temperature,
    high_temp = EXCLUDED.high_temp,
    low_temp = EXCLUDED.low_temp,
    cloud_coverage = EXCLUDED.cloud_coverage,
    wind_speed = EXCLUDED.wind_speed,
    precipitation = EXCLUDED.precipitation,
    fetched_at = EXCLUDED.fetched_at,
    expires_at = EXCLUDED.expires_at,
    source = EXCLUDED.source
WHERE weather_cache.fetched_at <= EXCLUDED.fetched_at;
"#;

pub const SELECT_LOCATIONS: &str = r#"
SELECT location_id, city, region, country, name FROM locations ORDER BY city, region, country;
"#;

pub const SELECT_LOCATION_BY_ID_FOR_UPDATE: &str = r#"
SELECT location_id, city, region, country, name FROM locations WHERE location_id = $1 FOR UPDATE;
"#;

pub const SELECT_LOCATION_BY_KEY: &str = r#"
SELECT location_id, city, region, country, name FROM locations
WHERE city = $1 AND region = $2 AND country = $3;
"#;

pub const INSERT_LOCATION: &str = r#"
INSERT INTO locations (location_id, city, region, country, name)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (city, region, country) DO NOTHING
RETURNING location_id, city, region, country, name;
"#;

pub const UPDATE_LOCATION: &str = r#"
UPDATE locations SET city = $2, region = $3, country = $4, name = $5 WHERE location_id = $1;
"#;

pub const INSERT_USER_ALERTS_PREFIX: &str = r#"
INSERT INTO user_alerts (
    trigger_id, user_id, location_id, city, region, country, alert_type, message, severity, created_at
) "#;

pub const INSERT_USER_ALERTS_SUFFIX: &str = " ON CONFLICT (trigger_id, user_id) DO NOTHING";

pub const SELECT_USER_ALERTS: &str = r#"
SELECT trigger_id, user_id, location_id, city, region, country, alert_type, message, severity, created_at
FROM user_alerts
WHERE user_id = $1
ORDER BY created_at DESC, alert_id DESC;
"#;

// Takes the lock only if nobody holds an unexpired lease on it.
pub const ACQUIRE_LOCK: &str = r#"
INSERT INTO scheduler_locks (name, locked_until, locked_at, locked_by)
VALUES ($1, $2, $3, $4)
ON CONFLICT (name) DO UPDATE
SET locked_until = EXCLUDED.locked_until,
    locked_at = EXCLUDED.locked_at,
    locked_by = EXCLUDED.locked_by
WHERE scheduler_locks.locked_until <= EXCLUDED.locked_at
RETURNING name;
"#;

pub const RELEASE_LOCK: &str = r#"
UPDATE scheduler_locks
SET locked_until = $2
WHERE name = $1 AND locked_by = $3 AND locked_at = $4;
"#;
