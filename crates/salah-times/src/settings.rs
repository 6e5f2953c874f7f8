//! SQLite-backed shared settings store.
//!
//! One key/value table per suite, readable by both the host app and the
//! widget refresh loop. Contract across processes: at most one concurrent
//! writer; readers tolerate stale reads.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use salah_core::{DatabaseError, RusqliteErrorExt};

use crate::types::{
    CalculationMethod, Coordinates, HighLatitudeRule, LocationSetting, Madhab, Prayer, Settings,
};

pub const SCHEMA_VERSION: i64 = 1;

/// Persisted key names
pub mod keys {
    pub const SCHEMA_VERSION: &str = "schemaVersion";
    pub const CALCULATION_METHOD: &str = "calculationMethod";
    pub const MADHAB: &str = "madhab";
    pub const HIGH_LATITUDE_RULE: &str = "highLatitudeRule";
    pub const LOCATION: &str = "location";
    pub const FAJR_ADJUSTMENT: &str = "fajrAdjustment";
    pub const SUNRISE_ADJUSTMENT: &str = "sunriseAdjustment";
    pub const DHUHR_ADJUSTMENT: &str = "dhuhrAdjustment";
    pub const ASR_ADJUSTMENT: &str = "asrAdjustment";
    pub const MAGHRIB_ADJUSTMENT: &str = "maghribAdjustment";
    pub const ISHA_ADJUSTMENT: &str = "ishaAdjustment";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
}

fn adjustment_key(prayer: Prayer) -> &'static str {
    match prayer {
        Prayer::Fajr => keys::FAJR_ADJUSTMENT,
        Prayer::Sunrise => keys::SUNRISE_ADJUSTMENT,
        Prayer::Dhuhr => keys::DHUHR_ADJUSTMENT,
        Prayer::Asr => keys::ASR_ADJUSTMENT,
        Prayer::Maghrib => keys::MAGHRIB_ADJUSTMENT,
        Prayer::Isha => keys::ISHA_ADJUSTMENT,
    }
}

/// Shared key/value settings for one suite
pub struct SettingsStore {
    conn: Mutex<Connection>,
}

impl SettingsStore {
    /// Open (or create) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DatabaseError::Open(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(RusqliteErrorExt::into_database_error)?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(RusqliteErrorExt::into_database_error)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        tracing::debug!("Opened settings store at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (for testing and previews).
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(RusqliteErrorExt::into_database_error)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS defaults (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| DatabaseError::Schema(e.to_string()))?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM defaults WHERE key = ?1",
                params![keys::SCHEMA_VERSION],
                |row| row.get(0),
            )
            .optional()
            .map_err(RusqliteErrorExt::into_database_error)?;

        match stored.as_deref().map(str::parse::<i64>) {
            Some(Ok(version)) if version == SCHEMA_VERSION => {}
            Some(Ok(version)) if version > SCHEMA_VERSION => {
                tracing::warn!(
                    "Settings store schema {} is newer than supported {}; reading known keys only",
                    version,
                    SCHEMA_VERSION
                );
            }
            _ => {
                conn.execute(
                    "INSERT OR REPLACE INTO defaults (key, value) VALUES (?1, ?2)",
                    params![keys::SCHEMA_VERSION, SCHEMA_VERSION.to_string()],
                )
                .map_err(|e| DatabaseError::Schema(e.to_string()))?;
                tracing::info!("Settings store stamped with schema {}", SCHEMA_VERSION);
            }
        }
        Ok(())
    }

    /// Stored schema version.
    pub fn schema_version(&self) -> Option<i64> {
        self.read(keys::SCHEMA_VERSION)
            .and_then(|v| v.parse().ok())
    }

    fn read(&self, key: &str) -> Option<String> {
        let conn = self.conn.lock();
        let result = conn
            .query_row(
                "SELECT value FROM defaults WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional();
        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read setting {}: {}", key, e);
                None
            }
        }
    }

    fn read_parsed<T: FromStr>(&self, key: &str) -> Option<T>
    where
        T::Err: std::fmt::Display,
    {
        let raw = self.read(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring unparsable setting {}={:?}: {}", key, raw, e);
                None
            }
        }
    }

    /// Current settings; missing or unreadable keys fall back to defaults.
    pub fn get(&self) -> Settings {
        let defaults = Settings::default();
        let mut adjustments = defaults.adjustments;
        for prayer in Prayer::ALL {
            if let Some(minutes) = self.read_parsed::<i32>(adjustment_key(prayer)) {
                adjustments.set(prayer, minutes);
            }
        }

        Settings {
            calculation_method: self
                .read_parsed::<CalculationMethod>(keys::CALCULATION_METHOD)
                .unwrap_or(defaults.calculation_method),
            madhab: self
                .read_parsed::<Madhab>(keys::MADHAB)
                .unwrap_or(defaults.madhab),
            high_latitude_rule: self
                .read_parsed::<HighLatitudeRule>(keys::HIGH_LATITUDE_RULE)
                .unwrap_or(defaults.high_latitude_rule),
            adjustments,
            location: self
                .read(keys::LOCATION)
                .map(LocationSetting::from)
                .unwrap_or(defaults.location),
        }
    }

    /// Persist every field in one transaction.
    pub fn set(&self, settings: &Settings) -> Result<(), DatabaseError> {
        let mut values: Vec<(&str, String)> = vec![
            (
                keys::CALCULATION_METHOD,
                settings.calculation_method.to_string(),
            ),
            (keys::MADHAB, settings.madhab.to_string()),
            (
                keys::HIGH_LATITUDE_RULE,
                settings.high_latitude_rule.to_string(),
            ),
            (keys::LOCATION, settings.location.to_string()),
        ];
        for prayer in Prayer::ALL {
            values.push((
                adjustment_key(prayer),
                settings.adjustments.get(prayer).to_string(),
            ));
        }

        self.write_all(&values)?;
        tracing::info!(
            "Saved settings: {} / {} / {} / location {}",
            settings.calculation_method,
            settings.madhab,
            settings.high_latitude_rule,
            settings.location
        );
        Ok(())
    }

    /// Last coordinates saved by the host app, if any.
    pub fn saved_coordinates(&self) -> Option<Coordinates> {
        let latitude = self.read_parsed::<f64>(keys::LATITUDE)?;
        let longitude = self.read_parsed::<f64>(keys::LONGITUDE)?;
        Some(Coordinates::new(latitude, longitude))
    }

    pub fn save_coordinates(&self, coordinates: Coordinates) -> Result<(), DatabaseError> {
        // `{:?}` keeps the shortest representation that parses back exactly
        self.write_all(&[
            (keys::LATITUDE, format!("{:?}", coordinates.latitude)),
            (keys::LONGITUDE, format!("{:?}", coordinates.longitude)),
        ])?;
        tracing::info!("Saved coordinates {}", coordinates);
        Ok(())
    }

    pub fn clear_coordinates(&self) -> Result<(), DatabaseError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM defaults WHERE key IN (?1, ?2)",
            params![keys::LATITUDE, keys::LONGITUDE],
        )
        .map_err(RusqliteErrorExt::into_database_error)?;
        Ok(())
    }

    fn write_all(&self, values: &[(&str, String)]) -> Result<(), DatabaseError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(RusqliteErrorExt::into_database_error)?;
        {
            let mut stmt = tx
                .prepare("INSERT OR REPLACE INTO defaults (key, value) VALUES (?1, ?2)")
                .map_err(RusqliteErrorExt::into_database_error)?;
            for (key, value) in values {
                stmt.execute(params![key, value])
                    .map_err(RusqliteErrorExt::into_database_error)?;
            }
        }
        tx.commit().map_err(RusqliteErrorExt::into_database_error)
    }

    #[cfg(test)]
    fn write_raw(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.write_all(&[(key, value.to_string())])
    }
}
