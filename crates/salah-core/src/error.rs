//! Error types shared by the host app and the widget.
//!
//! Library code returns the narrow enums below; binaries fold them into
//! [`AppError`] and show [`AppError::user_message`] to people while the
//! `Display` text goes to the log.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Settings store error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Short text fit for a widget entry or a terminal line
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Database(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Location(e) => e.user_message(),
            AppError::Calculation(e) => e.user_message(),
            AppError::Io(_) => "Could not read or write a local file.",
            AppError::Other(_) => "Something went wrong.",
        }
    }
}

/// HTTP failures talking to the geocoding service
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Could not reach server: {0}")]
    Unreachable(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response body: {0}")]
    Decode(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::Unreachable(_) => "No connection to the place-name service.",
            NetworkError::Timeout => "The place-name service did not answer in time.",
            NetworkError::Status { status, .. } if *status == 429 => {
                "Too many place-name lookups. Try again in a minute."
            }
            NetworkError::Status { status, .. } if *status >= 500 => {
                "The place-name service is down."
            }
            NetworkError::Status { .. } | NetworkError::Decode(_) => {
                "The place-name service sent an unexpected answer."
            }
        }
    }
}

/// Failures of the shared SQLite settings store
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Cannot open settings store: {0}")]
    Open(String),

    #[error("Settings query failed: {0}")]
    Query(String),

    #[error("Settings store is corrupt: {0}")]
    Corrupt(String),

    #[error("Settings schema update failed: {0}")]
    Schema(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::Open(_) | DatabaseError::Schema(_) => {
                "Saved settings could not be opened."
            }
            DatabaseError::Query(_) => "Saving settings failed.",
            DatabaseError::Corrupt(_) => "Saved settings are damaged; reset them to continue.",
        }
    }
}

/// Problems with `config.toml`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Parse { .. } => "config.toml is not valid TOML.",
            ConfigError::Invalid(_) => "config.toml has invalid values.",
        }
    }
}

/// Device location failures
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location permission not yet requested")]
    NotDetermined,

    #[error("Location service unavailable")]
    ServiceUnavailable,

    #[error("Location request timed out")]
    Timeout,
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::PermissionDenied => {
                "Location access denied. Please enable in Settings."
            }
            LocationError::NotDetermined => "Location not available",
            LocationError::ServiceUnavailable | LocationError::Timeout => "Location unavailable",
        }
    }
}

/// Prayer time computation failures
#[derive(Debug, Error)]
pub enum CalculationError {
    #[error("Invalid coordinates: {latitude}, {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Sun transit, sunrise or sunset cannot be computed for {0}")]
    Unavailable(String),
}

impl CalculationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            CalculationError::InvalidCoordinates { .. } => "Invalid location coordinates.",
            CalculationError::InvalidDate(_) | CalculationError::Unavailable(_) => {
                "Prayer times unavailable"
            }
        }
    }
}

/// Classify a `reqwest` failure
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            return NetworkError::Timeout;
        }
        match self.status() {
            Some(status) => NetworkError::Status {
                status: status.as_u16(),
                message: self.to_string(),
            },
            None if self.is_decode() => NetworkError::Decode(self.to_string()),
            None => NetworkError::Unreachable(self.to_string()),
        }
    }
}

/// Classify a `rusqlite` failure
pub trait RusqliteErrorExt {
    fn into_database_error(self) -> DatabaseError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_database_error(self) -> DatabaseError {
        let code = self.sqlite_error_code();
        match code {
            Some(rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase) => {
                DatabaseError::Corrupt(self.to_string())
            }
            Some(rusqlite::ErrorCode::CannotOpen) => DatabaseError::Open(self.to_string()),
            _ => DatabaseError::Query(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_every_variant_has_a_message() {
        let errors = [
            AppError::from(NetworkError::Timeout),
            AppError::from(DatabaseError::Query("disk full".into())),
            AppError::from(ConfigError::Invalid("timeline.step_minutes".into())),
            AppError::from(LocationError::PermissionDenied),
            AppError::from(CalculationError::Unavailable("2024-06-21".into())),
        ];

        for error in &errors {
            assert!(!error.user_message().is_empty(), "{error}");
        }
    }

    #[test]
    fn test_location_failures_read_as_unavailable() {
        for error in [LocationError::Timeout, LocationError::ServiceUnavailable] {
            assert_eq!(AppError::from(error).user_message(), "Location unavailable");
        }
    }

    #[test]
    fn test_rate_limited_status_has_own_message() {
        let limited = NetworkError::Status {
            status: 429,
            message: "slow down".into(),
        };
        let down = NetworkError::Status {
            status: 503,
            message: "maintenance".into(),
        };
        assert_ne!(limited.user_message(), down.user_message());
    }

    #[test]
    fn test_corrupt_file_is_classified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.sqlite");
        std::fs::write(&path, [b'x'; 4096]).unwrap();

        let err = rusqlite::Connection::open(&path)
            .and_then(|conn| conn.execute_batch("SELECT * FROM sqlite_master"))
            .unwrap_err();
        assert!(matches!(err.into_database_error(), DatabaseError::Corrupt(_)));
    }
}
