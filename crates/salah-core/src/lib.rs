pub mod config;
pub mod error;

pub use config::{
    Config, GeocodingConfig, LocationConfig, ReloadPolicyKind, StorageConfig, TimelineConfig,
    ValidationResult,
};
pub use error::{
    AppError, CalculationError, ConfigError, DatabaseError, LocationError, NetworkError,
    ReqwestErrorExt, RusqliteErrorExt,
};

use anyhow::Result;

/// Initialize logging for the host app and the widget refresh loop
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Salah Times core initialized");
    Ok(())
}
