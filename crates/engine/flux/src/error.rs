//! Error types for the flux crate
//!
//! Only the configuration layer can fail. Field evaluation, analysis and
//! classification return well-defined degenerate results instead.

use thiserror::Error;

/// Result type alias for flux operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or validating a scene
#[derive(Debug, Error)]
pub enum Error {
    /// Scene file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scene file is not valid TOML or does not match the schema
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Scene could not be written back as TOML
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Light source or instance violates its invariants
    #[error("Invalid light '{name}': {reason}")]
    InvalidLight { name: String, reason: String },

    /// Sensor grid shape does not match its readings
    #[error("Invalid sensor grid: {0}")]
    InvalidSensorGrid(String),

    /// Growth stage name not recognized
    #[error("Unknown growth stage: {0}")]
    UnknownStage(String),

    /// Radiometric model tuning constants out of range
    #[error("Invalid model: {0}")]
    InvalidModel(String),
}
