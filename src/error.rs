//! Error types for Toolbox
//!
//! Provides standardized error handling across the library and server.

use thiserror::Error;

use crate::services::formulas::FormulaError;

/// Errors that can occur in Toolbox
#[derive(Debug, Error)]
pub enum ToolboxError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected before any work was done
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Formula engine rejected its input
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// Currency provider or other upstream failures
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// File processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Lookup of a job, tool or file that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage lock or bookkeeping errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Toolbox operations
pub type ToolboxResult<T> = Result<T, ToolboxError>;
