//! Error types for graphics device operations.

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for graphics device operations.
#[derive(Error, Debug)]
pub enum GraphicsError {
    // Interpreter errors
    #[error("Graphics device initialization failed: {stderr}")]
    DeviceInit { stderr: String },

    #[error("Interpreter call failed: {0}")]
    Interpreter(String),

    #[error("Rescale task was dropped before completion")]
    TaskAborted,

    // Snapshot directory errors
    #[error("Failed to list snapshot directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl GraphicsError {
    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigParse(_) | Self::ConfigInvalid(_)
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::DeviceInit { .. } => Some("Check that the graphics package is installed in the R session"),
            Self::ConfigNotFound { .. } => Some("Create graphics.toml or use the defaults"),
            Self::ConfigParse(_) => Some("Fix the TOML syntax in graphics.toml"),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using GraphicsError.
pub type Result<T> = std::result::Result<T, GraphicsError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| GraphicsError::Other(format!("{}: {e}", f().into())))
    }
}
