//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Configuration document was not valid JSON for the expected shape.
    #[error("failed to parse configuration")]
    Parse {
        /// File being parsed, when loading from disk.
        path: Option<PathBuf>,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// Environment override contained an unusable value.
    #[error("invalid environment override")]
    InvalidEnv {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
    /// The configuration service was dropped.
    #[error("configuration stream closed")]
    WatchClosed,
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
