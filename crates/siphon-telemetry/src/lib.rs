#![forbid(unsafe_code)]
#![warn(
    unused,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Logging bootstrap shared by siphon binaries.
//!
//! Layout:
//! - `init.rs`: subscriber installation and logging configuration
//! - `context.rs`: process-wide span carrying command and build info
//! - `error.rs`: telemetry errors

pub mod context;
pub mod error;
pub mod init;

pub use context::GlobalContextGuard;
pub use error::{TelemetryError, TelemetryResult};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_version, init_logging};
