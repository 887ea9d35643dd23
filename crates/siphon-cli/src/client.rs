//! Shared CLI context, error types and engine bootstrap.

use std::fmt::{self, Display, Formatter};

use siphon_config::{AppConfig, ConfigService};
use siphon_engine::{BackendRegistry, TorrentEngine};
use siphon_torrent_core::TorrentError;

use crate::cli::OutputFormat;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<TorrentError> for CliError {
    fn from(err: TorrentError) -> Self {
        match err {
            TorrentError::UnsupportedUri { uri } => {
                Self::validation(format!("unsupported torrent URI '{uri}'"))
            }
            other => Self::failure(other),
        }
    }
}

/// Inputs shared by every command handler.
pub(crate) struct CliContext {
    pub(crate) config: AppConfig,
    pub(crate) format: OutputFormat,
}

/// Engine plus the configuration service feeding it.
pub(crate) struct EngineHandle {
    pub(crate) engine: TorrentEngine,
    _config: ConfigService,
}

/// Start an engine for the selected backend kind.
pub(crate) fn start_engine(config: &AppConfig) -> CliResult<EngineHandle> {
    let registry = BackendRegistry::with_defaults().map_err(CliError::failure)?;
    let kind = config.downloader.downloader_type;
    let backend = registry.get(kind);
    if !backend.is_supported() {
        return Err(CliError::validation(format!(
            "backend '{kind}' is not available in this build"
        )));
    }
    let service = ConfigService::new(config.clone());
    let engine = TorrentEngine::start(
        backend,
        service.watch_downloader(),
        service.watch_peer_filter(),
    );
    Ok(EngineHandle {
        engine,
        _config: service,
    })
}
