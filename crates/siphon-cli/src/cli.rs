//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use siphon_config::load_config;
use siphon_qbittorrent::TorrentFilter;
use siphon_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, init_logging};

use crate::client::{CliContext, CliError, CliResult};
use crate::commands::config::handle_config_show;
use crate::commands::connection::handle_test_connection;
use crate::commands::download::handle_download;
use crate::commands::probe::handle_probe;
use crate::commands::torrents::handle_torrents;

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Parses arguments, runs the requested command and returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        build_version: env!("CARGO_PKG_VERSION"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }
    let _span = GlobalContextGuard::new(command_label(&cli.command));

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

pub(crate) async fn dispatch(cli: Cli) -> CliResult<()> {
    let config = load_config(cli.config.as_deref()).await.map_err(|err| {
        CliError::validation(format!(
            "failed to load configuration: {:#}",
            anyhow::Error::from(err)
        ))
    })?;
    let ctx = CliContext {
        config,
        format: cli.output,
    };

    match cli.command {
        Command::TestConnection => handle_test_connection(&ctx).await,
        Command::Download(args) => handle_download(&ctx, args).await,
        Command::Torrents(args) => handle_torrents(&ctx, args).await,
        Command::Probe(args) => handle_probe(&ctx, args).await,
        Command::Config => handle_config_show(&ctx),
    }
}

#[derive(Parser)]
#[command(
    name = "siphon",
    version,
    about = "Drive torrent backends and rank media sources by throughput"
)]
pub(crate) struct Cli {
    /// JSON configuration file; `SIPHON_*` variables are applied on top.
    #[arg(long, global = true, env = "SIPHON_CONFIG")]
    pub(crate) config: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    /// Log filter directive; `RUST_LOG` takes precedence.
    #[arg(long, global = true, env = "SIPHON_LOG", default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    /// Log output format (`json` or `pretty`).
    #[arg(long, global = true)]
    pub(crate) log_format: Option<LogFormat>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Log in to the selected backend with a throwaway client.
    TestConnection,
    /// Submit a torrent and follow its progress.
    Download(DownloadArgs),
    /// List torrents known to the qBittorrent daemon.
    Torrents(TorrentsArgs),
    /// Measure download throughput of candidate sources.
    Probe(ProbeArgs),
    /// Print the effective configuration with secrets redacted.
    Config,
}

#[derive(Args)]
pub(crate) struct DownloadArgs {
    /// Magnet link or http(s) URL of a `.torrent` file.
    pub(crate) uri: String,
    /// Seconds to keep printing session stats before closing the session.
    #[arg(long, default_value_t = 10)]
    pub(crate) watch_secs: u64,
    /// Deadline for downloading a `.torrent` file.
    #[arg(long, default_value_t = 30)]
    pub(crate) fetch_timeout_secs: u64,
    /// Deadline for the engine to create its downloader.
    #[arg(long, default_value_t = 15)]
    pub(crate) init_timeout_secs: u64,
}

#[derive(Args)]
pub(crate) struct TorrentsArgs {
    /// Only list torrents in this state.
    #[arg(long, value_enum)]
    pub(crate) filter: Option<StateFilter>,
}

#[derive(Args)]
pub(crate) struct ProbeArgs {
    /// Candidate source as `<id>=<url>`; repeat for each source.
    #[arg(long = "source", value_parser = parse_source, required = true)]
    pub(crate) sources: Vec<SourceArg>,
    /// Per-probe deadline; defaults to the configured value.
    #[arg(long)]
    pub(crate) timeout_ms: Option<u64>,
    /// Bytes requested per probe; defaults to the configured value.
    #[arg(long)]
    pub(crate) segment_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceArg {
    pub(crate) source_id: String,
    pub(crate) url: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum StateFilter {
    All,
    Downloading,
    Seeding,
    Completed,
    Paused,
    Active,
    Inactive,
    Stalled,
    Errored,
}

impl From<StateFilter> for TorrentFilter {
    fn from(filter: StateFilter) -> Self {
        match filter {
            StateFilter::All => Self::All,
            StateFilter::Downloading => Self::Downloading,
            StateFilter::Seeding => Self::Seeding,
            StateFilter::Completed => Self::Completed,
            StateFilter::Paused => Self::Paused,
            StateFilter::Active => Self::Active,
            StateFilter::Inactive => Self::Inactive,
            StateFilter::Stalled => Self::Stalled,
            StateFilter::Errored => Self::Errored,
        }
    }
}

pub(crate) fn parse_source(value: &str) -> Result<SourceArg, String> {
    let (source_id, url) = value
        .split_once('=')
        .ok_or_else(|| format!("expected <id>=<url>, got '{value}'"))?;
    let source_id = source_id.trim();
    let url = url.trim();
    if source_id.is_empty() {
        return Err("source id must not be empty".to_string());
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(format!("source '{source_id}' needs an http(s) URL"));
    }
    Ok(SourceArg {
        source_id: source_id.to_string(),
        url: url.to_string(),
    })
}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::TestConnection => "test_connection",
        Command::Download(_) => "download",
        Command::Torrents(_) => "torrents",
        Command::Probe(_) => "probe",
        Command::Config => "config",
    }
}
