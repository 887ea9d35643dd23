//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use serde::Serialize;
use siphon_config::AppConfig;
use siphon_probe::SpeedTestReport;
use siphon_qbittorrent::TorrentInfo;
use siphon_torrent_core::SessionStats;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// Result of a connection test.
#[derive(Debug, Serialize)]
pub(crate) struct ConnectionReport {
    pub(crate) backend: String,
    pub(crate) reachable: bool,
}

/// Identity of a freshly started session.
#[derive(Debug, Serialize)]
pub(crate) struct SessionSummary {
    pub(crate) handle: String,
    pub(crate) name: String,
    pub(crate) save_dir: String,
    pub(crate) files: Vec<FileRow>,
}

/// One file of a session.
#[derive(Debug, Serialize)]
pub(crate) struct FileRow {
    pub(crate) index: u32,
    pub(crate) path: String,
    pub(crate) length: u64,
    pub(crate) resolved_path: String,
    pub(crate) streaming: bool,
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_connection(report: &ConnectionReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let verdict = if report.reachable { "ok" } else { "unreachable" };
            println!("backend: {}", report.backend);
            println!("connection: {verdict}");
            Ok(())
        }
    }
}

pub(crate) fn render_session(summary: &SessionSummary, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => {
            println!("handle: {}", summary.handle);
            println!("name: {}", summary.name);
            println!("save dir: {}", summary.save_dir);
            if summary.files.is_empty() {
                println!("files: <not yet known>");
            } else {
                println!("files:");
                println!("  {:>5} {:>12} {:<6} path", "index", "size", "stream");
                for file in &summary.files {
                    println!(
                        "  {:>5} {:>12} {:<6} {}",
                        file.index,
                        format_bytes(file.length),
                        if file.streaming { "yes" } else { "no" },
                        file.path
                    );
                }
            }
            Ok(())
        }
    }
}

pub(crate) fn render_stats(stats: &SessionStats, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string(stats)
                .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
            println!("{text}");
        }
        OutputFormat::Table => println!(
            "{:>6.1}% {:>12} / {:<12} down {:>12} up {:>12} {}",
            stats.percent_complete(),
            format_bytes(stats.downloaded_bytes),
            format_bytes(stats.total_size),
            format_rate(stats.download_speed),
            format_rate(stats.upload_speed),
            stats.state.as_deref().unwrap_or("-")
        ),
    }
    Ok(())
}

pub(crate) fn render_torrent_list(torrents: &[TorrentInfo], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&torrents),
        OutputFormat::Table => {
            println!("{:<40} {:<14} {:>7} {:>12} NAME", "HASH", "STATE", "PROG", "SIZE");
            for torrent in torrents {
                println!(
                    "{:<40} {:<14} {:>6.1}% {:>12} {}",
                    torrent.hash,
                    torrent.state,
                    torrent.progress.clamp(0.0, 1.0) * 100.0,
                    format_bytes(torrent.known_size()),
                    torrent.name
                );
            }
            Ok(())
        }
    }
}

pub(crate) fn render_probe_report(
    report: &SpeedTestReport,
    probed: &[String],
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            println!("{:>4} {:<24} {:>14} {:>10}", "TIER", "SOURCE", "SPEED", "LATENCY");
            for result in &report.results {
                let tier = report
                    .tiers
                    .get(&result.source_id)
                    .map_or_else(|| "-".to_string(), ToString::to_string);
                println!(
                    "{:>4} {:<24} {:>14} {:>8}ms",
                    tier,
                    result.source_id,
                    format_rate(result.bytes_per_second),
                    result.latency_ms
                );
            }
            let failed: Vec<&str> = probed
                .iter()
                .map(String::as_str)
                .filter(|source| !report.tiers.contains_key(*source))
                .collect();
            if !failed.is_empty() {
                println!("no result: {}", failed.join(", "));
            }
            Ok(())
        }
    }
}

pub(crate) fn render_config(config: &AppConfig, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Table => {
            let downloader = &config.downloader;
            println!("backend: {}", downloader.downloader_type);
            println!("save dir: {}", downloader.active().save_dir());
            println!(
                "qbittorrent: {} (user {}, verify tls {})",
                downloader.qbittorrent.url,
                downloader.qbittorrent.username,
                downloader.qbittorrent.verify_certificate
            );
            println!(
                "peer filter: {} ({} ips, {} clients)",
                if config.peer_filter.enabled { "on" } else { "off" },
                config.peer_filter.blocked_ips.len(),
                config.peer_filter.blocked_clients.len()
            );
            println!(
                "speed test: {} (timeout {}ms, segment {})",
                if config.speed_test.enabled { "on" } else { "off" },
                config.speed_test.timeout.as_millis(),
                format_bytes(config.speed_test.segment_size)
            );
            Ok(())
        }
    }
}

#[must_use]
pub(crate) fn format_rate(bytes_per_second: u64) -> String {
    if bytes_per_second == u64::MAX {
        return "unmeasured".to_string();
    }
    format!("{}/s", format_bytes(bytes_per_second))
}

#[must_use]
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    let value = bytes_to_f64(bytes);
    if value >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if value >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}
