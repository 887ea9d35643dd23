//! Concurrent source speed testing.
//!
//! # Design
//! - One representative media item per source, probed concurrently; each probe
//!   carries its own deadline so a stalled source only delays its own entry.
//! - A probe requests the first `segment_size` bytes with a `Range` header and
//!   stops reading once that many bytes arrived.
//! - Every failure becomes a failed result; the batch never errors.

use std::collections::HashSet;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::join_all;
use reqwest::Client;
use reqwest::header::RANGE;
use siphon_config::SpeedTestSettings;
use tokio::time::{Instant, timeout};
use tracing::{debug, info};

use crate::error::ProbeError;
use crate::media::Media;
use crate::ranking::{SpeedTestReport, SpeedTestResult, calculate_dynamic_tiers, rank_results};

/// Measures download throughput of candidate media sources.
#[derive(Debug, Clone)]
pub struct MediaSourceSpeedTester {
    http: Client,
}

struct Measurement {
    received: u64,
    elapsed_ms: u64,
}

impl MediaSourceSpeedTester {
    /// Wrap an existing HTTP client.
    #[must_use]
    pub const fn new(http: Client) -> Self {
        Self { http }
    }

    /// Probe one media item per source and return successes, fastest first.
    ///
    /// Returns an empty list when speed testing is disabled.
    pub async fn test_sources(
        &self,
        media: &[Media],
        settings: &SpeedTestSettings,
    ) -> Vec<SpeedTestResult> {
        if !settings.enabled {
            info!("source speed test is disabled");
            return Vec::new();
        }

        let representatives = first_per_source(media);
        info!(
            candidates = media.len(),
            sources = representatives.len(),
            "starting source speed test"
        );

        let results = join_all(
            representatives
                .iter()
                .map(|candidate| self.probe(candidate, settings)),
        )
        .await;

        let ranked = rank_results(results);
        info!(
            succeeded = ranked.len(),
            sources = representatives.len(),
            "source speed test completed"
        );
        for result in &ranked {
            debug!(
                source_id = %result.source_id,
                kib_per_second = result.bytes_per_second / 1024,
                latency_ms = result.latency_ms,
                "source speed measured"
            );
        }
        ranked
    }

    /// Probe the sources and derive tiers from the outcome.
    pub async fn test_and_rank(
        &self,
        media: &[Media],
        settings: &SpeedTestSettings,
    ) -> SpeedTestReport {
        let results = self.test_sources(media, settings).await;
        let tiers = calculate_dynamic_tiers(&results);
        SpeedTestReport { results, tiers }
    }

    /// Probe a single media item.
    pub async fn probe(&self, media: &Media, settings: &SpeedTestSettings) -> SpeedTestResult {
        match self.measure(media, settings).await {
            Ok(measurement) => {
                let bytes_per_second = if measurement.elapsed_ms == 0 {
                    u64::MAX
                } else {
                    measurement.received.saturating_mul(1000) / measurement.elapsed_ms
                };
                SpeedTestResult {
                    source_id: media.source_id.clone(),
                    bytes_per_second,
                    latency_ms: measurement.elapsed_ms,
                    success: true,
                }
            }
            Err(err) => {
                debug!(
                    media_id = %media.media_id,
                    source_id = %media.source_id,
                    error = %err,
                    "source speed probe failed"
                );
                SpeedTestResult::failed(media.source_id.clone())
            }
        }
    }

    async fn measure(
        &self,
        media: &Media,
        settings: &SpeedTestSettings,
    ) -> Result<Measurement, ProbeError> {
        let url = media.download.probe_url().ok_or(ProbeError::NotProbeable)?;
        let started = Instant::now();
        let received = timeout(settings.timeout, self.fetch_segment(url, settings.segment_size))
            .await
            .map_err(|_| ProbeError::Timeout {
                timeout: settings.timeout,
            })??;
        if received == 0 {
            return Err(ProbeError::Empty);
        }
        Ok(Measurement {
            received,
            elapsed_ms: millis(started.elapsed()),
        })
    }

    async fn fetch_segment(&self, url: &str, segment_size: u64) -> Result<u64, ProbeError> {
        let response = self
            .http
            .get(url)
            .header(RANGE, format!("bytes=0-{}", segment_size.saturating_sub(1)))
            .send()
            .await
            .map_err(|source| ProbeError::Transport { source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
            });
        }

        let mut body = response.bytes_stream();
        let mut received = 0u64;
        while received < segment_size {
            let Some(chunk) = body.next().await else {
                break;
            };
            let chunk = chunk.map_err(|source| ProbeError::Transport { source })?;
            let len = u64::try_from(chunk.len()).unwrap_or(u64::MAX);
            received = received.saturating_add(len.min(segment_size - received));
        }
        Ok(received)
    }
}

fn first_per_source(media: &[Media]) -> Vec<&Media> {
    let mut seen = HashSet::new();
    media
        .iter()
        .filter(|candidate| seen.insert(candidate.source_id.as_str()))
        .collect()
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
