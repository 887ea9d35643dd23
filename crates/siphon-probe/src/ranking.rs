//! Probe results and the tiers derived from them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of probing one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedTestResult {
    /// Probed source.
    pub source_id: String,
    /// Measured throughput; `u64::MAX` when the transfer was too fast to time.
    pub bytes_per_second: u64,
    /// Wall time of the probe in milliseconds; `u64::MAX` on failure.
    pub latency_ms: u64,
    /// Whether any bytes were received.
    pub success: bool,
}

impl SpeedTestResult {
    /// Result for a source that produced no measurement.
    #[must_use]
    pub fn failed(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            bytes_per_second: 0,
            latency_ms: u64::MAX,
            success: false,
        }
    }
}

/// Relative preference of a source; lower is preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceTier(pub u32);

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ranked results of one probing run with their derived tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedTestReport {
    /// Successful results, fastest first.
    pub results: Vec<SpeedTestResult>,
    /// Tier per source; sources without a successful probe are absent.
    pub tiers: BTreeMap<String, SourceTier>,
}

/// Keep successful results and order them fastest first.
///
/// The sort is stable, so equal throughputs keep their input order.
#[must_use]
pub fn rank_results(results: Vec<SpeedTestResult>) -> Vec<SpeedTestResult> {
    let mut ranked: Vec<SpeedTestResult> =
        results.into_iter().filter(|result| result.success).collect();
    ranked.sort_by(|a, b| b.bytes_per_second.cmp(&a.bytes_per_second));
    ranked
}

/// Map each successfully probed source to its rank, fastest = tier 0.
#[must_use]
pub fn calculate_dynamic_tiers(results: &[SpeedTestResult]) -> BTreeMap<String, SourceTier> {
    rank_results(results.to_vec())
        .into_iter()
        .zip(0u32..)
        .map(|(result, tier)| (result.source_id, SourceTier(tier)))
        .collect()
}
