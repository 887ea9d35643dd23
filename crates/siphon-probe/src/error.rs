//! Reasons a single probe produced no measurement.

use std::time::Duration;

use thiserror::Error;

/// Why one source probe failed.
///
/// Failures never abort a batch; they are logged and folded into a failed
/// [`SpeedTestResult`](crate::SpeedTestResult).
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The resource cannot be fetched over HTTP.
    #[error("resource is not probeable")]
    NotProbeable,
    /// The probe did not finish within its deadline.
    #[error("probe timed out")]
    Timeout {
        /// Configured deadline.
        timeout: Duration,
    },
    /// The source answered with a non-success status.
    #[error("source returned an error status")]
    Status {
        /// HTTP status code.
        status: u16,
    },
    /// Request or body transfer failed.
    #[error("probe request failed")]
    Transport {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The source answered with an empty body.
    #[error("source returned no data")]
    Empty,
}
