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

//! Throughput probing of candidate media sources ahead of playback.
//!
//! Layout:
//! - `media.rs`: candidate media and their resource locations
//! - `ranking.rs`: probe results, tiers and tier derivation
//! - `tester.rs`: concurrent bounded partial downloads per source
//! - `error.rs`: per-probe failure reasons

pub mod error;
pub mod media;
pub mod ranking;
pub mod tester;

pub use error::ProbeError;
pub use media::{Media, ResourceLocation};
pub use ranking::{
    SourceTier, SpeedTestReport, SpeedTestResult, calculate_dynamic_tiers, rank_results,
};
pub use tester::MediaSourceSpeedTester;
