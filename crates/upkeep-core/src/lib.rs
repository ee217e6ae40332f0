//! Background maintenance for upkeep.
//!
//! This crate holds everything the scheduler does between hourly wake-ups and
//! is independent of the concrete network and storage implementations:
//! - The scheduler and its housekeeping, geo, core and GUI loops.
//! - Subscription refresh with per-item pacing.
//! - Engine update cycles and installation of downloaded archives.
//! - GitHub release lookup and verified downloads used by the default
//!   update service.

pub mod artifact;
pub mod cadence;
pub mod core_update;
pub mod download;
pub mod extract;
pub mod housekeeping;
pub mod progress;
pub mod release;
mod scheduler;
pub mod subscription;
mod task;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use tokio::sync::RwLock;
use upkeep_backend::Config;

/// Configuration shared between the host and every maintenance loop.
pub type SharedConfig = Arc<RwLock<Config>>;

/// Installation of downloaded engine archives.
pub use artifact::{ArtifactBatch, ArtifactOutcome, InstallLayout, InstallLocks, process_batch};
/// Download helpers with checksum verification.
pub use download::{DownloadError, download_file, sha256_file, verify_sha256};
/// Single reporting channel for activity results.
pub use progress::{ProgressEvent, ProgressReporter};
/// GitHub release model and version comparison helpers.
pub use release::{
    GitHubAsset, GitHubRelease, ReleaseError, fetch_latest_release, is_newer_version,
    parse_version_output,
};
/// Scheduler entry point.
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerTiming};
pub use task::{run_guarded, sleep_or_cancelled};
