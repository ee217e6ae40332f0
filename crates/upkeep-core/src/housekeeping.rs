//! What the hourly housekeeping tick does, and the on-disk purge it runs
//! every sixtieth tick.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Local, Months, TimeDelta};
use log::{info, warn};
use upkeep_platform::{AppPaths, delete_expired_files};

pub const PERSIST_EVERY_TICKS: u64 = 20;
pub const PURGE_EVERY_TICKS: u64 = 60;

/// Work scheduled for one housekeeping tick. Ticks are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPlan {
    pub refresh_subscriptions: bool,
    pub persist: bool,
    pub purge: bool,
}

impl TickPlan {
    #[must_use]
    pub fn for_tick(tick: u64) -> Self {
        Self {
            refresh_subscriptions: true,
            persist: tick > 0 && tick % PERSIST_EVERY_TICKS == 0,
            purge: tick > 0 && tick % PURGE_EVERY_TICKS == 0,
        }
    }
}

/// Directories the purge cleans.
#[derive(Debug, Clone)]
pub struct PurgeTargets {
    pub bin_config_dir: PathBuf,
    pub log_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl PurgeTargets {
    #[must_use]
    pub fn from_paths(paths: &AppPaths) -> Self {
        Self {
            bin_config_dir: paths.bin_config_dir(),
            log_dir: paths.log_dir(),
            temp_dir: paths.temp_dir(),
        }
    }
}

/// Cut-off instants: generated engine configs live an hour, logs and
/// temporary files a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeThresholds {
    pub bin_configs: SystemTime,
    pub logs: SystemTime,
    pub temp: SystemTime,
}

impl PurgeThresholds {
    #[must_use]
    pub fn at(now: DateTime<Local>) -> Self {
        let hour_ago = now - TimeDelta::hours(1);
        // Falls back to 30 days when the calendar arithmetic is out of range.
        let month_ago = now
            .checked_sub_months(Months::new(1))
            .unwrap_or_else(|| now - TimeDelta::days(30));
        Self {
            bin_configs: hour_ago.into(),
            logs: month_ago.into(),
            temp: month_ago.into(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub bin_configs: usize,
    pub logs: usize,
    pub temp: usize,
}

impl PurgeReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.bin_configs + self.logs + self.temp
    }
}

/// Delete expired files from every target. Blocking; a target that cannot be
/// read is logged and counted as zero.
#[must_use]
pub fn purge_expired(targets: &PurgeTargets, thresholds: PurgeThresholds) -> PurgeReport {
    info!("Execute delete expired files");
    let purge = |dir: &PathBuf, older_than: SystemTime| {
        delete_expired_files(dir, older_than).unwrap_or_else(|error| {
            warn!("Failed to purge {}: {error}", dir.display());
            0
        })
    };

    PurgeReport {
        bin_configs: purge(&targets.bin_config_dir, thresholds.bin_configs),
        logs: purge(&targets.log_dir, thresholds.logs),
        temp: purge(&targets.temp_dir, thresholds.temp),
    }
}
