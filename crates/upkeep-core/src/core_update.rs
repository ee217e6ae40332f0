//! One cycle of engine binary updates: check and download every engine, then
//! install whatever was downloaded.

use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};
use tokio_util::sync::CancellationToken;
use upkeep_backend::{Config, EngineType, UpdateError, UpdateService};

use crate::artifact::{ArtifactBatch, ArtifactOutcome, InstallLayout, InstallLocks, process_batch};
use crate::progress::ProgressReporter;
use crate::task::run_guarded;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCheckOutcome {
    Downloaded(PathBuf),
    UpToDate,
    Failed(UpdateError),
}

#[derive(Debug, Default)]
pub struct CoreCycleReport {
    pub checks: Vec<(EngineType, EngineCheckOutcome)>,
    pub installs: Vec<ArtifactOutcome>,
}

impl CoreCycleReport {
    #[must_use]
    pub fn installed(&self) -> usize {
        self.installs
            .iter()
            .filter(|outcome| matches!(outcome, ArtifactOutcome::Installed { .. }))
            .count()
    }

    /// Engines whose check or install failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        let checks = self
            .checks
            .iter()
            .filter(|(_, outcome)| matches!(outcome, EngineCheckOutcome::Failed(_)))
            .count();
        checks + self.installs.iter().filter(|o| o.is_failure()).count()
    }
}

/// Everything a core cycle needs besides the configuration snapshot.
pub struct CoreCycle<'a> {
    pub service: &'a dyn UpdateService,
    pub layout: &'a InstallLayout,
    pub locks: &'a InstallLocks,
    pub progress: &'a ProgressReporter,
    pub cancel: &'a CancellationToken,
    pub timeout: Duration,
}

impl CoreCycle<'_> {
    /// Check every engine in order and collect the downloads into a fresh
    /// batch. A failing engine never prevents the next one from being
    /// checked.
    pub async fn download(
        &self,
        config: &Config,
    ) -> (ArtifactBatch, Vec<(EngineType, EngineCheckOutcome)>) {
        let mut batch = ArtifactBatch::new();
        let mut checks = Vec::with_capacity(EngineType::ALL.len());

        for engine in EngineType::ALL {
            let result = run_guarded(
                self.cancel,
                self.timeout,
                "core update check",
                self.service.check_update_core(engine, config),
            )
            .await;

            let outcome = match result {
                Ok(Some(path)) => {
                    info!("Download {engine} core: {}", path.display());
                    self.progress
                        .success(format!("Downloaded {engine} core: {}", path.display()))
                        .await;
                    batch.push(path.clone(), engine);
                    EngineCheckOutcome::Downloaded(path)
                }
                Ok(None) => {
                    self.progress
                        .success(format!("{engine} core is up to date"))
                        .await;
                    EngineCheckOutcome::UpToDate
                }
                Err(error) if error.is_cancelled() => {
                    checks.push((engine, EngineCheckOutcome::Failed(error)));
                    break;
                }
                Err(error) => {
                    warn!("{engine} core update check failed: {error}");
                    self.progress
                        .failure(format!("Failed to update {engine} core: {error}"))
                        .await;
                    EngineCheckOutcome::Failed(error)
                }
            };
            checks.push((engine, outcome));
        }

        (batch, checks)
    }

    /// Run a full cycle: download phase, then a single installation pass.
    pub async fn run(&self, config: &Config) -> CoreCycleReport {
        let (batch, checks) = self.download(config).await;
        let installs = if self.cancel.is_cancelled() {
            Vec::new()
        } else {
            process_batch(batch, self.layout, self.locks, self.progress).await
        };
        CoreCycleReport { checks, installs }
    }
}
