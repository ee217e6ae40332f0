//! Installation of downloaded engine archives into the bin directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::sync::OwnedMutexGuard;
use upkeep_backend::EngineType;

use crate::extract::{
    ExtractError, decompress_gzip, decompress_tar, extract_zip_entries, flatten_subdirectories,
};
use crate::progress::ProgressReporter;

/// Zip entries whose name contains this are geo data bundled with an engine
/// release; the geo updater owns those files.
const GEO_ENTRY_MARKER: &str = "geo";

/// Where engines are installed.
#[derive(Debug, Clone)]
pub struct InstallLayout {
    bin_dir: PathBuf,
}

impl InstallLayout {
    #[must_use]
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
        }
    }

    /// Root of the layout; geo data files live directly here.
    #[must_use]
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    #[must_use]
    pub fn engine_dir(&self, engine: EngineType) -> PathBuf {
        self.bin_dir.join(engine.install_dir())
    }

    #[must_use]
    pub fn executable_path(&self, engine: EngineType) -> PathBuf {
        self.engine_dir(engine).join(engine.executable_file_name())
    }
}

/// One async mutex per install directory, shared by every activity that
/// writes into the bin directory.
#[derive(Debug, Clone, Default)]
pub struct InstallLocks {
    locks: Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>,
}

impl InstallLocks {
    pub async fn lock(&self, dir: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(locks.entry(dir.to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub engine: EngineType,
}

/// Artifacts collected during one core update cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ArtifactBatch {
    artifacts: Vec<DownloadedArtifact>,
}

impl ArtifactBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: PathBuf, engine: EngineType) {
        self.artifacts.push(DownloadedArtifact { path, engine });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    #[must_use]
    pub fn artifacts(&self) -> &[DownloadedArtifact] {
        &self.artifacts
    }
}

impl IntoIterator for ArtifactBatch {
    type Item = DownloadedArtifact;
    type IntoIter = std::vec::IntoIter<DownloadedArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Gzip,
    Zip,
}

impl ArchiveKind {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tar.gz") {
            Self::TarGz
        } else if name.ends_with(".gz") {
            Self::Gzip
        } else {
            Self::Zip
        }
    }
}

#[derive(Debug)]
pub enum ArtifactOutcome {
    Installed {
        engine: EngineType,
        path: PathBuf,
    },
    /// The file was already gone; not an error.
    Skipped {
        path: PathBuf,
    },
    Failed {
        engine: EngineType,
        path: PathBuf,
        error: ExtractError,
    },
}

impl ArtifactOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Install every artifact of `batch` in order, isolating failures per
/// artifact. The batch is consumed.
pub async fn process_batch(
    batch: ArtifactBatch,
    layout: &InstallLayout,
    locks: &InstallLocks,
    progress: &ProgressReporter,
) -> Vec<ArtifactOutcome> {
    let mut outcomes = Vec::with_capacity(batch.len());

    for DownloadedArtifact { path, engine } in batch {
        if path.as_os_str().is_empty() || !path.exists() {
            debug!("Skipping missing artifact {}", path.display());
            outcomes.push(ArtifactOutcome::Skipped { path });
            continue;
        }

        let dest = layout.engine_dir(engine);
        info!(
            "Processing downloaded file: {} to {}",
            path.display(),
            dest.display()
        );

        let result = {
            let _guard = locks.lock(&dest).await;
            let source = path.clone();
            tokio::task::spawn_blocking(move || install_artifact(&source, engine, &dest))
                .await
                .unwrap_or_else(|error| {
                    Err(ExtractError::Invalid(format!("install task failed: {error}")))
                })
        };

        match result {
            Ok(()) => {
                progress
                    .success(format!("Updated {engine} successfully"))
                    .await;
                if path.exists()
                    && let Err(error) = std::fs::remove_file(&path)
                {
                    warn!("Failed to delete {}: {error}", path.display());
                }
                outcomes.push(ArtifactOutcome::Installed { engine, path });
            }
            Err(error) => {
                warn!("Error processing downloaded file {}: {error}", path.display());
                progress
                    .failure(format!("Error updating {engine} core: {error}"))
                    .await;
                outcomes.push(ArtifactOutcome::Failed {
                    engine,
                    path,
                    error,
                });
            }
        }
    }

    outcomes
}

fn install_artifact(path: &Path, engine: EngineType, dest: &Path) -> Result<(), ExtractError> {
    match ArchiveKind::from_path(path) {
        ArchiveKind::TarGz => {
            decompress_tar(path, dest)?;
            flatten_subdirectories(dest)?;
        }
        ArchiveKind::Gzip => {
            decompress_gzip(path, dest, &engine.executable_file_name())?;
        }
        ArchiveKind::Zip => {
            extract_zip_entries(path, dest, GEO_ENTRY_MARKER)?;
        }
    }

    if cfg!(not(windows)) {
        let executable = dest.join(engine.executable_file_name());
        upkeep_platform::set_executable(&executable).map_err(|error| {
            ExtractError::io_with_path(
                "failed to set executable permission",
                &executable,
                &error,
            )
        })?;
    }

    Ok(())
}
