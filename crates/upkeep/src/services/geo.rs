use std::path::Path;

use log::{info, warn};
use upkeep_backend::{GeoSource, UpdateError};
use upkeep_core::download_file;
use upkeep_platform::AppPaths;

const OPERATION: &str = "update geo files";

pub(super) async fn update_files(
    client: &reqwest::Client,
    paths: &AppPaths,
    sources: &[GeoSource],
) -> Result<String, UpdateError> {
    if sources.is_empty() {
        return Ok("No geo files configured".to_string());
    }

    let temp_dir = paths.temp_dir();
    let bin_dir = paths.bin_dir();
    let mut updated = Vec::with_capacity(sources.len());
    let mut failures = Vec::new();

    for source in sources {
        match update_file(client, source, &temp_dir, &bin_dir).await {
            Ok(()) => {
                info!("Updated geo file {}", source.file_name);
                updated.push(source.file_name.as_str());
            }
            Err(error) => {
                warn!("Failed to update geo file {}: {error}", source.file_name);
                failures.push(format!("{}: {error}", source.file_name));
            }
        }
    }

    if failures.is_empty() {
        Ok(format!("Updated geo files: {}", updated.join(", ")))
    } else {
        Err(UpdateError::network_request(OPERATION, failures.join("; ")))
    }
}

async fn update_file(
    client: &reqwest::Client,
    source: &GeoSource,
    temp_dir: &Path,
    bin_dir: &Path,
) -> Result<(), UpdateError> {
    if !is_plain_file_name(&source.file_name) {
        return Err(UpdateError::install_failed(
            "geo update",
            format!("invalid geo file name {:?}", source.file_name),
        ));
    }

    let downloaded = temp_dir.join(&source.file_name);
    download_file(client, &source.url, &downloaded, None)
        .await
        .map_err(|error| UpdateError::network_request_from(OPERATION, error))?;
    install_file(&downloaded, &bin_dir.join(&source.file_name)).await
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

/// Move `src` over `dest`, copying when the two live on different volumes.
async fn install_file(src: &Path, dest: &Path) -> Result<(), UpdateError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::rename(src, dest).await.is_err() {
        tokio::fs::copy(src, dest).await?;
        tokio::fs::remove_file(src).await?;
    }
    Ok(())
}
