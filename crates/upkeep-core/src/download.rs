use std::io::Read;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use log::{debug, info};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

impl DownloadError {
    fn http(context: &'static str, source: reqwest::Error) -> Self {
        Self::Http { context, source }
    }

    fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::Io {
            context,
            source: std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        }
    }
}

/// Stream `url` into `dest`, replacing it only once the body is complete.
/// When `expected_sha256` is given the download is verified before the
/// rename and discarded on mismatch.
///
/// Returns the number of bytes written.
///
/// # Errors
/// Returns an error when the request fails, the server answers with a
/// non-success status, writing fails, or the checksum does not match.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    expected_sha256: Option<&str>,
) -> Result<u64, DownloadError> {
    debug!("Downloading {url} to {}", dest.display());
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|error| {
            DownloadError::io_with_path("failed to create download directory", parent, &error)
        })?;
    }

    let response = client
        .get(url)
        .header("User-Agent", "upkeep")
        .send()
        .await
        .map_err(|error| DownloadError::http("download request failed", error))?;

    if !response.status().is_success() {
        return Err(DownloadError::Invalid(format!(
            "Download of {url} failed with status {}",
            response.status()
        )));
    }

    let partial = partial_path(dest);
    let result = write_body(response, &partial).await;
    let downloaded = match result {
        Ok(downloaded) => downloaded,
        Err(error) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(error);
        }
    };

    if let Some(expected) = expected_sha256
        && let Err(error) = verify_sha256(&partial, expected)
    {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(error);
    }

    tokio::fs::rename(&partial, dest).await.map_err(|error| {
        DownloadError::io_with_path("failed to move download into place", dest, &error)
    })?;

    info!("Download complete: {} ({downloaded} bytes)", dest.display());
    Ok(downloaded)
}

async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64, DownloadError> {
    let mut file = tokio::fs::File::create(path).await.map_err(|error| {
        DownloadError::io_with_path("failed to create download file", path, &error)
    })?;

    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|error| DownloadError::http("download stream error", error))?;
        file.write_all(&chunk).await.map_err(|error| {
            DownloadError::io_with_path("failed to write download data", path, &error)
        })?;
        downloaded += chunk.len() as u64;
    }

    file.flush().await.map_err(|error| {
        DownloadError::io_with_path("failed to flush download file", path, &error)
    })?;
    Ok(downloaded)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Compare the SHA-256 of `path` against `expected` (hex, any case).
///
/// # Errors
/// Returns an error when the file cannot be read or the digest differs.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), DownloadError> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        info!("Checksum verified for {}", path.display());
        Ok(())
    } else {
        Err(DownloadError::Invalid(format!(
            "Checksum mismatch for {}. Refusing to use the download.",
            path.display()
        )))
    }
}

/// Hex SHA-256 of the file at `path`.
///
/// # Errors
/// Returns an error when the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String, DownloadError> {
    let mut file = std::fs::File::open(path).map_err(|error| {
        DownloadError::io_with_path("failed to open file for checksum", path, &error)
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = file.read(&mut buffer).map_err(|error| {
            DownloadError::io_with_path("failed to read file for checksum", path, &error)
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
