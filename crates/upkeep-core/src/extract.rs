use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Zip {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("{0}")]
    Invalid(String),
}

impl ExtractError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    fn zip(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::Zip { context, source }
    }

    pub(crate) fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}

fn create_dir(dir: &Path) -> Result<(), ExtractError> {
    std::fs::create_dir_all(dir).map_err(|error| {
        ExtractError::io_with_path("failed to create destination directory", dir, &error)
    })
}

fn open(path: &Path) -> Result<std::fs::File, ExtractError> {
    std::fs::File::open(path)
        .map_err(|error| ExtractError::io_with_path("failed to open archive", path, &error))
}

/// Write `reader` to `target` through a sibling partial file that is renamed
/// over the target, so a running executable is replaced rather than truncated.
fn write_replacing(target: &Path, reader: &mut impl Read) -> Result<u64, ExtractError> {
    let file_name = target
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .ok_or_else(|| ExtractError::Invalid(format!("invalid target {}", target.display())))?;
    let partial = target.with_file_name(format!(".{file_name}.partial"));

    let mut out = std::fs::File::create(&partial).map_err(|error| {
        ExtractError::io_with_path("failed to create extracted file", &partial, &error)
    })?;
    let written = match std::io::copy(reader, &mut out) {
        Ok(written) => written,
        Err(error) => {
            drop(out);
            let _ = std::fs::remove_file(&partial);
            return Err(ExtractError::io_with_path(
                "failed to write extracted file",
                &partial,
                &error,
            ));
        }
    };
    drop(out);

    if let Err(error) = std::fs::rename(&partial, target) {
        let _ = std::fs::remove_file(&partial);
        return Err(ExtractError::io_with_path(
            "failed to move extracted file into place",
            target,
            &error,
        ));
    }
    Ok(written)
}

/// Unpack a `.tar.gz` archive into `dest`, keeping its directory layout.
///
/// # Errors
/// Returns an error when the archive cannot be read or an entry cannot be
/// written.
pub fn decompress_tar(archive_path: &Path, dest: &Path) -> Result<(), ExtractError> {
    create_dir(dest)?;
    let mut archive = tar::Archive::new(GzDecoder::new(open(archive_path)?));
    let entries = archive
        .entries()
        .map_err(|error| ExtractError::io("failed to read tar archive", error))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|error| ExtractError::io("failed to read tar entry", error))?;
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|error| ExtractError::io("failed to unpack tar entry", error))?;
        if !unpacked {
            warn!("Skipping tar entry with unsafe path");
        }
    }

    debug!("Tar extraction complete to {}", dest.display());
    Ok(())
}

/// Decompress a single-file `.gz` archive to `dest/file_name`.
///
/// # Errors
/// Returns an error when the archive is not valid gzip or the output cannot be
/// written.
pub fn decompress_gzip(
    archive_path: &Path,
    dest: &Path,
    file_name: &str,
) -> Result<PathBuf, ExtractError> {
    create_dir(dest)?;
    let target = dest.join(file_name);
    let mut decoder = GzDecoder::new(open(archive_path)?);
    let written = write_replacing(&target, &mut decoder)?;
    debug!("Decompressed {written} bytes to {}", target.display());
    Ok(target)
}

/// Extract every file of a zip archive directly into `dest`, dropping the
/// archive's directory structure.
///
/// Empty entries are skipped, as are entries whose file name contains
/// `ignored_name` when it is non-empty.
///
/// # Errors
/// Returns an error when the archive cannot be read or a file cannot be
/// written.
pub fn extract_zip_entries(
    archive_path: &Path,
    dest: &Path,
    ignored_name: &str,
) -> Result<usize, ExtractError> {
    create_dir(dest)?;
    let mut archive = zip::ZipArchive::new(open(archive_path)?)
        .map_err(|error| ExtractError::zip("failed to read zip archive", error))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| ExtractError::zip("failed to read zip entry", error))?;
        if entry.is_dir() || entry.size() == 0 {
            continue;
        }
        let Some(name) = entry
            .enclosed_name()
            .and_then(|path| path.file_name().map(std::ffi::OsStr::to_os_string))
        else {
            warn!("Skipping zip entry with unsafe path");
            continue;
        };
        if !ignored_name.is_empty() && name.to_string_lossy().contains(ignored_name) {
            debug!("Skipping zip entry {}", name.to_string_lossy());
            continue;
        }

        let out_path = dest.join(&name);
        write_replacing(&out_path, &mut entry)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
            }
        }
        extracted += 1;
    }

    debug!("Zip extraction complete to {}", dest.display());
    Ok(extracted)
}

/// Move the files of each immediate subdirectory of `dest` up into `dest`,
/// overwriting, then remove the subdirectories.
///
/// Only one level is flattened; files nested deeper are discarded with their
/// subdirectory.
///
/// # Errors
/// Returns an error when a directory cannot be read or a file cannot be moved.
pub fn flatten_subdirectories(dest: &Path) -> Result<(), ExtractError> {
    let read_dir = |dir: &Path| {
        std::fs::read_dir(dir)
            .map_err(|error| ExtractError::io_with_path("failed to read directory", dir, &error))
    };

    let mut sub_dirs = Vec::new();
    for entry in read_dir(dest)? {
        let entry =
            entry.map_err(|error| ExtractError::io("failed to read directory entry", error))?;
        if entry.path().is_dir() {
            sub_dirs.push(entry.path());
        }
    }

    for sub_dir in sub_dirs {
        for inner in read_dir(&sub_dir)? {
            let inner =
                inner.map_err(|error| ExtractError::io("failed to read directory entry", error))?;
            let src = inner.path();
            if !src.is_file() {
                continue;
            }
            let target = dest.join(inner.file_name());
            let mut reader = open(&src)?;
            write_replacing(&target, &mut reader)?;
            copy_permissions(&src, &target);
        }

        std::fs::remove_dir_all(&sub_dir).map_err(|error| {
            ExtractError::io_with_path("failed to remove flattened directory", &sub_dir, &error)
        })?;
    }

    Ok(())
}

fn copy_permissions(src: &Path, target: &Path) {
    if let Ok(metadata) = std::fs::metadata(src) {
        let _ = std::fs::set_permissions(target, metadata.permissions());
    }
}
