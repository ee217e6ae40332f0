use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use upkeep_backend::{EngineType, UpdateError};
use upkeep_core::{
    GitHubRelease, download_file, fetch_latest_release, is_newer_version, parse_version_output,
};
use upkeep_platform::{AppPaths, HideWindow};

const OPERATION: &str = "check core update";
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn check_update(
    client: &reqwest::Client,
    paths: &AppPaths,
    engine: EngineType,
    include_prerelease: bool,
) -> Result<Option<PathBuf>, UpdateError> {
    let spec = engine.spec();
    let executable = paths
        .bin_dir()
        .join(engine.install_dir())
        .join(engine.executable_file_name());
    let installed = installed_version(&executable, spec.version_arg).await;

    let release = fetch_latest_release(client, spec.github_repo, include_prerelease)
        .await
        .map_err(|error| UpdateError::network_request_from(OPERATION, error))?;

    if !needs_update(installed.as_deref(), &release) {
        debug!("{engine} {} is current", release.version());
        return Ok(None);
    }

    let asset_name = engine
        .asset_name(release.version())
        .ok_or(UpdateError::UnsupportedPlatform {
            engine: spec.display_name,
        })?;
    let asset = release.asset(&asset_name).ok_or_else(|| {
        UpdateError::network_parse(
            OPERATION,
            format!("release {} has no asset {asset_name}", release.tag_name),
        )
    })?;

    info!(
        "Updating {engine} from {} to {}",
        installed.as_deref().unwrap_or("nothing"),
        release.version()
    );
    let dest = paths.temp_dir().join(&asset.name);
    let expected = asset.sha256();
    if expected.is_none() {
        warn!("No published digest for {}; skipping verification", asset.name);
    }
    download_file(client, &asset.browser_download_url, &dest, expected.as_deref())
        .await
        .map_err(|error| UpdateError::network_request_from(OPERATION, error))?;

    Ok(Some(dest))
}

fn needs_update(installed: Option<&str>, release: &GitHubRelease) -> bool {
    installed.is_none_or(|current| is_newer_version(release.version(), current))
}

/// Version reported by the installed executable, or `None` when it is
/// missing or does not answer in time.
async fn installed_version(executable: &Path, version_arg: &str) -> Option<String> {
    if !executable.exists() {
        return None;
    }

    let mut command = tokio::process::Command::new(executable);
    command.arg(version_arg).hide_window().kill_on_drop(true);

    match tokio::time::timeout(PROBE_TIMEOUT, command.output()).await {
        Ok(Ok(output)) => parse_version_output(&String::from_utf8_lossy(&output.stdout)),
        Ok(Err(error)) => {
            warn!("Failed to run {}: {error}", executable.display());
            None
        }
        Err(_) => {
            warn!("{} did not report its version in time", executable.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use upkeep_core::GitHubRelease;

    use super::{installed_version, needs_update};

    fn release(tag: &str) -> GitHubRelease {
        serde_json::from_value(serde_json::json!({
            "tag_name": tag,
            "html_url": "https://github.com/XTLS/Xray-core/releases",
            "body": null
        }))
        .expect("release json should parse")
    }

    #[test]
    fn missing_install_always_needs_update() {
        assert!(needs_update(None, &release("v1.8.24")));
    }

    #[test]
    fn installed_version_is_compared_with_release() {
        assert!(needs_update(Some("1.8.23"), &release("v1.8.24")));
        assert!(!needs_update(Some("1.8.24"), &release("v1.8.24")));
        assert!(!needs_update(Some("1.9.0"), &release("v1.8.24")));
    }

    #[tokio::test]
    async fn missing_executable_has_no_version() {
        assert_eq!(
            installed_version(Path::new("/nonexistent/upkeep/xray"), "-version").await,
            None
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn version_is_read_from_executable_output() {
        use std::os::unix::fs::PermissionsExt as _;

        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let script = temp_dir.path().join("sing-box");
        std::fs::write(&script, "#!/bin/sh\necho \"sing-box version 1.10.1\"\n")
            .expect("script should be written");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("script should be executable");

        assert_eq!(
            installed_version(&script, "version").await.as_deref(),
            Some("1.10.1")
        );
    }
}
