use semver::Version;
use serde::Deserialize;
use thiserror::Error;

const USER_AGENT: &str = "upkeep";

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    pub size: u64,
    #[serde(default)]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub html_url: String,
    pub body: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

impl GitHubRelease {
    /// Tag without a leading `v`.
    #[must_use]
    pub fn version(&self) -> &str {
        self.tag_name.strip_prefix('v').unwrap_or(&self.tag_name)
    }

    #[must_use]
    pub fn asset(&self, name: &str) -> Option<&GitHubAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

impl GitHubAsset {
    /// The published SHA-256 of the asset, when GitHub reports one.
    #[must_use]
    pub fn sha256(&self) -> Option<String> {
        parse_sha256_digest(self.digest.as_deref()?)
    }
}

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("failed to query releases of {repo}: {source}")]
    Request {
        repo: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("release query for {repo} failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        repo: String,
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to parse release response of {repo}: {source}")]
    Parse {
        repo: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{repo} has no published releases")]
    NoReleases { repo: String },
}

/// Fetch the newest release of `repo` (`owner/name`). With
/// `include_prerelease` the newest entry of the release list is taken,
/// otherwise GitHub's latest stable release.
///
/// # Errors
/// Returns an error when the request fails, GitHub answers with a non-success
/// status, or the response cannot be parsed.
pub async fn fetch_latest_release(
    client: &reqwest::Client,
    repo: &str,
    include_prerelease: bool,
) -> Result<GitHubRelease, ReleaseError> {
    let url = if include_prerelease {
        format!("https://api.github.com/repos/{repo}/releases?per_page=5")
    } else {
        format!("https://api.github.com/repos/{repo}/releases/latest")
    };

    let response = client
        .get(&url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .map_err(|source| ReleaseError::Request {
            repo: repo.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body_snippet = response
            .text()
            .await
            .ok()
            .map(|body| response_snippet(&body, 160))
            .unwrap_or_default();
        return Err(ReleaseError::HttpStatus {
            repo: repo.to_string(),
            status,
            body_snippet,
        });
    }

    let parse_error = |source| ReleaseError::Parse {
        repo: repo.to_string(),
        source,
    };
    if include_prerelease {
        let releases: Vec<GitHubRelease> = response.json().await.map_err(parse_error)?;
        releases
            .into_iter()
            .next()
            .ok_or_else(|| ReleaseError::NoReleases {
                repo: repo.to_string(),
            })
    } else {
        response.json().await.map_err(parse_error)
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[must_use]
pub fn is_newer_version(latest: &str, current: &str) -> bool {
    let latest = latest.strip_prefix('v').unwrap_or(latest);
    let current = current.strip_prefix('v').unwrap_or(current);
    match (parse_semver(latest), parse_semver(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => latest != current,
    }
}

/// Pull the version out of an engine's `version` output, e.g.
/// `Xray 1.8.24 (Xray, Penetrates Everything.) ...` or
/// `Mihomo Meta v1.18.9 linux amd64 ...`.
#[must_use]
pub fn parse_version_output(output: &str) -> Option<String> {
    let first_line = output.lines().find(|line| !line.trim().is_empty())?;
    first_line.split_whitespace().find_map(|token| {
        let candidate = token.strip_prefix('v').unwrap_or(token);
        let starts_with_digit = candidate.chars().next().is_some_and(|ch| ch.is_ascii_digit());
        (starts_with_digit && parse_semver(candidate).is_some()).then(|| candidate.to_string())
    })
}

fn parse_semver(version: &str) -> Option<Version> {
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let (core, suffix) = split_semver_core_and_suffix(version);
    let mut parts = core.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = parts.next().and_then(|part| part.parse::<u64>().ok());
    let patch = parts.next().and_then(|part| part.parse::<u64>().ok());

    if parts.next().is_some() {
        return None;
    }

    let normalized = match (minor, patch) {
        (None, None) => format!("{major}.0.0{suffix}"),
        (Some(minor), None) => format!("{major}.{minor}.0{suffix}"),
        (Some(minor), Some(patch)) => format!("{major}.{minor}.{patch}{suffix}"),
        (None, Some(_)) => return None,
    };

    Version::parse(&normalized).ok()
}

fn split_semver_core_and_suffix(version: &str) -> (&str, &str) {
    let suffix_idx = version.find(['-', '+']).unwrap_or(version.len());
    (&version[..suffix_idx], &version[suffix_idx..])
}

fn parse_sha256_digest(digest: &str) -> Option<String> {
    let (algorithm, hash) = digest.split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") {
        return None;
    }
    if hash.len() != 64 || !hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(hash.to_ascii_lowercase())
}
