use upkeep_backend::UpdateError;
use upkeep_core::{GitHubRelease, fetch_latest_release, is_newer_version};

const GITHUB_REPO: &str = "upkeep-rs/upkeep";

pub(super) async fn check_update(
    client: &reqwest::Client,
    include_prerelease: bool,
) -> Result<String, UpdateError> {
    let release = fetch_latest_release(client, GITHUB_REPO, include_prerelease)
        .await
        .map_err(|error| UpdateError::network_request_from("check upkeep update", error))?;
    Ok(availability_message(&release, env!("CARGO_PKG_VERSION")))
}

fn availability_message(release: &GitHubRelease, current: &str) -> String {
    if is_newer_version(release.version(), current) {
        format!(
            "upkeep {} is available (running {current}): {}",
            release.version(),
            release.html_url
        )
    } else {
        format!("upkeep {current} is up to date")
    }
}

#[cfg(test)]
mod tests {
    use upkeep_core::GitHubRelease;

    use super::availability_message;

    fn release(tag: &str) -> GitHubRelease {
        serde_json::from_value(serde_json::json!({
            "tag_name": tag,
            "html_url": format!("https://github.com/upkeep-rs/upkeep/releases/tag/{tag}"),
            "body": "notes",
            "prerelease": false
        }))
        .expect("release json should parse")
    }

    #[test]
    fn newer_release_is_announced_with_link() {
        let message = availability_message(&release("v0.5.0"), "0.4.0");
        assert!(message.starts_with("upkeep 0.5.0 is available"));
        assert!(message.ends_with("/releases/tag/v0.5.0"));
    }

    #[test]
    fn same_or_older_release_is_up_to_date() {
        assert_eq!(
            availability_message(&release("v0.4.0"), "0.4.0"),
            "upkeep 0.4.0 is up to date"
        );
        assert_eq!(
            availability_message(&release("v0.3.9"), "0.4.0"),
            "upkeep 0.4.0 is up to date"
        );
    }
}
