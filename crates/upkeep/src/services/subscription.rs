use std::path::PathBuf;

use log::debug;
use upkeep_backend::{SubscriptionItem, UpdateError};
use upkeep_platform::AppPaths;

use crate::settings::write_atomic;

const OPERATION: &str = "update subscription";

pub(super) async fn refresh(
    client: &reqwest::Client,
    paths: &AppPaths,
    item: &SubscriptionItem,
) -> Result<String, UpdateError> {
    if item.url.trim().is_empty() {
        return Err(UpdateError::network_request(
            OPERATION,
            format!("subscription {} has no url", item.label()),
        ));
    }

    debug!("Fetching subscription {} from {}", item.label(), item.url);
    let response = client
        .get(&item.url)
        .send()
        .await
        .map_err(|error| UpdateError::network_request_from(OPERATION, error))?;
    if !response.status().is_success() {
        return Err(UpdateError::network_request(
            OPERATION,
            format!("HTTP {} for {}", response.status(), item.label()),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|error| UpdateError::network_parse_from(OPERATION, error))?;
    if body.is_empty() {
        return Err(UpdateError::network_parse(
            OPERATION,
            format!("empty response for {}", item.label()),
        ));
    }

    let path = content_file(paths, &item.id);
    let size = body.len();
    tokio::task::spawn_blocking(move || write_atomic(&path, &body))
        .await
        .map_err(|error| UpdateError::persist_failed("subscription content", error.to_string()))?
        .map_err(|error| UpdateError::persist_failed("subscription content", error.to_string()))?;

    Ok(format!("Updated subscription {}: {size} bytes", item.label()))
}

/// `<data_dir>/subscriptions/<id>.txt`, with characters that are unsafe in
/// file names replaced.
fn content_file(paths: &AppPaths, id: &str) -> PathBuf {
    let name: String = id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    paths.subscriptions_dir().join(format!("{name}.txt"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use upkeep_backend::{SubscriptionItem, UpdateError};
    use upkeep_platform::AppPaths;

    use super::{content_file, refresh};

    #[test]
    fn content_file_sanitizes_ids() {
        let paths = AppPaths::rooted_at(Path::new("/opt/upkeep"));

        assert_eq!(
            content_file(&paths, "a1-b_2"),
            paths.subscriptions_dir().join("a1-b_2.txt")
        );
        assert_eq!(
            content_file(&paths, "../evil"),
            paths.subscriptions_dir().join("___evil.txt")
        );
    }

    #[tokio::test]
    async fn missing_url_is_rejected_before_any_request() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let item = SubscriptionItem::new("s1", "  ", 60);

        let error = refresh(
            &reqwest::Client::new(),
            &AppPaths::rooted_at(temp_dir.path()),
            &item,
        )
        .await
        .expect_err("empty url should fail");

        assert!(matches!(error, UpdateError::NetworkError { ref details, .. } if details.contains("no url")));
    }
}
