use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::warn;
use serde::de::DeserializeOwned;
use upkeep_backend::Config;
use upkeep_platform::AppPaths;

/// Subscription id to unix seconds of its last successful refresh.
type SubscriptionState = BTreeMap<String, i64>;

/// The settings file plus the subscription timestamp file layered over it.
#[derive(Debug, Clone)]
pub struct ConfigFiles {
    settings: PathBuf,
    subscription_state: PathBuf,
}

impl ConfigFiles {
    pub fn new(paths: &AppPaths) -> Self {
        Self {
            settings: paths.settings_file(),
            subscription_state: paths.subscription_state_file(),
        }
    }

    /// Load the configuration, falling back to defaults for a missing or
    /// unreadable settings file. Newer timestamps from the state file win.
    pub fn load(&self) -> Config {
        let mut config: Config = read_json(&self.settings).unwrap_or_default();
        if let Some(state) = read_json::<SubscriptionState>(&self.subscription_state) {
            apply_subscription_state(&mut config, &state);
        }
        config
    }

    pub fn save_config(&self, config: &Config) -> std::io::Result<()> {
        let content = serde_json::to_vec_pretty(config)?;
        write_atomic(&self.settings, &content)
    }

    pub fn save_subscription_state(&self, config: &Config) -> std::io::Result<()> {
        let state: SubscriptionState = config
            .subscriptions
            .iter()
            .map(|item| (item.id.clone(), item.last_update_time))
            .collect();
        let content = serde_json::to_vec_pretty(&state)?;
        write_atomic(&self.subscription_state, &content)
    }
}

fn apply_subscription_state(config: &mut Config, state: &SubscriptionState) {
    for item in &mut config.subscriptions {
        if let Some(&timestamp) = state.get(&item.id) {
            item.last_update_time = item.last_update_time.max(timestamp);
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            warn!("Failed to read {}: {error}", path.display());
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!("Ignoring malformed {}: {error}", path.display());
            None
        }
    }
}

/// Write `data` to a unique sibling temp file and rename it over `path`.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("upkeep");
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let pid = std::process::id();

    let mut tmp_path = None;
    for attempt in 0..16_u8 {
        let candidate = parent.join(format!(".{file_name}.{pid}.{timestamp}.{attempt}.tmp"));
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut file) => {
                file.write_all(data)?;
                file.sync_all()?;
                tmp_path = Some(candidate);
                break;
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }

    let Some(tmp_path) = tmp_path else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "failed to create unique temp file",
        ));
    };

    if let Err(error) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(error);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use upkeep_backend::{Config, SubscriptionItem};
    use upkeep_platform::AppPaths;

    use super::{ConfigFiles, write_atomic};

    fn sample_config() -> Config {
        let mut config = Config::default();
        config.gui.auto_update_interval_hours = 6;
        config.subscriptions = vec![
            SubscriptionItem::new("s1", "https://example.com/s1", 60),
            SubscriptionItem::new("s2", "https://example.com/s2", 0),
        ];
        config
    }

    #[test]
    fn missing_files_load_defaults() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let files = ConfigFiles::new(&AppPaths::rooted_at(temp_dir.path()));

        assert_eq!(files.load(), Config::default());
    }

    #[test]
    fn malformed_settings_load_defaults() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = AppPaths::rooted_at(temp_dir.path());
        std::fs::create_dir_all(&paths.config_dir).expect("config dir should be created");
        std::fs::write(paths.settings_file(), "{ not json").expect("settings should be written");

        assert_eq!(ConfigFiles::new(&paths).load(), Config::default());
    }

    #[test]
    fn saved_config_loads_back_with_newer_state_timestamps() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let files = ConfigFiles::new(&AppPaths::rooted_at(temp_dir.path()));
        let mut config = sample_config();

        files.save_config(&config).expect("config should save");
        config.subscriptions[0].last_update_time = 1_700_000_000;
        files
            .save_subscription_state(&config)
            .expect("state should save");

        let loaded = files.load();
        assert_eq!(loaded.gui.auto_update_interval_hours, 6);
        assert_eq!(loaded.subscriptions[0].last_update_time, 1_700_000_000);
        assert_eq!(loaded.subscriptions[1].last_update_time, 0);
    }

    #[test]
    fn write_atomic_replaces_existing_file_and_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("nested").join("settings.json");

        write_atomic(&path, b"first").expect("first write should succeed");
        write_atomic(&path, b"second").expect("second write should succeed");

        assert_eq!(
            std::fs::read_to_string(&path).expect("file should be readable"),
            "second"
        );
        let entries = std::fs::read_dir(temp_dir.path().join("nested"))
            .expect("directory should be readable")
            .count();
        assert_eq!(entries, 1);
    }
}
