use async_trait::async_trait;
use log::debug;
use upkeep_backend::{Config, ConfigStore, SubscriptionItem, UpdateError};

use crate::settings::ConfigFiles;

/// `ConfigStore` backed by the JSON settings and subscription state files.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    files: ConfigFiles,
}

impl JsonConfigStore {
    pub fn new(files: ConfigFiles) -> Self {
        Self { files }
    }

    async fn run_blocking<F>(
        &self,
        what: &'static str,
        config: &Config,
        write: F,
    ) -> Result<(), UpdateError>
    where
        F: FnOnce(&ConfigFiles, &Config) -> std::io::Result<()> + Send + 'static,
    {
        let files = self.files.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || write(&files, &config))
            .await
            .map_err(|error| UpdateError::persist_failed(what, error.to_string()))?
            .map_err(|error| UpdateError::persist_failed(what, error.to_string()))
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn save_config(&self, config: &Config) -> Result<(), UpdateError> {
        self.run_blocking("config", config, ConfigFiles::save_config)
            .await
    }

    async fn save_subscription(
        &self,
        config: &Config,
        item: &SubscriptionItem,
    ) -> Result<(), UpdateError> {
        debug!("Saving refresh time of subscription {}", item.label());
        self.run_blocking(
            "subscription state",
            config,
            ConfigFiles::save_subscription_state,
        )
        .await
    }

    async fn save_subscription_state(&self, config: &Config) -> Result<(), UpdateError> {
        self.run_blocking(
            "subscription state",
            config,
            ConfigFiles::save_subscription_state,
        )
        .await
    }
}
