use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::{Config, SubscriptionItem};
use crate::engine::EngineType;
use crate::error::UpdateError;

/// Network-facing update operations the scheduler drives.
#[async_trait]
pub trait UpdateService: Send + Sync {
    /// Download a newer build of `engine` if one exists.
    ///
    /// Returns the path of the downloaded archive, or `None` when the
    /// installed build is already the latest.
    async fn check_update_core(
        &self,
        engine: EngineType,
        config: &Config,
    ) -> Result<Option<PathBuf>, UpdateError>;

    async fn update_geo_files(&self, config: &Config) -> Result<String, UpdateError>;

    async fn check_update_gui(&self, config: &Config) -> Result<String, UpdateError>;

    async fn update_subscription(
        &self,
        config: &Config,
        subscription_id: &str,
    ) -> Result<String, UpdateError>;
}

/// Persistence for the shared configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn save_config(&self, config: &Config) -> Result<(), UpdateError>;

    /// Persist one subscription right after it was refreshed.
    async fn save_subscription(
        &self,
        config: &Config,
        item: &SubscriptionItem,
    ) -> Result<(), UpdateError>;

    /// Persist the refresh state of every subscription.
    async fn save_subscription_state(&self, config: &Config) -> Result<(), UpdateError> {
        self.save_config(config).await
    }
}
