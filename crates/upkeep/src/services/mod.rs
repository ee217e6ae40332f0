//! Network-backed implementation of the scheduler's update service.

mod engines;
mod geo;
mod gui;
mod subscription;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use upkeep_backend::{Config, EngineType, UpdateError, UpdateService};
use upkeep_platform::AppPaths;

/// Reaches GitHub and subscription providers over one shared HTTP client.
pub struct HttpUpdateService {
    client: reqwest::Client,
    paths: AppPaths,
}

impl HttpUpdateService {
    pub fn new(paths: AppPaths, http_timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http_timeout_secs))
            .user_agent(format!("upkeep/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client, paths }
    }
}

#[async_trait]
impl UpdateService for HttpUpdateService {
    async fn check_update_core(
        &self,
        engine: EngineType,
        config: &Config,
    ) -> Result<Option<PathBuf>, UpdateError> {
        engines::check_update(
            &self.client,
            &self.paths,
            engine,
            config.gui.check_pre_release,
        )
        .await
    }

    async fn update_geo_files(&self, config: &Config) -> Result<String, UpdateError> {
        geo::update_files(&self.client, &self.paths, &config.geo_sources).await
    }

    async fn check_update_gui(&self, config: &Config) -> Result<String, UpdateError> {
        gui::check_update(&self.client, config.gui.check_pre_release).await
    }

    async fn update_subscription(
        &self,
        config: &Config,
        subscription_id: &str,
    ) -> Result<String, UpdateError> {
        let item = config
            .subscription(subscription_id)
            .ok_or_else(|| UpdateError::SubscriptionNotFound {
                id: subscription_id.to_string(),
            })?;
        subscription::refresh(&self.client, &self.paths, item).await
    }
}
