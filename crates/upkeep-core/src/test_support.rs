use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;
use upkeep_backend::{Config, ConfigStore, EngineType, SubscriptionItem, UpdateError, UpdateService};

/// Scripted update service that records every call.
#[derive(Default)]
pub(crate) struct MockUpdateService {
    pub core_results: HashMap<EngineType, Result<Option<PathBuf>, UpdateError>>,
    pub failing_subscriptions: Vec<String>,
    pub geo_result: Option<UpdateError>,
    pub calls: Mutex<Vec<(String, Instant)>>,
}

impl MockUpdateService {
    fn record(&self, call: String) {
        self.calls
            .lock()
            .expect("calls lock should not be poisoned")
            .push((call, Instant::now()));
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock should not be poisoned")
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.call_names()
            .iter()
            .filter(|name| name.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl UpdateService for MockUpdateService {
    async fn check_update_core(
        &self,
        engine: EngineType,
        _config: &Config,
    ) -> Result<Option<PathBuf>, UpdateError> {
        self.record(format!("core:{}", engine.as_str()));
        self.core_results.get(&engine).cloned().unwrap_or(Ok(None))
    }

    async fn update_geo_files(&self, _config: &Config) -> Result<String, UpdateError> {
        self.record("geo".to_string());
        match &self.geo_result {
            Some(error) => Err(error.clone()),
            None => Ok("Geo files updated".to_string()),
        }
    }

    async fn check_update_gui(&self, _config: &Config) -> Result<String, UpdateError> {
        self.record("gui".to_string());
        Ok("upkeep is up to date".to_string())
    }

    async fn update_subscription(
        &self,
        _config: &Config,
        subscription_id: &str,
    ) -> Result<String, UpdateError> {
        self.record(format!("subscription:{subscription_id}"));
        if self
            .failing_subscriptions
            .iter()
            .any(|id| id == subscription_id)
        {
            Err(UpdateError::network_request("update subscription", "HTTP 502"))
        } else {
            Ok(format!("Subscription {subscription_id} updated"))
        }
    }
}

/// In-memory store that counts saves.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub config_saves: Mutex<usize>,
    pub state_saves: Mutex<usize>,
    pub subscriptions: Mutex<Vec<SubscriptionItem>>,
}

impl MemoryStore {
    pub fn config_saves(&self) -> usize {
        *self.config_saves.lock().expect("lock should not be poisoned")
    }

    pub fn state_saves(&self) -> usize {
        *self.state_saves.lock().expect("lock should not be poisoned")
    }

    pub fn saved_subscriptions(&self) -> Vec<SubscriptionItem> {
        self.subscriptions
            .lock()
            .expect("lock should not be poisoned")
            .clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn save_config(&self, _config: &Config) -> Result<(), UpdateError> {
        *self.config_saves.lock().expect("lock should not be poisoned") += 1;
        Ok(())
    }

    async fn save_subscription(
        &self,
        _config: &Config,
        item: &SubscriptionItem,
    ) -> Result<(), UpdateError> {
        self.subscriptions
            .lock()
            .expect("lock should not be poisoned")
            .push(item.clone());
        Ok(())
    }

    async fn save_subscription_state(&self, _config: &Config) -> Result<(), UpdateError> {
        *self.state_saves.lock().expect("lock should not be poisoned") += 1;
        Ok(())
    }
}
