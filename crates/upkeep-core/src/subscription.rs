//! Refresh of subscriptions whose own interval has elapsed.

use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use upkeep_backend::{ConfigStore, SubscriptionItem, UpdateError, UpdateService};

use crate::SharedConfig;
use crate::progress::ProgressReporter;
use crate::task::{run_guarded, sleep_or_cancelled};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOutcome {
    pub id: String,
    pub result: Result<String, UpdateError>,
}

/// Subscriptions due at `now` (unix seconds), in configuration order.
#[must_use]
pub fn select_due(subscriptions: &[SubscriptionItem], now: i64) -> Vec<SubscriptionItem> {
    subscriptions
        .iter()
        .filter(|item| item.is_due(now))
        .cloned()
        .collect()
}

pub struct SubscriptionRefresher<'a> {
    pub config: &'a SharedConfig,
    pub service: &'a dyn UpdateService,
    pub store: &'a dyn ConfigStore,
    pub progress: &'a ProgressReporter,
    pub cancel: &'a CancellationToken,
    pub timeout: Duration,
    /// Delay after each refreshed subscription.
    pub pacing: Duration,
}

impl SubscriptionRefresher<'_> {
    /// Refresh every due subscription using the current wall clock.
    pub async fn refresh_due(&self) -> Vec<SubscriptionOutcome> {
        self.refresh_due_at(chrono::Utc::now().timestamp()).await
    }

    /// Refresh every subscription due at `now`.
    ///
    /// `now` is both the selection instant and the timestamp recorded on
    /// success, even when the refresh of later items finishes much later.
    pub async fn refresh_due_at(&self, now: i64) -> Vec<SubscriptionOutcome> {
        let (due, snapshot) = {
            let config = self.config.read().await;
            (select_due(&config.subscriptions, now), config.clone())
        };
        if due.is_empty() {
            return Vec::new();
        }

        info!("Execute update subscription ({} due)", due.len());
        let mut outcomes = Vec::with_capacity(due.len());

        for item in due {
            let result = run_guarded(
                self.cancel,
                self.timeout,
                "subscription update",
                self.service.update_subscription(&snapshot, &item.id),
            )
            .await;

            if matches!(&result, Err(error) if error.is_cancelled()) {
                break;
            }

            match &result {
                Ok(message) => {
                    info!("Update subscription end. {message}");
                    self.progress.success(message.clone()).await;
                    self.record_success(&item.id, now).await;
                }
                Err(error) => {
                    warn!("Update subscription {} failed: {error}", item.label());
                    self.progress
                        .failure(format!(
                            "Failed to update subscription {}: {error}",
                            item.label()
                        ))
                        .await;
                }
            }
            outcomes.push(SubscriptionOutcome {
                id: item.id,
                result,
            });

            if !sleep_or_cancelled(self.cancel, self.pacing).await {
                break;
            }
        }

        outcomes
    }

    async fn record_success(&self, id: &str, now: i64) {
        let persisted = {
            let mut config = self.config.write().await;
            let item = config.subscription_mut(id).map(|item| {
                item.last_update_time = now;
                item.clone()
            });
            item.map(|item| (item, config.clone()))
        };

        // Removed while the refresh was in flight.
        let Some((item, snapshot)) = persisted else {
            debug!("Subscription {id} no longer configured; timestamp dropped");
            return;
        };

        if let Err(error) = self.store.save_subscription(&snapshot, &item).await {
            warn!("Failed to save subscription {}: {error}", item.label());
            self.progress
                .failure(format!("Failed to save subscription {}: {error}", item.label()))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::RwLock;
    use tokio_util::sync::CancellationToken;
    use upkeep_backend::{Config, SubscriptionItem};

    use super::{SubscriptionRefresher, select_due};
    use crate::SharedConfig;
    use crate::progress::ProgressReporter;
    use crate::test_support::{MemoryStore, MockUpdateService};

    const NOW: i64 = 1_700_000_000;

    fn config_with(items: Vec<SubscriptionItem>) -> SharedConfig {
        Arc::new(RwLock::new(Config {
            subscriptions: items,
            ..Config::default()
        }))
    }

    fn item(id: &str, interval_minutes: u32, last_update_time: i64) -> SubscriptionItem {
        SubscriptionItem {
            last_update_time,
            ..SubscriptionItem::new(id, format!("https://example.com/{id}"), interval_minutes)
        }
    }

    async fn refresh(
        config: &SharedConfig,
        service: &MockUpdateService,
        store: &MemoryStore,
        progress: &ProgressReporter,
    ) -> Vec<super::SubscriptionOutcome> {
        let cancel = CancellationToken::new();
        SubscriptionRefresher {
            config,
            service,
            store,
            progress,
            cancel: &cancel,
            timeout: Duration::from_secs(30),
            pacing: Duration::from_secs(1),
        }
        .refresh_due_at(NOW)
        .await
    }

    #[test]
    fn select_due_honours_interval_and_disabled_items() {
        let items = vec![
            item("s1", 60, NOW - 7200),
            item("s2", 60, NOW - 1800),
            item("off", 0, 0),
            item("edge", 60, NOW - 3600),
        ];

        let due: Vec<String> = select_due(&items, NOW).into_iter().map(|i| i.id).collect();

        assert_eq!(due, ["s1", "edge"]);
    }

    #[tokio::test(start_paused = true)]
    async fn only_due_subscriptions_are_refreshed_and_stamped() {
        let config = config_with(vec![item("s1", 60, NOW - 7200), item("s2", 60, NOW - 1800)]);
        let service = MockUpdateService::default();
        let store = MemoryStore::default();
        let (progress, _rx) = ProgressReporter::channel(16);

        let outcomes = refresh(&config, &service, &store, &progress).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(service.call_names(), ["subscription:s1"]);
        let config = config.read().await;
        assert_eq!(config.subscriptions[0].last_update_time, NOW);
        assert_eq!(config.subscriptions[1].last_update_time, NOW - 1800);
        let saved = store.saved_subscriptions();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, "s1");
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_timestamp_and_continues() {
        let config = config_with(vec![item("s1", 60, 0), item("s2", 60, 0)]);
        let service = MockUpdateService {
            failing_subscriptions: vec!["s1".to_string()],
            ..MockUpdateService::default()
        };
        let store = MemoryStore::default();
        let (progress, mut rx) = ProgressReporter::channel(16);

        let outcomes = refresh(&config, &service, &store, &progress).await;

        assert!(outcomes[0].result.is_err());
        assert!(outcomes[1].result.is_ok());
        let config = config.read().await;
        assert_eq!(config.subscriptions[0].last_update_time, 0);
        assert_eq!(config.subscriptions[1].last_update_time, NOW);

        let first = rx.recv().await.expect("failure should be reported");
        assert!(!first.success);
        assert!(first.message.contains("s1"));
        assert!(rx.recv().await.expect("success should be reported").success);
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_are_paced() {
        let config = config_with(vec![item("a", 1, 0), item("b", 1, 0), item("c", 1, 0)]);
        let service = MockUpdateService::default();
        let store = MemoryStore::default();
        let (progress, _rx) = ProgressReporter::channel(16);

        refresh(&config, &service, &store, &progress).await;

        let calls = service.calls.lock().expect("calls lock should not be poisoned");
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1].1.duration_since(pair[0].1) >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_due_means_no_calls_and_no_events() {
        let config = config_with(vec![item("s1", 0, 0), item("s2", 60, NOW)]);
        let service = MockUpdateService::default();
        let store = MemoryStore::default();
        let (progress, mut rx) = ProgressReporter::channel(16);

        let outcomes = refresh(&config, &service, &store, &progress).await;
        drop(progress);

        assert!(outcomes.is_empty());
        assert!(service.call_names().is_empty());
        assert!(rx.recv().await.is_none());
    }
}
