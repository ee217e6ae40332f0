//! The four long-running maintenance loops and their shared context.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use upkeep_backend::{ConfigStore, GuiItem, UpdateService};
use upkeep_platform::AppPaths;

use crate::SharedConfig;
use crate::artifact::{InstallLayout, InstallLocks};
use crate::cadence::{CadenceState, is_due};
use crate::core_update::{CoreCycle, CoreCycleReport};
use crate::housekeeping::{PURGE_EVERY_TICKS, PurgeTargets, PurgeThresholds, TickPlan, purge_expired};
use crate::progress::ProgressReporter;
use crate::subscription::SubscriptionRefresher;
use crate::task::{run_guarded, sleep_or_cancelled};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTiming {
    /// Wake-up period of every loop.
    pub base_tick: Duration,
    /// Pause after each refreshed subscription.
    pub pacing: Duration,
    /// Upper bound on a single collaborator call.
    pub task_timeout: Duration,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            base_tick: Duration::from_secs(3600),
            pacing: Duration::from_secs(1),
            task_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl SchedulerTiming {
    #[must_use]
    pub fn with_task_timeout_secs(self, secs: u64) -> Self {
        Self {
            task_timeout: Duration::from_secs(secs),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Geo,
    Core,
    Gui,
}

impl Activity {
    fn name(self) -> &'static str {
        match self {
            Self::Geo => "geo",
            Self::Core => "core",
            Self::Gui => "gui",
        }
    }

    fn interval_hours(self, gui: &GuiItem) -> u32 {
        match self {
            Self::Geo => gui.auto_update_interval_hours,
            // The client self-update follows the core cadence.
            Self::Core | Self::Gui => gui.auto_update_core_interval_hours,
        }
    }
}

/// Owns the collaborators and drives the maintenance loops.
pub struct Scheduler {
    config: SharedConfig,
    service: Arc<dyn UpdateService>,
    store: Arc<dyn ConfigStore>,
    layout: InstallLayout,
    purge_targets: PurgeTargets,
    locks: InstallLocks,
    progress: ProgressReporter,
    timing: SchedulerTiming,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        config: SharedConfig,
        service: Arc<dyn UpdateService>,
        store: Arc<dyn ConfigStore>,
        paths: &AppPaths,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            config,
            service,
            store,
            layout: InstallLayout::new(paths.bin_dir()),
            purge_targets: PurgeTargets::from_paths(paths),
            locks: InstallLocks::default(),
            progress,
            timing: SchedulerTiming::default(),
        }
    }

    #[must_use]
    pub fn with_timing(mut self, timing: SchedulerTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Spawn the housekeeping, geo, core and GUI loops. They run until
    /// `cancel` fires.
    #[must_use]
    pub fn start(self, cancel: CancellationToken) -> SchedulerHandle {
        info!("Setup scheduled tasks");
        let scheduler = Arc::new(self);

        let tasks = vec![
            (
                "housekeeping",
                tokio::spawn(Arc::clone(&scheduler).housekeeping_loop(cancel.clone())),
            ),
            (
                Activity::Geo.name(),
                tokio::spawn(Arc::clone(&scheduler).cadence_loop(Activity::Geo, cancel.clone())),
            ),
            (
                Activity::Core.name(),
                tokio::spawn(Arc::clone(&scheduler).cadence_loop(Activity::Core, cancel.clone())),
            ),
            (
                Activity::Gui.name(),
                tokio::spawn(scheduler.cadence_loop(Activity::Gui, cancel.clone())),
            ),
        ];

        SchedulerHandle { cancel, tasks }
    }

    async fn housekeeping_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut tick: u64 = 1;
        while sleep_or_cancelled(&cancel, self.timing.base_tick).await {
            let plan = TickPlan::for_tick(tick);
            debug!("Housekeeping tick {tick}: {plan:?}");

            if plan.refresh_subscriptions {
                self.refresh_subscriptions(&cancel).await;
            }
            if plan.persist {
                self.persist().await;
            }
            if plan.purge {
                self.purge().await;
                self.geo_pass(tick / PURGE_EVERY_TICKS, &cancel).await;
            }

            tick += 1;
        }
        debug!("housekeeping loop stopped");
    }

    async fn cadence_loop(self: Arc<Self>, activity: Activity, cancel: CancellationToken) {
        let mut state = CadenceState::new(Instant::now());
        while sleep_or_cancelled(&cancel, self.timing.base_tick).await {
            let now = Instant::now();
            let interval = activity.interval_hours(&self.config.read().await.gui);
            if !state.tick(now, interval) {
                continue;
            }

            match activity {
                Activity::Geo => self.update_geo(&cancel).await,
                Activity::Core => {
                    self.update_core(&cancel).await;
                }
                Activity::Gui => self.update_gui(&cancel).await,
            }
            state.mark_run(now);
        }
        debug!("{} loop stopped after {} ticks", activity.name(), state.tick_count());
    }

    async fn refresh_subscriptions(&self, cancel: &CancellationToken) {
        let outcomes = SubscriptionRefresher {
            config: &self.config,
            service: self.service.as_ref(),
            store: self.store.as_ref(),
            progress: &self.progress,
            cancel,
            timeout: self.timing.task_timeout,
            pacing: self.timing.pacing,
        }
        .refresh_due()
        .await;

        if !outcomes.is_empty() {
            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            info!(
                "Subscription refresh finished: {} refreshed, {failed} failed",
                outcomes.len() - failed
            );
        }
    }

    async fn persist(&self) {
        let snapshot = self.config.read().await.clone();
        info!("Execute save config");

        if let Err(error) = self.store.save_config(&snapshot).await {
            warn!("Failed to save config: {error}");
            self.progress
                .failure(format!("Failed to save config: {error}"))
                .await;
        }
        if let Err(error) = self.store.save_subscription_state(&snapshot).await {
            warn!("Failed to save subscription state: {error}");
            self.progress
                .failure(format!("Failed to save subscription state: {error}"))
                .await;
        }
    }

    async fn purge(&self) {
        let targets = self.purge_targets.clone();
        let thresholds = PurgeThresholds::at(chrono::Local::now());
        match tokio::task::spawn_blocking(move || purge_expired(&targets, thresholds)).await {
            Ok(report) => info!("Deleted {} expired files", report.total()),
            Err(error) => error!("Purge task failed: {error}"),
        }
    }

    /// The extra geo refresh tied to the purge, gated on the purge count.
    async fn geo_pass(&self, hours: u64, cancel: &CancellationToken) {
        let interval = self.config.read().await.gui.auto_update_interval_hours;
        if is_due(hours, interval) {
            self.update_geo(cancel).await;
        }
    }

    async fn update_geo(&self, cancel: &CancellationToken) {
        info!("Execute update geo files");
        let _guard = self.locks.lock(self.layout.bin_dir()).await;
        let snapshot = self.config.read().await.clone();
        let result = run_guarded(
            cancel,
            self.timing.task_timeout,
            "geo update",
            self.service.update_geo_files(&snapshot),
        )
        .await;

        match result {
            Ok(message) => self.progress.success(message).await,
            Err(error) if error.is_cancelled() => {}
            Err(error) => {
                warn!("Geo update failed: {error}");
                self.progress
                    .failure(format!("Failed to update geo files: {error}"))
                    .await;
            }
        }
    }

    async fn update_core(&self, cancel: &CancellationToken) -> CoreCycleReport {
        info!("Execute update core");
        let snapshot = self.config.read().await.clone();
        let report = CoreCycle {
            service: self.service.as_ref(),
            layout: &self.layout,
            locks: &self.locks,
            progress: &self.progress,
            cancel,
            timeout: self.timing.task_timeout,
        }
        .run(&snapshot)
        .await;
        info!(
            "Core update cycle finished: {} checked, {} installed, {} failed",
            report.checks.len(),
            report.installed(),
            report.failed()
        );
        report
    }

    async fn update_gui(&self, cancel: &CancellationToken) {
        info!("Execute update upkeep");
        let snapshot = self.config.read().await.clone();
        let result = run_guarded(
            cancel,
            self.timing.task_timeout,
            "gui update",
            self.service.check_update_gui(&snapshot),
        )
        .await;

        match result {
            Ok(message) => self.progress.success(message).await,
            Err(error) if error.is_cancelled() => {}
            Err(error) => {
                warn!("Self-update check failed: {error}");
                self.progress
                    .failure(format!("Failed to check for upkeep updates: {error}"))
                    .await;
            }
        }
    }
}

/// Handle to the running loops.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl SchedulerHandle {
    /// Cancel every loop and wait for all of them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.join().await;
    }

    /// Wait for the loops to exit without cancelling them.
    pub async fn join(self) {
        for (name, task) in self.tasks {
            if let Err(error) = task.await {
                error!("{name} loop terminated abnormally: {error}");
            }
        }
    }
}
