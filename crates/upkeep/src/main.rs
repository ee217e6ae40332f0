mod logging;
mod services;
mod settings;
mod single_instance;
mod store;

use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use upkeep_backend::ConfigStore;
use upkeep_core::{ProgressEvent, ProgressReporter, Scheduler, SchedulerTiming};
use upkeep_platform::AppPaths;

use crate::services::HttpUpdateService;
use crate::settings::ConfigFiles;
use crate::single_instance::{AcquireError, SingleInstance};
use crate::store::JsonConfigStore;

const PROGRESS_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> ExitCode {
    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("upkeep: {error}");
            return ExitCode::FAILURE;
        }
    };

    let _instance = match SingleInstance::acquire(&paths) {
        Ok(instance) => instance,
        Err(AcquireError::AlreadyRunning) => {
            eprintln!("upkeep: another instance is already running");
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            eprintln!("upkeep: {error}");
            return ExitCode::FAILURE;
        }
    };

    let files = ConfigFiles::new(&paths);
    let config = files.load();
    logging::init_logging(&paths, config.debug_logging, config.max_log_size_bytes);
    info!("upkeep {} starting", env!("CARGO_PKG_VERSION"));

    let timing = SchedulerTiming::default().with_task_timeout_secs(config.task_timeout_secs);
    let service = Arc::new(HttpUpdateService::new(
        paths.clone(),
        config.http_timeout_secs,
    ));
    let store = Arc::new(JsonConfigStore::new(files));
    let config = Arc::new(RwLock::new(config));
    let (progress, mut events) = ProgressReporter::channel(PROGRESS_CAPACITY);

    let cancel = CancellationToken::new();
    let handle = Scheduler::new(
        Arc::clone(&config),
        service,
        Arc::clone(&store) as Arc<dyn ConfigStore>,
        &paths,
        progress,
    )
    .with_timing(timing)
    .start(cancel);

    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_progress(&event);
        }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown requested");
            handle.shutdown().await;
        }
        Err(error) => {
            error!("Failed to listen for the shutdown signal: {error}");
            handle.join().await;
        }
    }
    if let Err(error) = drain.await {
        error!("Progress drain terminated abnormally: {error}");
    }

    let snapshot = config.read().await.clone();
    if let Err(error) = store.save_config(&snapshot).await {
        warn!("Failed to save config on exit: {error}");
    }
    if let Err(error) = store.save_subscription_state(&snapshot).await {
        warn!("Failed to save subscription state on exit: {error}");
    }

    info!("upkeep stopped");
    ExitCode::SUCCESS
}

fn log_progress(event: &ProgressEvent) {
    if event.success {
        info!("{}", event.message);
    } else {
        warn!("{}", event.message);
    }
}
