//! One synchronization attempt: run the sync tool, check the watched file,
//! notify the server when it changed.

use std::time::Duration;

use async_trait::async_trait;

use calisync_core::SyncConfig;

use crate::change::{ChangeDetector, ChangeSignal, FsMtime, MtimeSource};
use crate::error::RunError;
use crate::process::ProcessRunner;
use crate::server::Reloader;

/// Result of a single cycle, handed back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    SyncFailed(String),
    SyncOkNoChange,
    SyncOkChanged,
}

/// A unit of work the [`crate::Scheduler`] runs at a fixed delay.
#[async_trait]
pub trait Cycle: Send {
    async fn run(&mut self) -> CycleOutcome;
}

pub struct SyncCycle<R, M = FsMtime> {
    runner: ProcessRunner,
    detector: ChangeDetector<M>,
    reloader: R,
    sync_timeout: Option<Duration>,
}

impl<R: Reloader> SyncCycle<R, FsMtime> {
    pub fn new(config: &SyncConfig, reloader: R) -> Self {
        Self::from_parts(
            ProcessRunner::new(config.sync_command.clone()),
            ChangeDetector::new(&config.metadata_db_path),
            reloader,
            config.sync_timeout(),
        )
    }
}

impl<R: Reloader, M: MtimeSource> SyncCycle<R, M> {
    pub fn from_parts(
        runner: ProcessRunner,
        detector: ChangeDetector<M>,
        reloader: R,
        sync_timeout: Option<Duration>,
    ) -> Self {
        Self {
            runner,
            detector,
            reloader,
            sync_timeout,
        }
    }

    pub fn detector(&self) -> &ChangeDetector<M> {
        &self.detector
    }

    /// RunningSync → {Failed | CheckingChange} → {Reloading | Done}.
    pub async fn run_once(&mut self) -> CycleOutcome {
        tracing::info!("Starting OneDrive sync...");
        if let Err(err) = self.sync().await {
            tracing::error!("OneDrive sync failed: {err}");
            return CycleOutcome::SyncFailed(err.to_string());
        }
        tracing::info!("OneDrive sync finished.");

        match self.detector.check_and_record() {
            ChangeSignal::Changed => {
                tracing::info!("Changes detected in metadata.db. Reloading CalibreWeb DB...");
                // Already logged by the reloader; one failed notification
                // never affects later cycles.
                let _ = self.reloader.notify_reload().await;
                CycleOutcome::SyncOkChanged
            }
            ChangeSignal::Unchanged => {
                tracing::info!(
                    "No changes detected in metadata.db. No need to reload CalibreWeb DB."
                );
                CycleOutcome::SyncOkNoChange
            }
            ChangeSignal::NoPriorState => {
                tracing::info!(
                    "No prior state for metadata.db, baseline recorded. No need to reload CalibreWeb DB."
                );
                CycleOutcome::SyncOkNoChange
            }
            ChangeSignal::StatError(err) => {
                tracing::warn!(
                    "Error getting last modified time for {}: {}",
                    err.path.display(),
                    err.source
                );
                tracing::warn!(
                    "Could not determine the last modified time of the metadata database."
                );
                CycleOutcome::SyncOkNoChange
            }
        }
    }

    async fn sync(&self) -> Result<(), RunError> {
        match self.sync_timeout {
            // Timing out drops the process handle, which kills the child.
            Some(timeout) => tokio::time::timeout(timeout, self.stream_sync())
                .await
                .map_err(|_| RunError::Timeout {
                    command: self.runner.command_line(),
                    timeout,
                })?,
            None => self.stream_sync().await,
        }
    }

    async fn stream_sync(&self) -> Result<(), RunError> {
        let mut process = self.runner.spawn()?;
        while let Some(line) = process.next_line().await? {
            tracing::info!("{line}");
        }
        process.finish().await
    }
}

#[async_trait]
impl<R: Reloader, M: MtimeSource> Cycle for SyncCycle<R, M> {
    async fn run(&mut self) -> CycleOutcome {
        self.run_once().await
    }
}
