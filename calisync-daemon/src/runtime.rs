//! Daemon entrypoint: validate the configuration, install logging, clear
//! the server port, start the content server and drive the sync schedule.

use calisync_core::SyncConfig;

use crate::cycle::SyncCycle;
use crate::error::{io_err, DaemonError};
use crate::logging::{self, CycleLog, LogFileSlot};
use crate::scheduler::Scheduler;
use crate::server::{self, ServerController};

/// Knobs that shape a run without being part of the sync configuration.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Stop after this many cycles. `None` runs until killed.
    pub max_cycles: Option<u64>,
    /// Kill any process listening on the server port before starting it.
    pub free_port: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_cycles: None,
            free_port: true,
        }
    }
}

/// Validate the config, install logging and drive the scheduler on a
/// single-threaded runtime, blocking the caller.
pub fn start_blocking(config: SyncConfig, options: RunOptions) -> Result<(), DaemonError> {
    config.validate()?;
    let slot = LogFileSlot::default();
    logging::init(slot.clone());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config, options, slot));
    Ok(())
}

/// Boot the content server and run the sync schedule.
pub async fn run(config: SyncConfig, options: RunOptions, slot: LogFileSlot) {
    if options.free_port {
        server::free_port(config.server_port);
    }

    let mut controller = ServerController::new(&config);
    if controller.start().is_err() {
        tracing::debug!("continuing without a managed server");
    }

    let mut scheduler = Scheduler::new(config.interval());
    if config.log_enabled {
        scheduler = scheduler.with_cycle_log(CycleLog::new(&config.log_path, slot));
    }
    let mut cycle = SyncCycle::new(&config, controller);

    tracing::info!(
        command = %config.sync_command_line(),
        watched = %config.metadata_db_path.display(),
        reconnect = %config.reconnect_url(),
        "sync scheduled every {}s",
        config.interval_secs
    );

    match options.max_cycles {
        Some(count) => {
            let tally = scheduler.run_cycles(&mut cycle, count).await;
            tracing::info!(
                completed = tally.completed,
                failed = tally.failed,
                changed = tally.changed,
                "cycle limit reached, stopping"
            );
        }
        None => scheduler.run_forever(&mut cycle).await,
    }
}
