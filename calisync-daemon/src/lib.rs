//! Sync orchestrator runtime: process runner, change detector, server
//! controller, sync cycle and fixed-delay scheduler.

pub mod change;
pub mod cycle;
mod error;
pub mod log_rotation;
pub mod logging;
pub mod process;
mod runtime;
pub mod scheduler;
pub mod server;

pub use change::{ChangeDetector, ChangeSignal, FsMtime, MtimeSource};
pub use cycle::{Cycle, CycleOutcome, SyncCycle};
pub use error::{DaemonError, ReloadError, RunError, StartError, StatError};
pub use logging::{CycleLog, CycleLogGuard, LineFormat, LogFileSlot, TeeMakeWriter};
pub use process::{ProcessRunner, SyncProcess};
pub use runtime::{run, start_blocking, RunOptions};
pub use scheduler::{CycleTally, Scheduler};
pub use server::{free_port, Reloader, ServerController, ServerHandle};
