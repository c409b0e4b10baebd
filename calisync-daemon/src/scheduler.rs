//! Fixed-delay scheduler.
//!
//! The first cycle starts one delay after the scheduler is started. Each
//! following cycle starts one delay after the previous cycle *completed*, so
//! cycles never overlap and a slow sync pushes the whole schedule back.
//! Every outcome re-arms the schedule, failures included.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::cycle::{Cycle, CycleOutcome};
use crate::logging::CycleLog;

/// Counters for a bounded run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleTally {
    pub completed: u64,
    pub failed: u64,
    pub changed: u64,
}

impl CycleTally {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.completed += 1;
        match outcome {
            CycleOutcome::SyncFailed(_) => self.failed += 1,
            CycleOutcome::SyncOkChanged => self.changed += 1,
            CycleOutcome::SyncOkNoChange => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    delay: Duration,
    log: Option<CycleLog>,
}

impl Scheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay, log: None }
    }

    /// Open `log` for the duration of every cycle.
    pub fn with_cycle_log(mut self, log: CycleLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Run until the process is killed.
    pub async fn run_forever<C: Cycle>(&self, cycle: &mut C) {
        let mut number = 0u64;
        loop {
            number += 1;
            self.tick(cycle, number).await;
        }
    }

    /// Run exactly `count` cycles, each preceded by the delay.
    pub async fn run_cycles<C: Cycle>(&self, cycle: &mut C, count: u64) -> CycleTally {
        let mut tally = CycleTally::default();
        for number in 1..=count {
            let outcome = self.tick(cycle, number).await;
            tally.record(&outcome);
        }
        tally
    }

    async fn tick<C: Cycle>(&self, cycle: &mut C, number: u64) -> CycleOutcome {
        sleep(self.delay).await;

        // Held until the end of this function: the outcome line below still
        // lands in the cycle's log file.
        let _log = self.log.as_ref().map(CycleLog::open);
        let started = Instant::now();
        let outcome = cycle.run().await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            CycleOutcome::SyncFailed(reason) => tracing::warn!(
                cycle = number,
                duration_ms,
                reason = %reason,
                "cycle failed, next sync in {}s",
                self.delay.as_secs()
            ),
            CycleOutcome::SyncOkChanged | CycleOutcome::SyncOkNoChange => tracing::debug!(
                cycle = number,
                duration_ms,
                changed = matches!(outcome, CycleOutcome::SyncOkChanged),
                "cycle complete, next sync in {}s",
                self.delay.as_secs()
            ),
        }
        outcome
    }
}
