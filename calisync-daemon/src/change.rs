//! Poll-based change detection for a single watched file.
//!
//! Signal rules:
//! 1. `StatError` when the file cannot be stat'ed (stored state untouched)
//! 2. `NoPriorState` on the first successful observation (baseline recorded)
//! 3. `Changed` when the mtime is strictly newer than the stored one
//! 4. `Unchanged` otherwise, including equal or earlier mtimes

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::StatError;

/// Source of file modification times.
pub trait MtimeSource: Send + Sync {
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;
}

/// Reads mtimes from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMtime;

impl MtimeSource for FsMtime {
    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }
}

/// Outcome of one [`ChangeDetector::check_and_record`] call.
#[derive(Debug)]
pub enum ChangeSignal {
    NoPriorState,
    Changed,
    Unchanged,
    StatError(StatError),
}

#[derive(Debug, Clone)]
pub struct ChangeDetector<M = FsMtime> {
    path: PathBuf,
    source: M,
    last_modified: Option<SystemTime>,
}

impl ChangeDetector<FsMtime> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_source(path, FsMtime)
    }
}

impl<M: MtimeSource> ChangeDetector<M> {
    pub fn with_source(path: impl Into<PathBuf>, source: M) -> Self {
        Self {
            path: path.into(),
            source,
            last_modified: None,
        }
    }

    /// Start from a known timestamp instead of an empty state.
    pub fn with_baseline(mut self, baseline: SystemTime) -> Self {
        self.last_modified = Some(baseline);
        self
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Stat the watched file and compare against the stored mtime.
    pub fn check_and_record(&mut self) -> ChangeSignal {
        let current = match self.source.modified(&self.path) {
            Ok(current) => current,
            Err(source) => {
                return ChangeSignal::StatError(StatError {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match self.last_modified {
            None => {
                self.last_modified = Some(current);
                ChangeSignal::NoPriorState
            }
            Some(stored) if current > stored => {
                self.last_modified = Some(current);
                ChangeSignal::Changed
            }
            Some(_) => ChangeSignal::Unchanged,
        }
    }
}
