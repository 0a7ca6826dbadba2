//! Run orchestration over a path tree.
//!
//! Every item path is given a state before any work is done, from the
//! persisted artifacts and the retry mode alone, so a restarted run makes the
//! same skip decisions as the run before it. Item failures are recorded and
//! never abort the batch.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indicatif::ProgressBar;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::ResolveError;
use crate::item::ResolveItem;
use crate::models::{ItemRunState, RetryMode};
use crate::progress::{create_spinner, format_duration, log_progress};
use crate::state::RunState;

/// Items between progress lines in log-only mode
const PROGRESS_LOG_INTERVAL: u64 = 50;

/// Decide an item's state from persisted state and the retry mode.
///
/// A previously failed path that is being retried is removed from the
/// failure list here, before any work is attempted.
pub fn decide_state(path: &str, retry: RetryMode, state: &mut RunState) -> ItemRunState {
    if state.failed.contains(path) {
        if retry.retries_failed() {
            state.failed.remove(path);
            return ItemRunState::Processing;
        }
        return ItemRunState::SkippedAlreadyFailed;
    }
    if state.results.contains_key(path) && !retry.retries_passed() {
        return ItemRunState::SkippedAlreadyDone;
    }
    ItemRunState::Processing
}

/// Key under which a path is persisted.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_done: usize,
    pub skipped_failed: usize,
    pub unsupported: usize,
    pub interrupted: bool,
}

impl RunSummary {
    fn record(&mut self, state: ItemRunState) {
        match state {
            ItemRunState::Succeeded => self.succeeded += 1,
            ItemRunState::Failed => self.failed += 1,
            ItemRunState::SkippedAlreadyDone => self.skipped_done += 1,
            ItemRunState::SkippedAlreadyFailed => self.skipped_failed += 1,
            ItemRunState::New | ItemRunState::Processing => {}
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped_done + self.skipped_failed + self.unsupported
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} already done, {} already failed, {} unsupported",
            self.succeeded, self.failed, self.skipped_done, self.skipped_failed, self.unsupported
        )?;
        if self.interrupted {
            f.write_str(" (interrupted)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct RunOrchestrator<'a> {
    resolver: &'a dyn ResolveItem,
    retry: RetryMode,
    interrupt: Arc<AtomicBool>,
}

impl<'a> RunOrchestrator<'a> {
    pub fn new(resolver: &'a dyn ResolveItem, retry: RetryMode) -> Self {
        Self {
            resolver,
            retry,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between items; setting it stops the run after the current item.
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Process every file under `paths`, depth-first in file-name order.
    pub fn run(&self, paths: &[PathBuf], state: &mut RunState) -> RunSummary {
        let start = Instant::now();
        let spinner = create_spinner("Resolving");
        let mut summary = RunSummary::default();

        'paths: for root in paths {
            for entry in WalkDir::new(root).sort_by_file_name() {
                if self.interrupted() {
                    warn!("Interrupted; stopping before {}", root.display());
                    summary.interrupted = true;
                    break 'paths;
                }
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Cannot read {}: {}", root.display(), e);
                        continue;
                    }
                };
                if entry.file_type().is_dir() {
                    continue;
                }
                self.process_file(entry.path(), state, &mut summary, &spinner);
            }
        }

        if self.interrupted() {
            summary.interrupted = true;
        }
        spinner.finish_and_clear();
        info!(
            "Run finished in {}: {}",
            format_duration(start.elapsed()),
            summary
        );
        summary
    }

    fn process_file(
        &self,
        path: &Path,
        state: &mut RunState,
        summary: &mut RunSummary,
        spinner: &ProgressBar,
    ) {
        if !self.resolver.is_supported(path) {
            debug!("Skipping unsupported {}", path.display());
            summary.unsupported += 1;
            return;
        }

        spinner.set_message(path.display().to_string());
        match self.process_item(path, state) {
            Some(item_state) => summary.record(item_state),
            None => summary.unsupported += 1,
        }
        log_progress("resolve", summary.total() as u64, PROGRESS_LOG_INTERVAL);
    }

    /// Returns the item's state after this run, or `None` if the tag store
    /// rejected the item. An item cut short by an interrupt stays `Processing`
    /// and keeps the persisted state it had before.
    pub fn process_item(&self, path: &Path, state: &mut RunState) -> Option<ItemRunState> {
        let key = path_key(path);
        let was_failed = state.failed.contains(&key);
        let decided = decide_state(&key, self.retry, state);
        if decided.is_terminal() {
            debug!("{}: {}", decided, key);
            return Some(decided);
        }

        info!("{}: {}", ItemRunState::Processing, key);
        let outcome = match self.resolver.resolve(path) {
            Ok(record) if record.has_content() => {
                state.results.insert(key.clone(), record);
                ItemRunState::Succeeded
            }
            Ok(_) => {
                error!("No fields found for {}", key);
                state.failed.push(key.clone());
                ItemRunState::Failed
            }
            Err(ResolveError::UnsupportedFormat(_)) => {
                debug!("Skipping unsupported {}", key);
                if was_failed {
                    state.failed.push(key);
                }
                return None;
            }
            Err(e) if e.is_interrupted() => {
                warn!("Interrupted while resolving {}", key);
                if was_failed {
                    state.failed.push(key);
                }
                return Some(ItemRunState::Processing);
            }
            Err(e) => {
                error!("Failed to resolve {} ({}): {}", key, e.kind(), e);
                state.failed.push(key.clone());
                ItemRunState::Failed
            }
        };
        info!("{}: {}", outcome, key);
        Some(outcome)
    }
}

// ============================================================================
// TESTS
// ============================================================================
