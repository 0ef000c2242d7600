//! Parallel initialization of test-case directories
//!
//! One pass: locate every test case, drop the ones already initialized,
//! queue the rest and drain the queue with a fixed-size worker pool. The
//! pass returns only after every queued directory was attempted.
//!
//! Failures are not reported per directory. A directory that did not settle
//! is still `Uninitialized` on disk, so the next pass queues it again.

use crate::discovery::Locator;
use crate::error::Result;
use crate::provision::{CaseState, Initializer};
use crate::queue::WorkerPool;
use crate::signals;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Counts for one initialization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitSummary {
    /// Test cases found by the locator
    pub discovered: usize,
    /// Skipped because they were already initialized
    pub already_initialized: usize,
    /// Queued and handed to a worker
    pub attempted: usize,
    /// Attempted and initialized afterwards
    pub settled: usize,
    pub duration_ms: u64,
}

impl InitSummary {
    /// Attempted directories that will be retried on the next pass
    pub fn unsettled(&self) -> usize {
        self.attempted - self.settled
    }
}

/// Scheduler with a fixed concurrency bound
pub struct InitScheduler<I: Initializer> {
    initializer: Arc<I>,
    pool: WorkerPool,
    shutdown: &'static AtomicBool,
}

impl<I: Initializer> InitScheduler<I> {
    pub fn new(initializer: Arc<I>, workers: usize) -> Self {
        Self {
            initializer,
            pool: WorkerPool::new(workers),
            shutdown: &signals::SHUTDOWN_REQUESTED,
        }
    }

    /// Poll `flag` instead of the process-wide signal flag
    pub fn with_shutdown_flag(mut self, flag: &'static AtomicBool) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// Directories among `cases` that still need initialization
    pub fn pending(&self, cases: &[PathBuf]) -> Vec<PathBuf> {
        cases
            .iter()
            .filter(|dir| self.initializer.state(dir) == CaseState::Uninitialized)
            .cloned()
            .collect()
    }

    /// Locate all test cases under `locator` and initialize them
    pub fn run_pass(&self, locator: &Locator) -> Result<InitSummary> {
        info!("Iterating and initializing all test-case directories");
        let cases = locator.locate()?;
        Ok(self.run(&cases))
    }

    /// Initialize every uninitialized directory in `cases`; blocks until done
    pub fn run(&self, cases: &[PathBuf]) -> InitSummary {
        let start = Instant::now();
        let pending = self.pending(cases);
        let total = pending.len();

        let mut summary = InitSummary {
            discovered: cases.len(),
            already_initialized: cases.len() - total,
            attempted: total,
            ..Default::default()
        };

        if total == 0 {
            info!("All {} test case(s) already initialized", cases.len());
            return summary;
        }

        info!(
            "Initializing {} of {} test case(s) with {} worker(s)",
            total,
            cases.len(),
            self.pool.workers().min(total)
        );

        let started = Arc::new(AtomicUsize::new(0));
        let initializer = Arc::clone(&self.initializer);
        let shutdown = self.shutdown;
        let job = move |dir: PathBuf| {
            if shutdown.load(Ordering::SeqCst) {
                debug!("Shutdown requested, skipping {}", dir.display());
                return;
            }
            let n = started.fetch_add(1, Ordering::SeqCst);
            info!("{} - initialize - {}", total - n, dir.display());
            initializer.initialize(&dir);
        };

        if let Err(e) = self.pool.run(pending.clone(), job) {
            // Nothing was started; every directory stays pending for next pass
            warn!("Could not start initialization workers: {}", e);
        }

        summary.settled = pending
            .iter()
            .filter(|dir| self.initializer.state(dir) == CaseState::Initialized)
            .count();
        summary.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Initialization pass finished: {} settled, {} left for the next run ({}ms)",
            summary.settled,
            summary.unsettled(),
            summary.duration_ms
        );
        summary
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    /// In-memory initializer counting calls per directory
    #[derive(Default)]
    struct FakeInitializer {
        initialized: Mutex<HashMap<PathBuf, usize>>,
        /// Directories whose initialization never sticks
        broken: Vec<PathBuf>,
    }

    impl FakeInitializer {
        fn calls(&self) -> usize {
            self.initialized.lock().unwrap().values().sum()
        }

        fn calls_for(&self, dir: &Path) -> usize {
            *self.initialized.lock().unwrap().get(dir).unwrap_or(&0)
        }
    }

    impl Initializer for FakeInitializer {
        fn state(&self, dir: &Path) -> CaseState {
            let done = self.initialized.lock().unwrap().contains_key(dir);
            if done && !self.broken.iter().any(|b| b == dir) {
                CaseState::Initialized
            } else {
                CaseState::Uninitialized
            }
        }

        fn initialize(&self, dir: &Path) {
            thread::sleep(Duration::from_millis(1));
            *self
                .initialized
                .lock()
                .unwrap()
                .entry(dir.to_path_buf())
                .or_insert(0) += 1;
        }
    }

    fn dirs(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("/cases/a/b/c/{}", i))).collect()
    }

    #[test]
    fn test_each_pending_dir_initialized_exactly_once() {
        for workers in [1, 2, 25, 100] {
            let fake = Arc::new(FakeInitializer::default());
            let scheduler = InitScheduler::new(Arc::clone(&fake), workers);
            let cases = dirs(40);

            let summary = scheduler.run(&cases);

            assert_eq!(fake.calls(), 40, "workers={}", workers);
            assert!(cases.iter().all(|d| fake.calls_for(d) == 1));
            assert_eq!(summary.attempted, 40);
            assert_eq!(summary.settled, 40);
        }
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let fake = Arc::new(FakeInitializer::default());
        let scheduler = InitScheduler::new(Arc::clone(&fake), 25);
        let cases = dirs(10);

        scheduler.run(&cases);
        let second = scheduler.run(&cases);

        assert_eq!(fake.calls(), 10);
        assert_eq!(second.attempted, 0);
        assert_eq!(second.already_initialized, 10);
    }

    #[test]
    fn test_failed_dirs_are_retried_on_next_pass() {
        let cases = dirs(5);
        let fake = Arc::new(FakeInitializer {
            broken: vec![cases[2].clone()],
            ..Default::default()
        });
        let scheduler = InitScheduler::new(Arc::clone(&fake), 3);

        let first = scheduler.run(&cases);
        assert_eq!(first.unsettled(), 1);

        let second = scheduler.run(&cases);
        assert_eq!(second.attempted, 1);
        assert_eq!(fake.calls_for(&cases[2]), 2);
        assert_eq!(fake.calls_for(&cases[0]), 1);
    }

    /// Requests shutdown as soon as its first directory is initialized
    struct StopAfterFirst {
        inner: FakeInitializer,
        flag: &'static AtomicBool,
    }

    impl Initializer for StopAfterFirst {
        fn state(&self, dir: &Path) -> CaseState {
            self.inner.state(dir)
        }

        fn initialize(&self, dir: &Path) {
            self.inner.initialize(dir);
            self.flag.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_shutdown_skips_remaining_dirs_and_releases_barrier() {
        static STOP: AtomicBool = AtomicBool::new(false);
        let stopper = Arc::new(StopAfterFirst {
            inner: FakeInitializer::default(),
            flag: &STOP,
        });
        let cases = dirs(6);

        let summary = InitScheduler::new(Arc::clone(&stopper), 1)
            .with_shutdown_flag(&STOP)
            .run(&cases);

        assert_eq!(stopper.inner.calls(), 1);
        assert_eq!(summary.attempted, 6);
        assert_eq!(summary.settled, 1);
        assert_eq!(summary.unsettled(), 5);

        // Skipped directories are still pending for the next pass
        let resumed = InitScheduler::new(Arc::clone(&stopper), 4).pending(&cases);
        assert_eq!(resumed.len(), 5);
        assert!(!resumed.contains(&cases[0]));
    }

    #[test]
    fn test_shutdown_before_pass_initializes_nothing() {
        static STOP: AtomicBool = AtomicBool::new(true);
        let fake = Arc::new(FakeInitializer::default());
        let cases = dirs(8);

        let summary = InitScheduler::new(Arc::clone(&fake), 25)
            .with_shutdown_flag(&STOP)
            .run(&cases);

        assert_eq!(fake.calls(), 0);
        assert_eq!(summary.attempted, 8);
        assert_eq!(summary.settled, 0);
    }

    #[test]
    fn test_empty_case_list() {
        let fake = Arc::new(FakeInitializer::default());
        let summary = InitScheduler::new(Arc::clone(&fake), 25).run(&[]);
        assert_eq!(summary, InitSummary::default());
    }
}
