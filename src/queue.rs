//! Work queue with a drain barrier, and the bounded worker pool built on it
//!
//! ## Protocol
//!
//! 1. The producer pushes every item, then closes the queue
//! 2. Workers loop `pop` → work → `task_done` until `pop` returns `None`
//! 3. `join` blocks until every pushed item has been marked done
//!
//! Workers never push, so each item is handed to exactly one worker.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use tracing::{error, warn};

/// Multi-consumer FIFO with `task_done`/`join` accounting
pub struct WorkQueue<T> {
    tx: Mutex<Option<Sender<T>>>,
    rx: Receiver<T>,
    outstanding: Mutex<usize>,
    drained: Condvar,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            outstanding: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    /// Enqueue an item. Returns the item back if the queue is already closed.
    pub fn push(&self, item: T) -> std::result::Result<(), T> {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = tx.as_ref() else {
            return Err(item);
        };
        // Count before sending so a fast worker can't mark it done first
        *self.outstanding.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        tx.send(item).map_err(|e| {
            self.task_done();
            e.into_inner()
        })
    }

    /// No further items will be pushed; idle `pop` calls return `None`.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// Take the next item, blocking while the queue is empty but still open.
    pub fn pop(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Mark one popped item as finished.
    pub fn task_done(&self) {
        let mut outstanding = self.outstanding.lock().unwrap_or_else(|e| e.into_inner());
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until every pushed item has been marked done.
    pub fn join(&self) {
        let mut outstanding = self.outstanding.lock().unwrap_or_else(|e| e.into_inner());
        while *outstanding > 0 {
            outstanding = self
                .drained
                .wait(outstanding)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Items waiting to be popped
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Items pushed but not yet marked done (queued or in progress)
    pub fn outstanding(&self) -> usize {
        *self.outstanding.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the item done on drop, even if the job unwinds
struct DoneGuard<'a, T>(&'a WorkQueue<T>);

impl<T> Drop for DoneGuard<'_, T> {
    fn drop(&mut self) {
        self.0.task_done();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Pop and process items until the queue is closed and empty.
///
/// A panicking job costs only its own item; the worker keeps draining.
fn drain<T, F>(queue: &WorkQueue<T>, job: &F)
where
    F: Fn(T),
{
    while let Some(item) = queue.pop() {
        let _done = DoneGuard(queue);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job(item))) {
            error!("Job panicked: {}", panic_message(payload.as_ref()));
        }
    }
}

/// Fixed-size pool of OS threads draining one `WorkQueue`
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// A pool of `workers` threads (at least one)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` once per item and return after all items were processed.
    ///
    /// At most `min(workers, items.len())` threads are started.
    pub fn run<T, F>(&self, items: Vec<T>, job: F) -> io::Result<()>
    where
        T: Send + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        if items.is_empty() {
            return Ok(());
        }

        let queue = Arc::new(WorkQueue::new());
        let count = items.len();
        for item in items {
            // Queue is open until close() below
            let _ = queue.push(item);
        }
        queue.close();

        let job = Arc::new(job);
        let mut handles = Vec::with_capacity(self.workers.min(count));
        for i in 0..self.workers.min(count) {
            let queue = Arc::clone(&queue);
            let job = Arc::clone(&job);
            let spawned = thread::Builder::new()
                .name(format!("init-worker-{}", i))
                .spawn(move || drain(queue.as_ref(), job.as_ref()));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) if handles.is_empty() => return Err(e),
                Err(e) => {
                    warn!("Started {} of {} workers: {}", handles.len(), self.workers, e);
                    break;
                }
            }
        }

        queue.join();

        for handle in handles {
            if handle.join().is_err() {
                error!("A worker thread exited abnormally");
            }
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_pop_returns_none_when_closed_and_empty() {
        let queue = WorkQueue::new();
        queue.push(1).unwrap();
        queue.close();

        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_push_after_close_is_rejected() {
        let queue = WorkQueue::new();
        queue.close();
        assert_eq!(queue.push(7), Err(7));
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn test_join_waits_for_task_done() {
        let queue = Arc::new(WorkQueue::new());
        queue.push("a").unwrap();
        queue.push("b").unwrap();
        queue.close();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.outstanding(), 2);

        let worker = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                while queue.pop().is_some() {
                    thread::sleep(Duration::from_millis(20));
                    queue.task_done();
                }
            })
        };

        queue.join();
        assert_eq!(queue.outstanding(), 0);
        assert!(queue.is_empty());
        worker.join().unwrap();
    }

    #[test]
    fn test_join_on_empty_queue_returns_immediately() {
        let queue: WorkQueue<u32> = WorkQueue::new();
        queue.join();
    }

    #[test]
    fn test_pool_processes_each_item_once() {
        for workers in [1, 3, 25, 200] {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);

            WorkerPool::new(workers)
                .run((0..100).collect(), move |i: u32| {
                    sink.lock().unwrap().push(i);
                })
                .unwrap();

            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 100, "workers={}", workers);
            let unique: HashSet<_> = seen.iter().collect();
            assert_eq!(unique.len(), 100, "workers={}", workers);
        }
    }

    #[test]
    fn test_pool_runs_concurrently_up_to_bound() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));

        WorkerPool::new(4)
            .run((0..16).collect(), move |_: u32| {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(30));
                a.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak concurrency {} exceeds bound", peak);
        assert!(peak > 1, "expected parallel execution, peak was {}", peak);
    }

    #[test]
    fn test_pool_survives_panicking_job() {
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);

        WorkerPool::new(2)
            .run((0..10).collect(), move |i: u32| {
                if i == 3 {
                    panic!("boom");
                }
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn test_single_worker_keeps_draining_after_panic() {
        let done = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&done);
        let (finished_tx, finished_rx) = std::sync::mpsc::channel();

        thread::spawn(move || {
            let result = WorkerPool::new(1).run((0..5).collect(), move |i: u32| {
                if i == 1 {
                    panic!("job {} failed", i);
                }
                sink.lock().unwrap().push(i);
            });
            finished_tx.send(result.is_ok()).unwrap();
        });

        let returned = finished_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("pool did not return after a job panicked with one worker");
        assert!(returned);
        assert_eq!(*done.lock().unwrap(), vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_panic_message_extraction() {
        let static_payload: Box<dyn Any + Send> = Box::new("static");
        let owned_payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other_payload: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(static_payload.as_ref()), "static");
        assert_eq!(panic_message(owned_payload.as_ref()), "owned");
        assert_eq!(panic_message(other_payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        assert_eq!(WorkerPool::new(0).workers(), 1);
    }
}
