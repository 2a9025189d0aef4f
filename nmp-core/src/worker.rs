// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Uniform lifecycle for pipeline stages and the supervisor that shuts them
//! down as a group.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Trait implemented by every pipeline stage.
///
/// `start` and `stop` are non-blocking and idempotent; `stop` may be called
/// from a different task than the one that called `start`. `join` blocks
/// until every task the stage spawned has halted.
///
/// This trait is dyn-compatible thanks to the `async_trait` macro, which
/// allows a heterogeneous `Vec<Arc<dyn Worker>>` in the supervisor.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Diagnostic name used in logs.
    fn name(&self) -> &'static str;

    /// Spawn the stage's internal tasks. Calling `start` twice is a no-op.
    fn start(&self);

    /// Signal shutdown: close the inbound queue and/or listening sockets.
    /// Only the first call has side effects.
    fn stop(&self);

    /// Wait until all internal tasks have exited. Must be called after
    /// `stop`, otherwise it never completes.
    async fn join(&self);
}

/// Single-shot shutdown guard.
///
/// Wraps the compare-and-set idiom every stage uses to make the side effects
/// of `stop` (queue close, socket close) happen exactly once.
#[derive(Debug, Default)]
pub struct ShutdownFlag(AtomicBool);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Returns true exactly once, for the caller that wins the transition.
    pub fn begin(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_shut_down(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Insertion-ordered collection of stages supervised as one unit.
///
/// On shutdown the supervisor calls `stop` on each stage in insertion order,
/// then awaits each stage's `join`. It never restarts a stage.
#[derive(Default)]
pub struct WorkerSet {
    workers: Vec<Arc<dyn Worker>>,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
        }
    }

    pub fn add(&mut self, worker: Arc<dyn Worker>) {
        self.workers.push(worker);
    }

    pub fn workers(&self) -> &[Arc<dyn Worker>] {
        &self.workers
    }

    pub fn start_all(&self) {
        for worker in &self.workers {
            info!(worker = worker.name(), "starting");
            worker.start();
        }
    }

    pub fn stop_all(&self) {
        for worker in &self.workers {
            info!(worker = worker.name(), "stopping");
            worker.stop();
        }
    }

    pub async fn join_all(&self) {
        for worker in &self.workers {
            worker.join().await;
            info!(worker = worker.name(), "stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    struct LoopWorker {
        tracker: TaskTracker,
        cancel: CancellationToken,
        shutdown: ShutdownFlag,
    }

    impl LoopWorker {
        fn new() -> Self {
            Self {
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
                shutdown: ShutdownFlag::new(),
            }
        }
    }

    #[async_trait]
    impl Worker for LoopWorker {
        fn name(&self) -> &'static str {
            "loop"
        }

        fn start(&self) {
            let cancel = self.cancel.clone();
            self.tracker.spawn(async move {
                cancel.cancelled().await;
            });
        }

        fn stop(&self) {
            if self.shutdown.begin() {
                self.cancel.cancel();
            }
            self.tracker.close();
        }

        async fn join(&self) {
            self.tracker.wait().await;
        }
    }

    #[test]
    fn shutdown_flag_fires_once() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_shut_down());
        assert!(flag.begin());
        assert!(!flag.begin());
        assert!(flag.is_shut_down());
    }

    #[tokio::test]
    async fn worker_set_stops_and_joins_all() {
        let mut set = WorkerSet::new();
        for _ in 0..3 {
            set.add(Arc::new(LoopWorker::new()));
        }
        set.start_all();
        set.stop_all();
        set.join_all().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let worker = LoopWorker::new();
        worker.start();
        worker.stop();
        worker.stop();
        worker.join().await;
    }
}
