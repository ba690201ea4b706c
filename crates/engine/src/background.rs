//! Background tasks (§5): TTL sweep, snapshot compaction, and (when
//! replication is configured and this node is a primary) the follower
//! heartbeat, each on its own OS thread, taking the writer critical
//! section only when it intends to mutate state. `recv_timeout` doubles
//! as the sleep so a `close()` can wake a task early instead of waiting
//! out its interval.

use crate::inner::Inner;
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

struct Task {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the TTL sweep and compaction threads for one [`crate::Database`].
pub struct BackgroundTasks {
    tasks: Vec<Task>,
}

impl BackgroundTasks {
    pub fn spawn(
        inner: Arc<Mutex<Inner>>,
        save_interval: Duration,
        ttl_sweep_interval: Duration,
        heartbeat_interval: Duration,
    ) -> Self {
        let mut tasks = Vec::new();

        let (tx, rx) = mpsc::channel();
        let sweep_inner = inner.clone();
        let handle = std::thread::spawn(move || run_ttl_sweep(sweep_inner, ttl_sweep_interval, rx));
        tasks.push(Task { shutdown: tx, handle });

        let (tx, rx) = mpsc::channel();
        let compaction_inner = inner.clone();
        let handle = std::thread::spawn(move || run_compaction(compaction_inner, save_interval, rx));
        tasks.push(Task { shutdown: tx, handle });

        let (tx, rx) = mpsc::channel();
        let heartbeat_inner = inner;
        let handle = std::thread::spawn(move || run_heartbeat(heartbeat_inner, heartbeat_interval, rx));
        tasks.push(Task { shutdown: tx, handle });

        BackgroundTasks { tasks }
    }

    /// Signal every background thread to stop and join them.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            let _ = task.shutdown.send(());
            let _ = task.handle.join();
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_ttl_sweep(inner: Arc<Mutex<Inner>>, interval: Duration, shutdown: Receiver<()>) {
    while shutdown.recv_timeout(interval).is_err() {
        let result = inner.lock().store.sweep_ttl();
        match result {
            Ok(count) if count > 0 => tracing::info!(count, "ttl sweep removed expired keys"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "ttl sweep failed"),
        }
    }
}

fn run_compaction(inner: Arc<Mutex<Inner>>, interval: Duration, shutdown: Receiver<()>) {
    while shutdown.recv_timeout(interval).is_err() {
        let result = inner.lock().store.checkpoint();
        match result {
            Ok(()) => tracing::info!("snapshot compaction completed"),
            Err(e) => tracing::warn!(error = %e, "snapshot compaction failed"),
        }
    }
}

/// Pings every follower and refreshes health state. A no-op when
/// replication isn't configured or this node isn't a primary
/// (`Replicator::heartbeat` checks the latter itself).
fn run_heartbeat(inner: Arc<Mutex<Inner>>, interval: Duration, shutdown: Receiver<()>) {
    while shutdown.recv_timeout(interval).is_err() {
        let guard = inner.lock();
        let mut replicator = guard.replicator.lock();
        if let Some(replicator) = replicator.as_mut() {
            replicator.heartbeat();
        }
    }
}
