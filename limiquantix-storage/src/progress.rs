//! Allocation progress reporting for volume creation.
//!
//! While `virStorageVolCreateXML` runs, a background task looks the new
//! volume up and forwards its allocation to a [`ProgressMeter`] until the
//! install path signals completion.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ProgressConfig;
use crate::traits::{PoolHandle, VolumeHandle};

/// Receiver of progress updates (a CLI bar, a task status, ...).
pub trait ProgressMeter: Send + Sync {
    /// Operation started, `size` bytes expected in total.
    fn start(&self, size: u64, text: &str);

    /// Current amount done.
    fn update(&self, value: u64);

    /// Operation finished at `value`.
    fn end(&self, value: u64);
}

/// Meter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMeter;

impl ProgressMeter for NullMeter {
    fn start(&self, _size: u64, _text: &str) {}
    fn update(&self, _value: u64) {}
    fn end(&self, _value: u64) {}
}

/// Use the caller's meter or a [`NullMeter`].
pub fn ensure_meter(meter: Option<Arc<dyn ProgressMeter>>) -> Arc<dyn ProgressMeter> {
    meter.unwrap_or_else(|| Arc::new(NullMeter))
}

/// One-shot completion signal shared between install and the progress task.
#[derive(Debug)]
pub struct Completion {
    tx: watch::Sender<bool>,
}

impl Completion {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Mark the operation finished. Idempotent.
    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> CompletionWatch {
        CompletionWatch { rx: self.tx.subscribe() }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

/// Waiting side of a [`Completion`].
#[derive(Debug, Clone)]
pub struct CompletionWatch {
    rx: watch::Receiver<bool>,
}

impl CompletionWatch {
    /// Wait up to `timeout` for completion. Returns true once it is set.
    ///
    /// A dropped [`Completion`] counts as set.
    pub async fn wait(&mut self, timeout: Duration) -> bool {
        if *self.rx.borrow() {
            return true;
        }
        match tokio::time::timeout(timeout, self.rx.wait_for(|done| *done)).await {
            Ok(result) => {
                drop(result);
                true
            }
            Err(_) => false,
        }
    }
}

/// Spawn the allocation polling task for volume `name` in `pool`.
pub fn spawn_allocation_poller(
    pool: Arc<dyn PoolHandle>,
    name: String,
    meter: Arc<dyn ProgressMeter>,
    done: CompletionWatch,
    config: ProgressConfig,
) -> JoinHandle<()> {
    tokio::spawn(poll_allocation(pool, name, meter, done, config))
}

async fn poll_allocation(
    pool: Arc<dyn PoolHandle>,
    name: String,
    meter: Arc<dyn ProgressMeter>,
    mut done: CompletionWatch,
    config: ProgressConfig,
) {
    let vol = match wait_for_volume(pool.as_ref(), &name, &mut done, &config).await {
        Some(vol) => vol,
        None => {
            debug!(volume = %name, "Couldn't lookup storage volume in progress task");
            return;
        }
    };

    loop {
        match vol.info().await {
            Ok(info) => meter.update(info.allocation),
            Err(e) => {
                debug!(volume = %name, error = %e, "Stopped polling volume allocation");
                return;
            }
        }
        if done.wait(config.poll_interval()).await {
            break;
        }
    }
}

/// Retry the lookup with a fixed backoff until the volume shows up,
/// completion is signaled, or the attempt bound is reached.
async fn wait_for_volume(
    pool: &dyn PoolHandle,
    name: &str,
    done: &mut CompletionWatch,
    config: &ProgressConfig,
) -> Option<Arc<dyn VolumeHandle>> {
    for attempt in 1..=config.max_lookup_attempts {
        if let Ok(Some(vol)) = pool.lookup_volume(name).await {
            if vol.info().await.is_ok() {
                return Some(vol);
            }
        }
        if done.wait(config.lookup_retry()).await {
            debug!(volume = %name, attempt, "Install finished before volume became visible");
            return None;
        }
    }
    None
}
