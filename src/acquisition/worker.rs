//! Background retry worker
//!
//! One worker thread at a time runs acquisition attempts on a backoff
//! schedule until one succeeds. Every wait doubles as a cancellation
//! point: the token is a channel whose sender is dropped to cancel.

use super::{attempt, AcquireError, Shared};
use crate::config::CameraConfig;
use crate::platform::MemoryReader;
use crate::session::SessionProbe;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Retry schedule: explicit delays for the first attempts, then a fixed tail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    delays: Vec<Duration>,
    tail: Duration,
}

impl BackoffPolicy {
    /// Use `delays[n - 1]` after attempt `n`, then `tail` once they run out
    pub fn new(delays: Vec<Duration>, tail: Duration) -> Self {
        Self { delays, tail }
    }

    /// Delay after the 1-based `attempt`
    pub fn delay_for(&self, attempt: usize) -> Duration {
        attempt
            .checked_sub(1)
            .and_then(|i| self.delays.get(i))
            .copied()
            .unwrap_or(self.tail)
    }
}

/// Cooperative cancellation token held by the worker
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

/// Owner side of a [`CancelToken`]
#[derive(Debug)]
pub struct CancelHandle {
    tx: Option<Sender<()>>,
}

impl CancelToken {
    /// Create a linked handle and token
    pub fn pair() -> (CancelHandle, CancelToken) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (CancelHandle { tx: Some(tx) }, CancelToken { rx })
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleep for `duration`; returns `true` if cancelled meanwhile
    pub fn wait(&self, duration: Duration) -> bool {
        !matches!(self.rx.recv_timeout(duration), Err(RecvTimeoutError::Timeout))
    }
}

impl CancelHandle {
    /// Request cancellation; every current and future wait returns at once
    pub fn cancel(&mut self) {
        self.tx.take();
    }
}

/// How a worker run begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartMode {
    /// New session: wait for stale objects to tear down and cameras to spawn
    Fresh,
    /// Re-acquiring inside a live session after a hard reset
    Recover,
}

/// Everything a worker run needs, shared with the owning context
pub(crate) struct WorkerContext<M> {
    pub reader: Arc<M>,
    pub probe: Arc<dyn SessionProbe>,
    pub config: Arc<CameraConfig>,
    pub shared: Arc<Shared>,
}

impl<M> Clone for WorkerContext<M> {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
            probe: Arc::clone(&self.probe),
            config: Arc::clone(&self.config),
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Run one attempt, turning a panic into a failed attempt
fn guarded_attempt<M: MemoryReader>(ctx: &WorkerContext<M>) -> Result<(), AcquireError> {
    catch_unwind(AssertUnwindSafe(|| {
        attempt(ctx.reader.as_ref(), ctx.probe.as_ref(), &ctx.config, &ctx.shared)
    }))
    .unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(AcquireError::Panicked(message))
    })
}

/// Worker body: settle, then attempt on the backoff schedule until success
/// or cancellation.
pub(crate) fn run<M: MemoryReader>(ctx: WorkerContext<M>, token: CancelToken, mode: StartMode) {
    ctx.shared.begin_search();

    if mode == StartMode::Fresh && token.wait(ctx.config.initial_settle()) {
        debug!("Acquisition cancelled during initial settle");
        return;
    }

    let backoff = ctx.config.backoff();
    let mut spawn_settled = mode == StartMode::Recover;
    let mut attempts = 0usize;

    while !token.is_cancelled() {
        attempts += 1;

        if !spawn_settled && ctx.probe.is_session_active() {
            spawn_settled = true;
            debug!(delay = ?ctx.config.camera_spawn_settle(), "Session active; waiting for cameras to spawn");
            if token.wait(ctx.config.camera_spawn_settle()) {
                break;
            }
        }

        match guarded_attempt(&ctx) {
            Ok(()) => {
                info!(attempts, "Acquisition complete");
                return;
            }
            Err(AcquireError::Cancelled) => break,
            Err(e @ AcquireError::Panicked(_)) => {
                warn!(attempt = attempts, error = %e, "Acquisition attempt panicked");
            }
            Err(e) => {
                if ctx.shared.throttle.allow(e.kind()) {
                    debug!(attempt = attempts, error = %e, "Acquisition attempt failed");
                }
            }
        }

        if token.wait(backoff.delay_for(attempts)) {
            break;
        }
    }

    debug!(attempts, "Acquisition worker cancelled");
}

struct WorkerHandle {
    cancel: CancelHandle,
    thread: JoinHandle<()>,
}

/// Owner of the single background acquisition thread
#[derive(Default)]
pub(crate) struct RetryWorker {
    current: Mutex<Option<WorkerHandle>>,
}

impl RetryWorker {
    /// Whether a worker thread is still running
    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.thread.is_finished())
    }

    /// Start a worker unless one is already running
    ///
    /// Returns `true` if a new thread was spawned.
    pub fn start<M>(&self, ctx: WorkerContext<M>, mode: StartMode) -> bool
    where
        M: MemoryReader + 'static,
    {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|handle| !handle.thread.is_finished()) {
            return false;
        }

        let (cancel, token) = CancelToken::pair();
        let spawned = std::thread::Builder::new()
            .name("camlock-acquire".to_string())
            .spawn(move || run(ctx, token, mode));

        match spawned {
            Ok(thread) => {
                debug!(?mode, "Acquisition worker started");
                *current = Some(WorkerHandle { cancel, thread });
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to spawn acquisition worker");
                false
            }
        }
    }

    /// Cancel the running worker, if any, and wait for it to exit
    pub fn stop(&self) {
        let handle = self.current.lock().take();
        if let Some(mut handle) = handle {
            handle.cancel.cancel();
            if handle.thread.join().is_err() {
                warn!("Acquisition worker exited by panic");
            }
        }
    }
}
