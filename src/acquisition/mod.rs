//! Camera acquisition state machine
//!
//! Acquisition converges on a validated primary-camera matrix while the
//! target may still be constructing (or tearing down) its cameras:
//!
//! ```text
//! Idle ─▶ Searching ─▶ CamerasFound ─▶ MatrixResolved ─▶ Validated
//!            ▲                                              │
//!            └──────────────── Degraded ◀───────────────────┘
//! ```
//!
//! All writes go through [`Shared`]: the mutable [`Core`] sits behind one
//! mutex, and every change publishes a fresh immutable
//! [`FrameState`](crate::updater::FrameState) for lock-free readers.

mod worker;

pub use worker::{BackoffPolicy, CancelHandle, CancelToken};
pub(crate) use worker::{RetryWorker, StartMode, WorkerContext};

use crate::camera::locator::locate_in_list;
use crate::camera::{resolve_matrix_address, CameraHandles, MatrixAddresses};
use crate::config::CameraConfig;
use crate::matrix::{validate, RawMatrix, ValidationFailure, ViewMatrixSnapshot};
use crate::platform::{MemoryError, MemoryReader};
use crate::session::SessionProbe;
use crate::updater::FrameState;
use crate::utils::LogThrottle;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Acquisition progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum AcquisitionState {
    /// Nothing running
    #[default]
    Idle,
    /// Looking for cameras
    Searching,
    /// Both camera roles located
    CamerasFound,
    /// Both matrix pointer chains resolved
    MatrixResolved,
    /// Primary matrix validated; refreshed every tick
    Validated,
    /// Sustained refresh failure; about to search again
    Degraded,
}

/// Why an acquisition step did not complete
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AcquireError {
    /// Expected during startup and transitions; retry later
    #[error("not ready: {0}")]
    NotReady(&'static str),

    /// A remote read failed outright
    #[error("transport error: {0}")]
    Transport(#[from] MemoryError),

    /// The matrix was read but is implausible
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// Cancelled, or overtaken by a session reset
    #[error("cancelled")]
    Cancelled,

    /// The attempt panicked
    #[error("attempt panicked: {0}")]
    Panicked(String),
}

impl AcquireError {
    /// Whether this is a "not yet available" condition rather than a fault
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }

    /// Stable key for rate-limited logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotReady(_) => "not_ready",
            Self::Transport(_) => "transport",
            Self::Validation(_) => "validation",
            Self::Cancelled => "cancelled",
            Self::Panicked(_) => "panicked",
        }
    }
}

/// Mutable acquisition state, guarded by [`Shared::core`]
#[derive(Debug, Default)]
pub(crate) struct Core {
    pub state: AcquisitionState,
    pub handles: CameraHandles,
    pub addresses: MatrixAddresses,
    pub consecutive_failures: u32,
    /// Bumped on every reset; in-flight work from an older epoch is dropped
    pub epoch: u64,
    /// Set by a hard reset; the next tick restarts the worker
    pub restart_pending: bool,
}

/// State shared between the worker, the tick path and readers
#[derive(Debug)]
pub(crate) struct Shared {
    pub core: Mutex<Core>,
    pub frame: ArcSwap<FrameState>,
    pub overlay_enabled: AtomicBool,
    pub throttle: LogThrottle,
}

impl Shared {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            core: Mutex::new(Core::default()),
            frame: ArcSwap::from_pointee(FrameState::default()),
            overlay_enabled: AtomicBool::new(false),
            throttle: LogThrottle::new(config.log_throttle()),
        }
    }

    /// Publish a new frame derived from the current one
    ///
    /// Callers hold the core lock, so publishes are serialized.
    pub fn publish(&self, core: &Core, update: impl FnOnce(&mut FrameState)) {
        let mut next = **self.frame.load();
        update(&mut next);
        next.state = core.state;
        self.frame.store(Arc::new(next));
    }

    /// Move to `state`, publishing it
    pub fn transition(&self, core: &mut Core, state: AcquisitionState) {
        if core.state != state {
            info!(from = ?core.state, to = ?state, "Acquisition state changed");
            core.state = state;
        }
        self.publish(core, |_| {});
    }

    /// Drop everything acquired, reset the snapshot and enter `state`
    pub fn clear(&self, core: &mut Core, state: AcquisitionState) {
        core.handles = CameraHandles::default();
        core.addresses = MatrixAddresses::default();
        core.consecutive_failures = 0;
        core.restart_pending = false;
        core.epoch += 1;
        self.overlay_enabled.store(false, Ordering::Release);

        if core.state != state {
            info!(from = ?core.state, to = ?state, epoch = core.epoch, "Acquisition reset");
            core.state = state;
        }
        self.publish(core, |frame| *frame = FrameState::default());
    }

    /// Sustained refresh failure: degrade, clear and search again
    pub fn hard_reset(&self, core: &mut Core) {
        warn!(
            failures = core.consecutive_failures,
            "Camera matrix kept failing validation; re-acquiring"
        );
        self.transition(core, AcquisitionState::Degraded);
        self.clear(core, AcquisitionState::Searching);
        core.restart_pending = true;
    }

    /// Enter `Searching` from `Idle`
    pub fn begin_search(&self) {
        let mut core = self.core.lock();
        if core.state == AcquisitionState::Idle {
            self.transition(&mut core, AcquisitionState::Searching);
        }
    }

    /// Drop partial progress left by an earlier failed attempt
    fn rewind(&self, epoch: u64) -> Result<(), AcquireError> {
        let mut core = self.core.lock();
        if core.epoch != epoch {
            return Err(AcquireError::Cancelled);
        }
        if matches!(core.state, AcquisitionState::CamerasFound | AcquisitionState::MatrixResolved) {
            core.handles = CameraHandles::default();
            core.addresses = MatrixAddresses::default();
            self.transition(&mut core, AcquisitionState::Searching);
        }
        Ok(())
    }

    /// Current epoch
    pub fn epoch(&self) -> u64 {
        self.core.lock().epoch
    }

    /// Apply `update` to the core only if no reset happened since `epoch`
    fn advance(
        &self,
        epoch: u64,
        state: AcquisitionState,
        update: impl FnOnce(&mut Core),
    ) -> Result<(), AcquireError> {
        let mut core = self.core.lock();
        if core.epoch != epoch {
            return Err(AcquireError::Cancelled);
        }
        update(&mut core);
        self.transition(&mut core, state);
        Ok(())
    }
}

/// One acquisition attempt: locate, resolve, read and validate
///
/// Progress is committed step by step so diagnostics show how far the
/// attempt got. Nothing is committed if a reset happened meanwhile.
pub(crate) fn attempt<M: MemoryReader>(
    reader: &M,
    probe: &dyn SessionProbe,
    config: &CameraConfig,
    shared: &Shared,
) -> Result<(), AcquireError> {
    let epoch = shared.epoch();

    if !probe.is_session_active() {
        return Err(AcquireError::NotReady("session inactive"));
    }
    shared.rewind(epoch)?;

    let list = probe
        .camera_list_address()
        .ok_or(AcquireError::NotReady("camera list unavailable"))?;

    let layout = &config.layout;
    let handles = locate_in_list(reader, list, layout, config.max_camera_entries, config.max_name_len)?;
    if !handles.is_complete() {
        return Err(AcquireError::NotReady("cameras not found"));
    }
    debug!(primary = %handles.primary, optic = %handles.optic, "Cameras located");
    shared.advance(epoch, AcquisitionState::CamerasFound, |core| core.handles = handles)?;

    let addresses = MatrixAddresses {
        primary: resolve_matrix_address(reader, handles.primary, layout)?,
        optic: resolve_matrix_address(reader, handles.optic, layout)?,
    };
    shared.advance(epoch, AcquisitionState::MatrixResolved, |core| core.addresses = addresses)?;

    let raw: RawMatrix = reader.read(addresses.primary)?;
    validate(&raw, probe.is_in_round(), config.world_bound)?;

    let mut core = shared.core.lock();
    if core.epoch != epoch {
        return Err(AcquireError::Cancelled);
    }
    core.consecutive_failures = 0;
    core.state = AcquisitionState::Validated;
    info!(
        primary = %format!("0x{:X}", addresses.primary),
        optic = %format!("0x{:X}", addresses.optic),
        "Camera matrix acquired"
    );
    shared.publish(&core, |frame| {
        frame.matrix = ViewMatrixSnapshot::from_raw(&raw);
        frame.last_validated = Some(Instant::now());
        frame.scoped = false;
    });
    shared.overlay_enabled.store(true, Ordering::Release);

    Ok(())
}
