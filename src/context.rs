//! Explicit owner of acquisition, refresh and projection state
//!
//! A [`CameraContext`] is created by the host and passed wherever camera
//! state is needed. Lifecycle is explicit:
//!
//! - [`CameraContext::begin_session`] starts acquisition (idempotent)
//! - [`CameraContext::end_session`] clears everything acquired
//! - [`CameraContext::process_stopped`] also parks the worker
//! - [`CameraContext::shutdown`] stops the worker; called on drop
//!
//! Lifecycle notifications may also be sent through
//! [`CameraContext::event_sender`]; they are applied on the next
//! [`CameraContext::tick`] or [`CameraContext::pump_events`].

use crate::acquisition::{
    self, AcquireError, AcquisitionState, RetryWorker, Shared, StartMode, WorkerContext,
};
use crate::camera::{CameraHandles, MatrixAddresses};
use crate::config::{CameraConfig, OverlayToggles};
use crate::matrix::ViewMatrixSnapshot;
use crate::platform::ScatterReader;
use crate::projector::{project, ProjectOptions, Viewport};
use crate::session::{LocalViewer, SessionEvent, SessionProbe};
use crate::updater::{self, FrameState};
use crate::Result;
use crossbeam_channel::{Receiver, Sender};
use glam::{Vec2, Vec3};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

/// Diagnostic view of every current scalar, vector and address
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    /// Acquisition state
    pub state: AcquisitionState,
    /// Whether `is_ready` currently holds
    pub ready: bool,
    /// Whether the overlay may consume projections
    pub overlay_enabled: bool,
    /// Located camera handles
    pub handles: CameraHandles,
    /// Resolved matrix addresses
    pub addresses: MatrixAddresses,
    /// Committed view matrix
    pub matrix: ViewMatrixSnapshot,
    /// Field of view, degrees
    pub fov: f32,
    /// Aspect ratio
    pub aspect: f32,
    /// Zoom level
    pub zoom: f32,
    /// Whether the optic camera is active
    pub scoped: bool,
    /// Consecutive refresh failures
    pub consecutive_failures: u32,
    /// Reset counter
    pub epoch: u64,
    /// Milliseconds since the last successful validation
    pub ms_since_validation: Option<u128>,
    /// Current screen size
    pub viewport: Viewport,
}

impl DebugSnapshot {
    /// Render as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Camera acquisition, refresh and projection for one target process
pub struct CameraContext<M: ScatterReader + 'static> {
    reader: Arc<M>,
    probe: Arc<dyn SessionProbe>,
    config: Arc<CameraConfig>,
    shared: Arc<Shared>,
    viewport: RwLock<Viewport>,
    worker: RetryWorker,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

impl<M: ScatterReader + 'static> CameraContext<M> {
    /// Create a context; nothing runs until [`CameraContext::begin_session`]
    pub fn new(reader: Arc<M>, probe: Arc<dyn SessionProbe>, config: CameraConfig) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let viewport = Viewport::new(config.viewport.width, config.viewport.height);
        let shared = Arc::new(Shared::new(&config));

        Self {
            reader,
            probe,
            config: Arc::new(config),
            shared,
            viewport: RwLock::new(viewport),
            worker: RetryWorker::default(),
            events_tx,
            events_rx,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Display toggles for the rendering layer
    pub fn overlay_toggles(&self) -> OverlayToggles {
        self.config.overlay
    }

    fn worker_context(&self) -> WorkerContext<M> {
        WorkerContext {
            reader: Arc::clone(&self.reader),
            probe: Arc::clone(&self.probe),
            config: Arc::clone(&self.config),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Sender for lifecycle notifications from other threads
    pub fn event_sender(&self) -> Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Apply every queued lifecycle notification; returns how many
    pub fn pump_events(&self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Apply one lifecycle notification
    pub fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Begin => self.begin_session(),
            SessionEvent::End => self.end_session(),
            SessionEvent::ProcessStopped => self.process_stopped(),
        }
    }

    /// Start acquisition unless it is already running or complete
    pub fn begin_session(&self) {
        let state = self.state();
        if matches!(state, AcquisitionState::Validated) {
            return;
        }
        if self.worker.start(self.worker_context(), StartMode::Fresh) {
            info!("Session started; acquiring camera");
        }
    }

    /// Clear handles, addresses, snapshot and scalars; disable the overlay
    ///
    /// Does not restart acquisition.
    pub fn end_session(&self) {
        self.worker.stop();
        let mut core = self.shared.core.lock();
        self.shared.clear(&mut core, AcquisitionState::Idle);
        info!("Session ended; camera state cleared");
    }

    /// The target process exited
    pub fn process_stopped(&self) {
        self.end_session();
        self.shared.throttle.reset();
        info!("Target process stopped");
    }

    /// Stop the background worker, if running
    pub fn shutdown(&self) {
        self.worker.stop();
    }

    /// Run one acquisition attempt on the calling thread, without settle
    /// delays
    pub fn try_acquire(&self) -> Result<(), AcquireError> {
        self.shared.begin_search();
        acquisition::attempt(self.reader.as_ref(), self.probe.as_ref(), &self.config, &self.shared)
    }

    /// Per-tick entry point
    ///
    /// Applies queued lifecycle events, restarts acquisition after a hard
    /// reset, and refreshes the matrix when acquired. Never fails; a tick
    /// that cannot refresh is a no-op.
    pub fn tick(&self, viewer: Option<&dyn LocalViewer>) {
        self.pump_events();

        let restart = std::mem::take(&mut self.shared.core.lock().restart_pending);
        if restart && self.worker.start(self.worker_context(), StartMode::Recover) {
            info!("Re-acquiring camera after sustained validation failure");
        }

        updater::tick(self.reader.as_ref(), &self.shared, self.probe.as_ref(), &self.config, viewer);
    }

    /// Current acquisition state
    pub fn state(&self) -> AcquisitionState {
        self.shared.frame.load().state
    }

    /// Latest committed frame
    pub fn frame(&self) -> Arc<FrameState> {
        self.shared.frame.load_full()
    }

    /// Whether acquisition is validated and the matrix is fresh
    pub fn is_ready(&self) -> bool {
        let frame = self.shared.frame.load();
        frame.state == AcquisitionState::Validated
            && frame
                .last_validated
                .is_some_and(|at| at.elapsed() <= self.config.ready_window())
    }

    /// Whether the overlay may consume projections
    pub fn overlay_enabled(&self) -> bool {
        self.shared.overlay_enabled.load(Ordering::Acquire)
    }

    /// Project a world point with the latest committed matrix
    pub fn world_to_screen(&self, world: Vec3, bounds_check: bool, tolerance: bool) -> Option<Vec2> {
        let frame = self.shared.frame.load();
        let viewport = *self.viewport.read();
        let options = ProjectOptions {
            bounds_check,
            tolerance,
            tolerance_px: self.config.screen_tolerance_px,
            min_w: self.config.min_w,
        };
        project(world, &frame, &viewport, options)
    }

    /// Current screen size
    pub fn viewport(&self) -> Viewport {
        *self.viewport.read()
    }

    /// Replace the screen size; non-positive sizes fall back to 1920x1080
    pub fn update_viewport_resolution(&self, width: f32, height: f32) {
        let viewport = Viewport::new(width, height);
        *self.viewport.write() = viewport;
        info!(width = viewport.width, height = viewport.height, "Viewport updated");
    }

    /// Diagnostic snapshot
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let (handles, addresses, consecutive_failures, epoch) = {
            let core = self.shared.core.lock();
            (core.handles, core.addresses, core.consecutive_failures, core.epoch)
        };
        let frame = self.frame();

        DebugSnapshot {
            state: frame.state,
            ready: self.is_ready(),
            overlay_enabled: self.overlay_enabled(),
            handles,
            addresses,
            matrix: frame.matrix,
            fov: frame.fov,
            aspect: frame.aspect,
            zoom: frame.zoom,
            scoped: frame.scoped,
            consecutive_failures,
            epoch,
            ms_since_validation: frame.last_validated.map(|at| at.elapsed().as_millis()),
            viewport: self.viewport(),
        }
    }
}

impl<M: ScatterReader + 'static> Drop for CameraContext<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
