//! Per-tick matrix refresh
//!
//! Once acquisition has validated the primary camera, every tick picks the
//! active camera (primary, or optic while scoped), queues one scatter batch
//! and commits the result from the completion callback. A rejected matrix
//! leaves the previous snapshot in place; enough consecutive rejections
//! force a hard reset.

use crate::acquisition::{AcquireError, AcquisitionState, Shared};
use crate::camera::{CameraHandle, CameraRole};
use crate::config::{CameraConfig, CameraLayout};
use crate::matrix::{validate, RawMatrix, ViewMatrixSnapshot};
use crate::platform::{field_address, is_sane_pointer, MemoryError, MemoryReader, ScatterBatch, ScatterReader};
use crate::session::{LocalViewer, SessionProbe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// The committed, immutable view state read by the projector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    /// Last validated view matrix, or identity
    pub matrix: ViewMatrixSnapshot,
    /// Primary camera field of view, degrees
    pub fov: f32,
    /// Primary camera aspect ratio
    pub aspect: f32,
    /// Active camera zoom level
    pub zoom: f32,
    /// Whether `matrix` came from the optic camera while scoped
    pub scoped: bool,
    /// Camera `matrix` was read from
    pub active_role: CameraRole,
    /// Acquisition state at publish time
    pub state: AcquisitionState,
    /// When a matrix last passed validation
    pub last_validated: Option<Instant>,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            matrix: ViewMatrixSnapshot::IDENTITY,
            fov: 0.0,
            aspect: 0.0,
            zoom: 0.0,
            scoped: false,
            active_role: CameraRole::Primary,
            state: AcquisitionState::Idle,
            last_validated: None,
        }
    }
}

/// Raw values delivered by one refresh batch
#[derive(Debug, Clone)]
pub(crate) struct Refresh {
    pub matrix: Result<RawMatrix, MemoryError>,
    pub fov: Option<f32>,
    pub aspect: Option<f32>,
    pub zoom: Option<f32>,
    pub role: CameraRole,
    pub scoped: bool,
}

/// What a completed refresh did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    /// New matrix committed
    Committed,
    /// Matrix rejected; previous snapshot kept
    Rejected,
    /// Rejections reached the threshold; acquisition reset
    HardReset,
    /// A reset happened after the batch was issued
    Discarded,
}

/// Whether the equipped optic is actually zoomed in
///
/// Prefers the optic's explicit zoom value and falls back to probing the
/// optic camera's zoom level.
pub(crate) fn is_scoped<M: MemoryReader>(
    reader: &M,
    viewer: &dyn LocalViewer,
    optic: CameraHandle,
    layout: &CameraLayout,
) -> bool {
    let Some(component) = viewer.optic_component().filter(|&c| is_sane_pointer(c)) else {
        return false;
    };

    let explicit = field_address(component, layout.optic_zoom_offset).and_then(|a| reader.read::<f32>(a));
    if let Ok(zoom) = explicit {
        if zoom.is_finite() && zoom > 0.0 {
            return true;
        }
    }

    match field_address(optic.0, layout.zoom_offset).and_then(|a| reader.read::<f32>(a)) {
        Ok(level) => level.is_finite() && level > 1.0,
        Err(_) => false,
    }
}

/// Commit a completed refresh batch
pub(crate) fn apply_refresh(
    shared: &Shared,
    epoch: u64,
    refresh: Refresh,
    in_round: bool,
    config: &CameraConfig,
) -> RefreshOutcome {
    let mut core = shared.core.lock();
    if core.epoch != epoch || core.state != AcquisitionState::Validated {
        return RefreshOutcome::Discarded;
    }

    let verdict = refresh
        .matrix
        .map_err(AcquireError::from)
        .and_then(|raw| {
            validate(&raw, in_round, config.world_bound)?;
            Ok(raw)
        });

    let accepted = match verdict {
        Ok(raw) => {
            core.consecutive_failures = 0;
            Some(raw)
        }
        Err(e) => {
            core.consecutive_failures += 1;
            if shared.throttle.allow("refresh") {
                debug!(
                    failures = core.consecutive_failures,
                    role = ?refresh.role,
                    error = %e,
                    "Refreshed matrix rejected"
                );
            }
            if core.consecutive_failures >= config.hard_reset_threshold {
                shared.hard_reset(&mut core);
                return RefreshOutcome::HardReset;
            }
            None
        }
    };

    shared.publish(&core, |frame| {
        if let Some(raw) = &accepted {
            frame.matrix = ViewMatrixSnapshot::from_raw(raw);
            frame.scoped = refresh.scoped;
            frame.active_role = refresh.role;
            frame.last_validated = Some(Instant::now());
        }
        if let Some(fov) = refresh.fov {
            frame.fov = fov;
        }
        if let Some(aspect) = refresh.aspect {
            frame.aspect = aspect;
        }
        if let Some(zoom) = refresh.zoom {
            frame.zoom = zoom;
        }
    });

    if accepted.is_some() {
        RefreshOutcome::Committed
    } else {
        RefreshOutcome::Rejected
    }
}

/// Issue this tick's refresh batch
///
/// Returns `true` if a batch was queued. Does nothing unless the session is
/// active, a viewer is present and acquisition is `Validated`.
pub(crate) fn tick<M: ScatterReader + 'static>(
    reader: &M,
    shared: &Arc<Shared>,
    probe: &dyn SessionProbe,
    config: &Arc<CameraConfig>,
    viewer: Option<&dyn LocalViewer>,
) -> bool {
    if !probe.is_session_active() {
        return false;
    }
    let Some(viewer) = viewer else {
        return false;
    };

    let (handles, addresses, epoch) = {
        let core = shared.core.lock();
        if core.state != AcquisitionState::Validated {
            return false;
        }
        (core.handles, core.addresses, core.epoch)
    };

    let layout = &config.layout;
    let aiming = viewer.is_aiming();
    let scoped = aiming && is_scoped(reader, viewer, handles.optic, layout);
    let role = if scoped { CameraRole::Optic } else { CameraRole::Primary };
    let active = handles.get(role);

    let mut batch = ScatterBatch::new();
    let matrix_slot = batch.push_value::<RawMatrix>(addresses.get(role));
    // Scalars whose address overflows are left out of the batch
    let mut push_scalar = |base: CameraHandle, offset| {
        field_address(base.0, offset)
            .ok()
            .map(|address| batch.push_value::<f32>(address))
    };
    let fov_slot = push_scalar(handles.primary, layout.fov_offset);
    let aspect_slot = push_scalar(handles.primary, layout.aspect_offset);
    let zoom_slot = push_scalar(active, layout.zoom_offset);

    trace!(?role, aiming, scoped, "Queueing matrix refresh");

    let shared = Arc::clone(shared);
    let config = Arc::clone(config);
    let in_round = probe.is_in_round();

    reader.scatter(
        batch,
        Box::new(move |results| {
            let refresh = Refresh {
                matrix: results.get::<RawMatrix>(matrix_slot),
                fov: fov_slot.and_then(|slot| results.get::<f32>(slot).ok()),
                aspect: aspect_slot.and_then(|slot| results.get::<f32>(slot).ok()),
                zoom: zoom_slot.and_then(|slot| results.get::<f32>(slot).ok()),
                role,
                scoped,
            };
            let outcome = apply_refresh(&shared, epoch, refresh, in_round, &config);
            trace!(?outcome, "Matrix refresh completed");
        }),
    );

    true
}
