//! Runtime configuration
//!
//! Every timing constant, threshold and remote layout offset is tunable.
//! The defaults match one known target; other builds of the target move the
//! offsets, and load timing differs per machine.

use crate::acquisition::BackoffPolicy;
use crate::projector::Viewport;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Offsets that describe where camera data lives in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraLayout {
    /// Camera list: offset of the backing items pointer
    pub list_items_offset: u64,
    /// Camera list: offset of the element count
    pub list_count_offset: u64,
    /// Stride between items in the backing storage
    pub list_item_stride: u64,
    /// Camera (and owner) to owning-object pointer; reused one level deeper
    pub owner_offset: u64,
    /// Owning object to its name string pointer
    pub name_offset: u64,
    /// Second hop of the chain to the view matrix
    pub matrix_offset: u64,
    /// Camera to field-of-view (f32, degrees)
    pub fov_offset: u64,
    /// Camera to aspect ratio (f32)
    pub aspect_offset: u64,
    /// Camera to zoom level (f32)
    pub zoom_offset: u64,
    /// Optic zoom component to its explicit zoom value (f32)
    pub optic_zoom_offset: u64,
}

impl Default for CameraLayout {
    fn default() -> Self {
        Self {
            list_items_offset: 0x0,
            list_count_offset: 0x8,
            list_item_stride: 0x8,
            owner_offset: 0x30,
            name_offset: 0x60,
            matrix_offset: 0xDC,
            fov_offset: 0x15C,
            aspect_offset: 0x4C8,
            zoom_offset: 0xB0,
            optic_zoom_offset: 0x28,
        }
    }
}

/// Display toggles forwarded untouched to the rendering layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayToggles {
    /// Draw entity names
    pub show_name: bool,
    /// Draw distance labels
    pub show_distance: bool,
    /// Draw a head marker
    pub show_head_marker: bool,
}

impl Default for OverlayToggles {
    fn default() -> Self {
        Self {
            show_name: true,
            show_distance: true,
            show_head_marker: false,
        }
    }
}

/// Configuration for a [`crate::CameraContext`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Delay before the first attempt, letting stale objects tear down
    pub initial_settle_ms: u64,
    /// Delay once the session first reports active, letting cameras spawn
    pub camera_spawn_settle_ms: u64,
    /// Delay between early attempts
    pub backoff_fast_ms: u64,
    /// How many attempts use the fast delay
    pub backoff_fast_attempts: usize,
    /// Delay between later attempts
    pub backoff_slow_ms: u64,
    /// Consecutive failed refresh ticks that force re-acquisition
    pub hard_reset_threshold: u32,
    /// How recent the last successful validation must be for `is_ready`
    pub ready_window_ms: u64,
    /// Minimum interval between identical failure logs
    pub log_throttle_ms: u64,
    /// Largest plausible absolute translation on any axis
    pub world_bound: f32,
    /// Smallest `w` still considered in front of the camera
    pub min_w: f32,
    /// Cap on camera list entries scanned per attempt
    pub max_camera_entries: usize,
    /// Bound on camera name reads
    pub max_name_len: usize,
    /// Extra margin for the tolerant bounds check, in pixels
    pub screen_tolerance_px: f32,
    /// Initial screen size
    pub viewport: Viewport,
    /// Remote layout offsets
    pub layout: CameraLayout,
    /// Rendering toggles
    pub overlay: OverlayToggles,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            initial_settle_ms: 15_000,
            camera_spawn_settle_ms: 10_000,
            backoff_fast_ms: 500,
            backoff_fast_attempts: 10,
            backoff_slow_ms: 1_000,
            hard_reset_threshold: 120,
            ready_window_ms: 5_000,
            log_throttle_ms: 5_000,
            world_bound: crate::matrix::DEFAULT_WORLD_BOUND,
            min_w: 0.098,
            max_camera_entries: 100,
            max_name_len: 64,
            screen_tolerance_px: 100.0,
            viewport: Viewport::default(),
            layout: CameraLayout::default(),
            overlay: OverlayToggles::default(),
        }
    }
}

impl CameraConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Load a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Retry schedule for the acquisition worker
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            vec![Duration::from_millis(self.backoff_fast_ms); self.backoff_fast_attempts],
            Duration::from_millis(self.backoff_slow_ms),
        )
    }

    /// Delay before the first attempt
    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    /// Delay once the session first reports active
    pub fn camera_spawn_settle(&self) -> Duration {
        Duration::from_millis(self.camera_spawn_settle_ms)
    }

    /// Freshness window for `is_ready`
    pub fn ready_window(&self) -> Duration {
        Duration::from_millis(self.ready_window_ms)
    }

    /// Minimum interval between identical failure logs
    pub fn log_throttle(&self) -> Duration {
        Duration::from_millis(self.log_throttle_ms)
    }
}
