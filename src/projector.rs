//! World-to-screen projection
//!
//! Pure math over an already committed [`FrameState`]; no memory access,
//! no locks, safe to call from any number of render threads.

use crate::updater::FrameState;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Fallback screen width when the configured one is not positive
pub const DEFAULT_WIDTH: f32 = 1920.0;

/// Fallback screen height when the configured one is not positive
pub const DEFAULT_HEIGHT: f32 = 1080.0;

/// Screen rectangle the overlay draws into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
}

impl Viewport {
    /// Create a viewport, substituting 1920x1080 for a non-positive size
    pub fn new(width: f32, height: f32) -> Self {
        if width > 0.0 && height > 0.0 {
            Self { width, height }
        } else {
            Self {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            }
        }
    }

    /// Screen center
    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    /// Whether `point` lies inside the rectangle grown by `margin` on every side
    #[inline]
    pub fn contains(&self, point: Vec2, margin: f32) -> bool {
        point.x >= -margin
            && point.x <= self.width + margin
            && point.y >= -margin
            && point.y <= self.height + margin
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

/// Clipping options for a single projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectOptions {
    /// Reject points outside the viewport
    pub bounds_check: bool,
    /// Grow the viewport by `tolerance_px` before the bounds check
    pub tolerance: bool,
    /// Margin used when `tolerance` is set
    pub tolerance_px: f32,
    /// Smallest `w` still in front of the camera
    pub min_w: f32,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            bounds_check: false,
            tolerance: false,
            tolerance_px: 100.0,
            min_w: 0.098,
        }
    }
}

/// Project `world` to screen space, or `None` if it is behind the camera
/// or clipped.
pub fn project(world: Vec3, frame: &FrameState, viewport: &Viewport, options: ProjectOptions) -> Option<Vec2> {
    let view = &frame.matrix;

    let w = view.translation.dot(world) + view.m44;
    if w.is_nan() || w < options.min_w {
        return None;
    }

    let mut x = view.right.dot(world) + view.m14;
    let mut y = view.up.dot(world) + view.m24;

    // The matrix carries the main camera's FOV; optics render narrower
    if frame.scoped && frame.fov > 0.0 && frame.aspect > 0.0 {
        let half_angle = frame.fov.to_radians() * 0.5;
        let cot = half_angle.cos() / half_angle.sin();
        x /= cot * frame.aspect * 0.5;
        y /= cot * 0.5;
    }

    let center = viewport.center();
    let screen = Vec2::new(center.x * (1.0 + x / w), center.y * (1.0 - y / w));
    if !screen.is_finite() {
        return None;
    }

    if options.bounds_check {
        let margin = if options.tolerance { options.tolerance_px } else { 0.0 };
        if !viewport.contains(screen, margin) {
            return None;
        }
    }

    Some(screen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{RawMatrix, ViewMatrixSnapshot};

    fn frame(matrix: ViewMatrixSnapshot) -> FrameState {
        FrameState {
            matrix,
            ..FrameState::default()
        }
    }

    /// Camera looking down +Z: w = z, x = x, y = y
    fn forward_camera() -> ViewMatrixSnapshot {
        ViewMatrixSnapshot {
            right: Vec3::X,
            up: Vec3::Y,
            translation: Vec3::Z,
            m14: 0.0,
            m24: 0.0,
            m44: 0.0,
        }
    }

    #[test]
    fn test_identity_center_point() {
        let frame = frame(ViewMatrixSnapshot::from_raw(&RawMatrix::IDENTITY));
        let screen = project(Vec3::ZERO, &frame, &Viewport::new(1920.0, 1080.0), ProjectOptions::default());
        assert_eq!(screen, Some(Vec2::new(960.0, 540.0)));
    }

    #[test]
    fn test_behind_camera_rejected_regardless_of_xy() {
        let frame = frame(forward_camera());
        let viewport = Viewport::default();

        for world in [
            Vec3::new(0.0, 0.0, 0.0979),
            Vec3::new(500.0, -300.0, 0.0),
            Vec3::new(-1.0, 1.0, -25.0),
        ] {
            assert_eq!(project(world, &frame, &viewport, ProjectOptions::default()), None);
        }

        assert!(project(Vec3::new(0.0, 0.0, 0.098), &frame, &viewport, ProjectOptions::default()).is_some());
    }

    #[test]
    fn test_non_finite_matrix_terms_never_project() {
        let viewport = Viewport::default();
        let world = Vec3::new(0.0, 0.0, 10.0);

        let nan_w = frame(ViewMatrixSnapshot { m44: f32::NAN, ..forward_camera() });
        assert_eq!(project(world, &nan_w, &viewport, ProjectOptions::default()), None);

        let nan_x = frame(ViewMatrixSnapshot { m14: f32::NAN, ..forward_camera() });
        assert_eq!(project(world, &nan_x, &viewport, ProjectOptions::default()), None);

        let inf_y = frame(ViewMatrixSnapshot { m24: f32::INFINITY, ..forward_camera() });
        assert_eq!(project(world, &inf_y, &viewport, ProjectOptions::default()), None);
    }

    #[test]
    fn test_y_is_inverted() {
        let frame = frame(forward_camera());
        let viewport = Viewport::new(1000.0, 500.0);

        let screen = project(Vec3::new(0.5, 0.5, 1.0), &frame, &viewport, ProjectOptions::default()).unwrap();
        assert_eq!(screen, Vec2::new(750.0, 125.0));
    }

    #[test]
    fn test_projection_is_pure() {
        let frame = frame(forward_camera());
        let viewport = Viewport::default();
        let world = Vec3::new(1.5, -2.0, 12.0);

        let first = project(world, &frame, &viewport, ProjectOptions::default());
        let second = project(world, &frame, &viewport, ProjectOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_bounds_and_tolerance() {
        let frame = frame(forward_camera());
        let viewport = Viewport::new(1000.0, 1000.0);
        // x/w = 1.125 lands 62.5px right of the screen edge
        let world = Vec3::new(1.125, 0.0, 1.0);

        let unchecked = ProjectOptions::default();
        let strict = ProjectOptions { bounds_check: true, ..unchecked };
        let tolerant = ProjectOptions { bounds_check: true, tolerance: true, ..unchecked };

        assert_eq!(project(world, &frame, &viewport, unchecked), Some(Vec2::new(1062.5, 500.0)));
        assert_eq!(project(world, &frame, &viewport, strict), None);
        assert_eq!(project(world, &frame, &viewport, tolerant), Some(Vec2::new(1062.5, 500.0)));

        let far = Vec3::new(1.5, 0.0, 1.0);
        assert_eq!(project(far, &frame, &viewport, tolerant), None);
    }

    #[test]
    fn test_scoped_rescales_by_fov() {
        let mut scoped = frame(forward_camera());
        scoped.scoped = true;
        scoped.fov = 90.0;
        scoped.aspect = 2.0;
        let viewport = Viewport::new(1000.0, 1000.0);

        // cot(45deg) = 1, so x /= 1.0 and y /= 0.5
        let screen = project(Vec3::new(0.2, 0.2, 1.0), &scoped, &viewport, ProjectOptions::default()).unwrap();
        assert!((screen.x - 600.0).abs() < 1e-3);
        assert!((screen.y - 300.0).abs() < 1e-3);

        // Unscoped uses the raw projective values
        scoped.scoped = false;
        let screen = project(Vec3::new(0.2, 0.2, 1.0), &scoped, &viewport, ProjectOptions::default()).unwrap();
        assert!((screen.x - 600.0).abs() < 1e-3);
        assert!((screen.y - 400.0).abs() < 1e-3);
    }

    #[test]
    fn test_scoped_without_fov_uses_raw_values() {
        let mut scoped = frame(forward_camera());
        scoped.scoped = true;
        let viewport = Viewport::new(1000.0, 1000.0);

        let screen = project(Vec3::new(0.2, 0.2, 1.0), &scoped, &viewport, ProjectOptions::default()).unwrap();
        assert!((screen.x - 600.0).abs() < 1e-3);
    }

    #[test]
    fn test_viewport_fallback() {
        assert_eq!(Viewport::new(0.0, 1080.0), Viewport::new(1920.0, 1080.0));
        assert_eq!(Viewport::new(-5.0, -5.0), Viewport::default());
        assert_eq!(Viewport::new(800.0, 600.0).center(), Vec2::new(400.0, 300.0));
    }
}
