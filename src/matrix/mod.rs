//! View matrix layout and decomposition
//!
//! [`RawMatrix`] mirrors the 64 bytes read from the target process, in
//! row-major order (`M11..M14, M21..M24, ...`). The projector only needs a
//! few rows of the transposed matrix, which [`ViewMatrixSnapshot`] caches.

use glam::Vec3;
use serde::Serialize;

mod validator;
pub use validator::{validate, ValidationFailure, DEFAULT_WORLD_BOUND};

/// Raw 4x4 float matrix as laid out in remote memory
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RawMatrix {
    /// Elements in row-major order
    pub m: [f32; 16],
}

impl RawMatrix {
    /// Size of the matrix in remote memory
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// The identity matrix
    pub const IDENTITY: Self = Self {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Build from rows
    pub fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        let mut m = [0.0; 16];
        for (r, row) in rows.iter().enumerate() {
            m[r * 4..r * 4 + 4].copy_from_slice(row);
        }
        Self { m }
    }

    /// Element at 1-based `(row, col)`, matching `Mrc` naming
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.m[(row - 1) * 4 + (col - 1)]
    }

    /// Transposed copy
    pub fn transpose(&self) -> Self {
        let mut m = [0.0; 16];
        for r in 0..4 {
            for c in 0..4 {
                m[c * 4 + r] = self.m[r * 4 + c];
            }
        }
        Self { m }
    }

    /// Last-row translation `(M41, M42, M43)`
    #[inline]
    pub fn translation_row(&self) -> Vec3 {
        Vec3::new(self.at(4, 1), self.at(4, 2), self.at(4, 3))
    }
}

impl Default for RawMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Decomposed view transform used by the projector
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewMatrixSnapshot {
    /// Right basis row
    pub right: Vec3,
    /// Up basis row
    pub up: Vec3,
    /// Depth row, dotted with the world point to get `w`
    pub translation: Vec3,
    /// Horizontal offset term
    pub m14: f32,
    /// Vertical offset term
    pub m24: f32,
    /// Depth offset term
    pub m44: f32,
}

impl ViewMatrixSnapshot {
    /// Snapshot of the identity matrix
    pub const IDENTITY: Self = Self {
        right: Vec3::X,
        up: Vec3::Y,
        translation: Vec3::ZERO,
        m14: 0.0,
        m24: 0.0,
        m44: 1.0,
    };

    /// Decompose a raw matrix read from the target
    pub fn from_raw(raw: &RawMatrix) -> Self {
        let t = raw.transpose();
        Self {
            right: Vec3::new(t.at(1, 1), t.at(1, 2), t.at(1, 3)),
            up: Vec3::new(t.at(2, 1), t.at(2, 2), t.at(2, 3)),
            translation: Vec3::new(t.at(4, 1), t.at(4, 2), t.at(4, 3)),
            m14: t.at(1, 4),
            m24: t.at(2, 4),
            m44: t.at(4, 4),
        }
    }

    /// Whether this is the reset value
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for ViewMatrixSnapshot {
    fn default() -> Self {
        Self::IDENTITY
    }
}
