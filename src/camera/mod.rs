//! Camera discovery
//!
//! - [`locator`] finds the primary and optic cameras in the remote camera list
//! - [`resolver`] walks the pointer chain from a camera to its view matrix

pub mod locator;
pub mod resolver;

pub use locator::{classify, locate_cameras};
pub use resolver::resolve_matrix_address;

use crate::platform::Address;
use serde::Serialize;
use std::fmt;

/// Opaque remote address of a camera object; zero means unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CameraHandle(pub Address);

impl CameraHandle {
    /// The unset handle
    pub const UNSET: Self = Self(0);

    /// Whether this handle points at something
    #[inline]
    pub fn is_set(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for CameraHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Role a camera plays in the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CameraRole {
    /// Always-active first-person camera
    Primary,
    /// Scope camera, active only while aiming through a zoom device
    Optic,
}

/// Both camera roles as found by the locator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CameraHandles {
    /// First-person camera
    pub primary: CameraHandle,
    /// Optic camera
    pub optic: CameraHandle,
}

impl CameraHandles {
    /// Whether both roles were found
    pub fn is_complete(&self) -> bool {
        self.primary.is_set() && self.optic.is_set()
    }

    /// Handle for `role`
    pub fn get(&self, role: CameraRole) -> CameraHandle {
        match role {
            CameraRole::Primary => self.primary,
            CameraRole::Optic => self.optic,
        }
    }
}

/// Resolved matrix addresses for both roles; zero means unresolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatrixAddresses {
    /// Primary camera view matrix
    pub primary: Address,
    /// Optic camera view matrix
    pub optic: Address,
}

impl MatrixAddresses {
    /// Address for `role`
    pub fn get(&self, role: CameraRole) -> Address {
        match role {
            CameraRole::Primary => self.primary,
            CameraRole::Optic => self.optic,
        }
    }
}
