//! Pointer chain from a camera to its view matrix
//!
//! ```text
//! camera ──+owner──▶ owner ──+owner──▶ inner ──+matrix──▶ view matrix
//! ```
//!
//! The owner offset is applied twice, one level deeper the second time.

use super::CameraHandle;
use crate::acquisition::AcquireError;
use crate::config::CameraLayout;
use crate::platform::{field_address, is_sane_pointer, Address, MemoryError, MemoryReader};

/// Follow the pointer `offset` bytes into `base`, mapping a zero or
/// out-of-range pointer to "not ready"
fn hop<M: MemoryReader>(
    reader: &M,
    base: Address,
    offset: Address,
    what: &'static str,
) -> Result<Address, AcquireError> {
    match field_address(base, offset).and_then(|field| reader.read_ptr(field)) {
        Ok(next) => Ok(next),
        Err(MemoryError::InvalidAddress(_)) => Err(AcquireError::NotReady(what)),
        Err(e) => Err(AcquireError::Transport(e)),
    }
}

/// Resolve the address of `camera`'s view matrix
///
/// A stale or half-constructed camera yields [`AcquireError::NotReady`],
/// which callers treat as "try again later".
pub fn resolve_matrix_address<M: MemoryReader>(
    reader: &M,
    camera: CameraHandle,
    layout: &CameraLayout,
) -> Result<Address, AcquireError> {
    if !is_sane_pointer(camera.0) {
        return Err(AcquireError::NotReady("camera handle unset"));
    }

    let owner = hop(reader, camera.0, layout.owner_offset, "camera owner missing")?;
    let inner = hop(reader, owner, layout.owner_offset, "camera component missing")?;

    match field_address(inner, layout.matrix_offset) {
        Ok(matrix) if is_sane_pointer(matrix) && reader.is_valid_address(matrix) => Ok(matrix),
        _ => Err(AcquireError::NotReady("matrix address unmapped")),
    }
}
