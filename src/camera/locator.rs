//! Camera list scanning
//!
//! The remote list is re-read on every call since it grows and shrinks
//! between rounds. Entries that fail to read are skipped.

use super::{CameraHandle, CameraHandles, CameraRole};
use crate::config::CameraLayout;
use crate::platform::{field_address, Address, MemoryError, MemoryReader};
use tracing::trace;

/// Classify a camera by its object name
pub fn classify(name: &str) -> Option<CameraRole> {
    let name = name.to_ascii_lowercase();
    if !name.contains("camera") {
        return None;
    }

    if name.contains("fps") {
        Some(CameraRole::Primary)
    } else if name.contains("optic") || name.contains("baseoptic") {
        Some(CameraRole::Optic)
    } else {
        None
    }
}

/// Read the name of the object that owns `camera`
fn read_camera_name<M: MemoryReader>(
    reader: &M,
    camera: Address,
    layout: &CameraLayout,
    max_name_len: usize,
) -> Result<String, MemoryError> {
    let owner = reader.read_ptr(field_address(camera, layout.owner_offset)?)?;
    let name_ptr = reader.read_ptr(field_address(owner, layout.name_offset)?)?;
    reader.read_cstring(name_ptr, max_name_len)
}

/// Scan `count` entries of the list stored at `items`
///
/// At most `max_entries` entries are visited; the scan stops once both
/// roles are found. A role that is not found is left unset.
pub fn locate_cameras<M: MemoryReader>(
    reader: &M,
    items: Address,
    count: usize,
    layout: &CameraLayout,
    max_entries: usize,
    max_name_len: usize,
) -> CameraHandles {
    let mut found = CameraHandles::default();

    for index in 0..count.min(max_entries) {
        let slot = (index as Address)
            .checked_mul(layout.list_item_stride)
            .ok_or(MemoryError::InvalidAddress(items))
            .and_then(|step| field_address(items, step));
        let camera = match slot.and_then(|slot| reader.read_ptr(slot)) {
            Ok(camera) => camera,
            Err(e) => {
                trace!(index, error = %e, "Skipping unreadable camera slot");
                continue;
            }
        };

        let name = match read_camera_name(reader, camera, layout, max_name_len) {
            Ok(name) => name,
            Err(e) => {
                trace!(index, error = %e, "Skipping camera without readable name");
                continue;
            }
        };

        match classify(&name) {
            Some(CameraRole::Primary) if !found.primary.is_set() => {
                trace!(index, %name, "Found primary camera");
                found.primary = CameraHandle(camera);
            }
            Some(CameraRole::Optic) if !found.optic.is_set() => {
                trace!(index, %name, "Found optic camera");
                found.optic = CameraHandle(camera);
            }
            _ => {}
        }

        if found.is_complete() {
            break;
        }
    }

    found
}

/// Read the list header at `list` and scan it
pub fn locate_in_list<M: MemoryReader>(
    reader: &M,
    list: Address,
    layout: &CameraLayout,
    max_entries: usize,
    max_name_len: usize,
) -> Result<CameraHandles, MemoryError> {
    let items = reader.read_ptr(field_address(list, layout.list_items_offset)?)?;
    let count: i32 = reader.read(field_address(list, layout.list_count_offset)?)?;
    let count = usize::try_from(count).unwrap_or(0);

    Ok(locate_cameras(reader, items, count, layout, max_entries, max_name_len))
}
