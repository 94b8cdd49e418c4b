//! Platform abstraction layer
//!
//! This module provides the boundary to the remote memory transport:
//! - Single value, pointer and bounded string reads
//! - Batched (scatter) reads delivered through a completion callback
//! - Address sanity checks
//!
//! The transport itself lives outside this crate; hosts implement
//! [`MemoryReader`] and [`ScatterReader`] over whatever access they have.

mod scatter;
pub use scatter::{ScatterBatch, ScatterCallback, ScatterReader, ScatterResults, ScatterSlot};

#[cfg(test)]
pub mod mock;

/// Remote address in the target process
pub type Address = u64;

/// Lowest address considered a plausible heap/object pointer
pub const MIN_USER_ADDRESS: Address = 0x1_0000;

/// Highest canonical user-space address on x86-64
pub const MAX_USER_ADDRESS: Address = 0x7FFF_FFFF_FFFF;

/// Transport errors raised by remote reads
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// Failed to read memory at address
    #[error("Memory read failed at 0x{address:X} (size: {size}): {reason}")]
    ReadFailed {
        address: Address,
        size: usize,
        reason: String,
    },

    /// Address outside the plausible user-space range
    #[error("Invalid memory address: 0x{0:X}")]
    InvalidAddress(Address),

    /// String bytes were not valid UTF-8
    #[error("Invalid string at 0x{address:X}: {reason}")]
    InvalidString {
        address: Address,
        reason: String,
    },
}

/// Check that a pointer value is non-zero and inside the user-space range
#[inline]
pub fn is_sane_pointer(address: Address) -> bool {
    (MIN_USER_ADDRESS..=MAX_USER_ADDRESS).contains(&address)
}

/// Address of the field `offset` bytes into the object at `base`
///
/// Remote pointers are untrusted; a sum past the end of the address space
/// is reported as an invalid address instead of wrapping.
#[inline]
pub fn field_address(base: Address, offset: Address) -> Result<Address, MemoryError> {
    base.checked_add(offset).ok_or(MemoryError::InvalidAddress(base))
}

/// Core trait for reading memory from the target process
///
/// This trait abstracts the transport, allowing the rest of the codebase
/// to work with any implementation.
pub trait MemoryReader: Send + Sync {
    /// Read raw bytes from memory
    fn read_bytes(&self, address: Address, size: usize) -> Result<Vec<u8>, MemoryError>;

    /// Read a POD (Plain Old Data) type from memory
    fn read<T: bytemuck::Pod>(&self, address: Address) -> Result<T, MemoryError>
    where
        Self: Sized,
    {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(address, size)?;

        if bytes.len() != size {
            return Err(MemoryError::ReadFailed {
                address,
                size,
                reason: format!("Expected {} bytes, got {}", size, bytes.len()),
            });
        }

        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    /// Read a pointer and reject values outside the sane user-space range
    fn read_ptr(&self, address: Address) -> Result<Address, MemoryError>
    where
        Self: Sized,
    {
        let value: Address = self.read(address)?;
        if !is_sane_pointer(value) {
            return Err(MemoryError::InvalidAddress(value));
        }
        Ok(value)
    }

    /// Read a null-terminated string of at most `max_length` bytes
    fn read_cstring(&self, address: Address, max_length: usize) -> Result<String, MemoryError> {
        let bytes = self.read_bytes(address, max_length)?;

        // Find null terminator
        let null_pos = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());

        String::from_utf8(bytes[..null_pos].to_vec()).map_err(|e| MemoryError::InvalidString {
            address,
            reason: e.to_string(),
        })
    }

    /// Check if an address is valid (readable)
    fn is_valid_address(&self, address: Address) -> bool;
}
