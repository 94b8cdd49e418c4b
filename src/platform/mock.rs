//! Mock platform for testing
//!
//! This module provides a mock implementation of the platform traits
//! that can be used for testing without requiring a live target process.

use super::{Address, MemoryError, MemoryReader, ScatterBatch, ScatterCallback, ScatterReader};
use crate::matrix::RawMatrix;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Mock memory storage
#[derive(Default, Clone)]
struct MockMemory {
    /// Memory regions with their data
    regions: HashMap<Address, Vec<u8>>,
}

impl MockMemory {
    fn write(&mut self, address: Address, data: &[u8]) {
        // Overwrite in place when the write lands inside an existing region
        for (&base, region) in self.regions.iter_mut() {
            let end = base + region.len() as Address;
            if address >= base && address + data.len() as Address <= end {
                let offset = (address - base) as usize;
                region[offset..offset + data.len()].copy_from_slice(data);
                return;
            }
        }
        self.regions.insert(address, data.to_vec());
    }

    fn read(&self, address: Address, size: usize) -> Option<Vec<u8>> {
        for (&base, data) in &self.regions {
            let end = base + data.len() as Address;
            if address >= base && address < end {
                let offset = (address - base) as usize;
                let available = data.len() - offset;

                if available >= size {
                    return Some(data[offset..offset + size].to_vec());
                }
            }
        }

        None
    }

    fn remove(&mut self, address: Address) {
        self.regions.remove(&address);
    }

    fn is_valid(&self, address: Address) -> bool {
        if address == 0 {
            return false;
        }

        self.regions
            .iter()
            .any(|(&base, data)| address >= base && address < base + data.len() as Address)
    }
}

/// Mock platform implementation for testing
#[derive(Clone, Default)]
pub struct MockPlatform {
    memory: Arc<RwLock<MockMemory>>,
    deferred: Arc<RwLock<bool>>,
    pending: Arc<Mutex<Vec<(ScatterBatch, ScatterCallback)>>>,
}

impl MockPlatform {
    /// Create a new mock platform
    pub fn new() -> Self {
        Self::default()
    }

    /// Write data to mock memory
    pub fn write_memory(&self, address: Address, data: &[u8]) {
        self.memory.write().write(address, data);
    }

    /// Write a POD type to memory
    pub fn write_value<T: bytemuck::Pod>(&self, address: Address, value: &T) {
        self.write_memory(address, bytemuck::bytes_of(value));
    }

    /// Write a pointer value
    pub fn write_ptr(&self, address: Address, target: Address) {
        self.write_value(address, &target);
    }

    /// Write a null-terminated string padded to `len` bytes
    pub fn write_cstring(&self, address: Address, value: &str, len: usize) {
        let mut buf = vec![0u8; len.max(value.len() + 1)];
        buf[..value.len()].copy_from_slice(value.as_bytes());
        self.write_memory(address, &buf);
    }

    /// Write a raw 4x4 matrix
    pub fn write_matrix(&self, address: Address, matrix: &RawMatrix) {
        self.write_value(address, matrix);
    }

    /// Drop the region that starts at `address`, making reads there fail
    pub fn unmap(&self, address: Address) {
        self.memory.write().remove(address);
    }

    /// Hold scatter completions until [`MockPlatform::complete_pending`]
    pub fn set_deferred_scatter(&self, deferred: bool) {
        *self.deferred.write() = deferred;
    }

    /// Number of scatter batches waiting for completion
    pub fn pending_scatters(&self) -> usize {
        self.pending.lock().len()
    }

    /// Execute and complete every held scatter batch
    pub fn complete_pending(&self) {
        let pending: Vec<_> = self.pending.lock().drain(..).collect();
        for (batch, on_complete) in pending {
            on_complete(batch.execute(self));
        }
    }
}

impl MemoryReader for MockPlatform {
    fn read_bytes(&self, address: Address, size: usize) -> Result<Vec<u8>, MemoryError> {
        self.memory
            .read()
            .read(address, size)
            .ok_or(MemoryError::ReadFailed {
                address,
                size,
                reason: "Address not found in mock memory".to_string(),
            })
    }

    fn is_valid_address(&self, address: Address) -> bool {
        self.memory.read().is_valid(address)
    }
}

impl ScatterReader for MockPlatform {
    fn scatter(&self, batch: ScatterBatch, on_complete: ScatterCallback) {
        if *self.deferred.read() {
            self.pending.lock().push((batch, on_complete));
            return;
        }
        on_complete(batch.execute(self));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_platform() {
        let platform = MockPlatform::new();

        let test_data = vec![0x01, 0x02, 0x03, 0x04, 0x05];
        platform.write_memory(0x1000, &test_data);

        let result = platform.read_bytes(0x1000, 5).unwrap();
        assert_eq!(result, test_data);

        // Reading from the middle of a region
        let result = platform.read_bytes(0x1002, 2).unwrap();
        assert_eq!(result, vec![0x03, 0x04]);
    }

    #[test]
    fn test_mock_platform_write_value() {
        let platform = MockPlatform::new();

        let test_value: u64 = 0x1234567890ABCDEF;
        platform.write_value(0x2000, &test_value);

        let result: u64 = platform.read(0x2000).unwrap();
        assert_eq!(result, test_value);
    }

    #[test]
    fn test_overwrite_inside_region() {
        let platform = MockPlatform::new();
        platform.write_memory(0x3000, &[0u8; 16]);
        platform.write_value(0x3008, &7u32);

        let result: u32 = platform.read(0x3008).unwrap();
        assert_eq!(result, 7);
        assert_eq!(platform.read_bytes(0x3000, 16).unwrap().len(), 16);
    }

    #[test]
    fn test_read_ptr_rejects_insane_values() {
        let platform = MockPlatform::new();
        platform.write_ptr(0x10_0000, 0x20_0000);
        platform.write_ptr(0x10_0010, 0x10);

        assert_eq!(platform.read_ptr(0x10_0000).unwrap(), 0x20_0000);
        assert_eq!(
            platform.read_ptr(0x10_0010),
            Err(MemoryError::InvalidAddress(0x10))
        );
    }

    #[test]
    fn test_read_cstring_bounded() {
        let platform = MockPlatform::new();
        platform.write_cstring(0x4000, "FPS Camera", 64);

        assert_eq!(platform.read_cstring(0x4000, 64).unwrap(), "FPS Camera");
        assert_eq!(platform.read_cstring(0x4000, 3).unwrap(), "FPS");
    }

    #[test]
    fn test_deferred_scatter() {
        let platform = MockPlatform::new();
        platform.write_value(0x5000, &3u32);
        platform.set_deferred_scatter(true);

        let seen = Arc::new(Mutex::new(None));
        let mut batch = ScatterBatch::new();
        let slot = batch.push_value::<u32>(0x5000);
        let sink = Arc::clone(&seen);
        platform.scatter(
            batch,
            Box::new(move |results| *sink.lock() = Some(results.get::<u32>(slot).unwrap())),
        );

        assert_eq!(platform.pending_scatters(), 1);
        assert!(seen.lock().is_none());

        platform.complete_pending();
        assert_eq!(*seen.lock(), Some(3));
    }

    #[test]
    fn test_is_valid_address() {
        let platform = MockPlatform::new();
        platform.write_memory(0x1000, &[0x01, 0x02, 0x03]);

        assert!(platform.is_valid_address(0x1000));
        assert!(platform.is_valid_address(0x1002));
        assert!(!platform.is_valid_address(0x1003));
        assert!(!platform.is_valid_address(0));

        platform.unmap(0x1000);
        assert!(!platform.is_valid_address(0x1000));
    }
}
