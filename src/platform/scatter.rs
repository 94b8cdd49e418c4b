//! Batched (scatter) reads
//!
//! A scatter batch queues several reads and delivers every result together
//! through one completion callback. The callback may run on another thread.

use super::{Address, MemoryError, MemoryReader};

/// Index of a queued read inside a [`ScatterBatch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScatterSlot(usize);

/// A queue of reads to be executed together
#[derive(Debug, Clone, Default)]
pub struct ScatterBatch {
    requests: Vec<(Address, usize)>,
}

impl ScatterBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw read of `size` bytes
    pub fn push(&mut self, address: Address, size: usize) -> ScatterSlot {
        self.requests.push((address, size));
        ScatterSlot(self.requests.len() - 1)
    }

    /// Queue a read sized for `T`
    pub fn push_value<T: bytemuck::Pod>(&mut self, address: Address) -> ScatterSlot {
        self.push(address, std::mem::size_of::<T>())
    }

    /// Queued `(address, size)` pairs in slot order
    pub fn requests(&self) -> &[(Address, usize)] {
        &self.requests
    }

    /// Number of queued reads
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Run every queued read one by one against `reader`
    pub fn execute<R: MemoryReader + ?Sized>(&self, reader: &R) -> ScatterResults {
        let entries = self
            .requests
            .iter()
            .map(|&(address, size)| reader.read_bytes(address, size))
            .collect();
        ScatterResults { entries }
    }
}

/// Results of a completed batch, one entry per slot
#[derive(Debug, Clone)]
pub struct ScatterResults {
    entries: Vec<Result<Vec<u8>, MemoryError>>,
}

impl ScatterResults {
    /// Build results directly, in slot order
    pub fn from_entries(entries: Vec<Result<Vec<u8>, MemoryError>>) -> Self {
        Self { entries }
    }

    /// Raw bytes read for `slot`
    pub fn bytes(&self, slot: ScatterSlot) -> Result<&[u8], MemoryError> {
        match self.entries.get(slot.0) {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(e)) => Err(e.clone()),
            None => Err(MemoryError::ReadFailed {
                address: 0,
                size: 0,
                reason: format!("No result for scatter slot {}", slot.0),
            }),
        }
    }

    /// Decode the value read for `slot`
    pub fn get<T: bytemuck::Pod>(&self, slot: ScatterSlot) -> Result<T, MemoryError> {
        let bytes = self.bytes(slot)?;
        let size = std::mem::size_of::<T>();
        if bytes.len() < size {
            return Err(MemoryError::ReadFailed {
                address: 0,
                size,
                reason: format!("Expected {} bytes, got {}", size, bytes.len()),
            });
        }
        Ok(bytemuck::pod_read_unaligned(&bytes[..size]))
    }
}

/// Completion callback for a scatter batch
pub type ScatterCallback = Box<dyn FnOnce(ScatterResults) + Send + 'static>;

/// Batched read primitive
///
/// The default implementation executes the batch synchronously and calls
/// `on_complete` inline. Transports with a real batching primitive override
/// [`ScatterReader::scatter`] and may complete on another thread.
pub trait ScatterReader: MemoryReader {
    /// Execute `batch` and deliver the results to `on_complete`
    fn scatter(&self, batch: ScatterBatch, on_complete: ScatterCallback) {
        on_complete(batch.execute(self));
    }
}
