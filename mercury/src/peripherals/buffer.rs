//! The circular sample buffer that sits one page past a peripheral's registers

use crate::{
    core::N,
    transport::{
        lock,
        upgrade,
        Error,
        Transport,
        TransportResult,
    },
};
use std::sync::{
    Arc,
    Mutex,
    Weak,
};

/// A circular window onto the `N` slot sample table
#[derive(Debug)]
pub struct SampleBuffer<T> {
    /// Upwards pointer to the parent peripheral's transport
    transport: Weak<Mutex<T>>,
}

impl<T> SampleBuffer<T>
where
    T: Transport,
{
    #[must_use]
    pub fn new(transport: &Arc<Mutex<T>>) -> Self {
        Self {
            transport: Arc::downgrade(transport),
        }
    }

    /// Number of slots in the table
    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Read one slot, the index wraps around the table
    /// # Errors
    /// Returns an error on bad transport
    pub fn read_addr(&self, index: usize) -> TransportResult<i32> {
        let tarc = upgrade(&self.transport)?;
        let mut transport = lock(&tarc)?;
        transport.read_slot(index % N)
    }

    /// Snapshot the entire table
    /// # Errors
    /// Returns an error on bad transport
    pub fn read(&self) -> TransportResult<Vec<i32>> {
        self.read_window(0, N)
    }

    /// Read `len` consecutive slots starting at `start`, wrapping around the end of the table
    /// # Errors
    /// Returns an error on bad transport
    pub fn read_window(&self, start: usize, len: usize) -> TransportResult<Vec<i32>> {
        let tarc = upgrade(&self.transport)?;
        let mut transport = lock(&tarc)?;
        (0..len)
            .map(|i| transport.read_slot((start + i) % N))
            .collect()
    }

    /// Write `data` into the table starting at slot zero
    /// # Errors
    /// Returns an error on bad transport or if `data` doesn't fit, in which case nothing is written
    pub fn write(&self, data: &[i32]) -> TransportResult<()> {
        if data.len() > N {
            return Err(Error::OutOfBounds {
                region: "sample buffer",
                offset: data.len() * 4,
                len: N * 4,
            });
        }
        let tarc = upgrade(&self.transport)?;
        let mut transport = lock(&tarc)?;
        transport.write_slots(0, data)
    }
}
