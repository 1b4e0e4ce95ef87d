//! Mock transport implementation used in testing the interface
//!
//! Registers are stored sparsely and read back as zero until written. The control/status word at
//! offset zero behaves like the gateware state machine: start and reset take effect immediately,
//! while a stop request only shows up in the status after a configurable number of reads.

use super::{
    check_slot,
    check_word,
    Transport,
    TransportResult,
};
use crate::core::N;
use std::collections::HashMap;

/// Byte length of the simulated register page
pub const PAGE_LEN: usize = 4096;

/// Reads of the status word it takes for a stop request to complete
pub const DEFAULT_STOP_LATENCY: usize = 2;

const CTL_STS: usize = 0x00;
const RST: u32 = 1 << 0;
const STA: u32 = 1 << 2;
const STO: u32 = 1 << 3;

/// A peripheral that mocks reads and writes, useful for testing
#[derive(Debug, Clone)]
pub struct Mock {
    registers: HashMap<usize, u32>,
    table: Vec<i32>,
    state: u32,
    stop_latency: usize,
    pending_stop: Option<usize>,
    writes: Vec<(usize, u32)>,
}

impl Default for Mock {
    fn default() -> Self {
        Self::new()
    }
}

impl Mock {
    /// An idle peripheral with zeroed registers and buffer
    #[must_use]
    pub fn new() -> Self {
        Self {
            registers: HashMap::default(),
            table: vec![0; N],
            state: 0,
            stop_latency: DEFAULT_STOP_LATENCY,
            pending_stop: None,
            writes: vec![],
        }
    }

    /// Set how many status reads a stop takes to be reported
    #[must_use]
    pub fn with_stop_latency(mut self, reads: usize) -> Self {
        self.stop_latency = reads;
        self
    }

    /// Preload the buffer, starting at slot zero
    ///
    /// # Panics
    /// Panics if `data` is longer than the buffer
    #[must_use]
    pub fn with_table(mut self, data: &[i32]) -> Self {
        self.table[..data.len()].copy_from_slice(data);
        self
    }

    /// Preload a register as if the hardware had set it
    #[must_use]
    pub fn with_register(mut self, offset: usize, word: u32) -> Self {
        self.registers.insert(offset, word);
        self
    }

    /// Every register write seen so far, in order, as `(offset, word)`
    #[must_use]
    pub fn writes(&self) -> &[(usize, u32)] {
        &self.writes
    }

    /// Forget the recorded write history
    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    fn command(&mut self, word: u32) {
        if word & RST != 0 {
            self.state = 0;
            self.pending_stop = None;
        }
        if word & STA != 0 {
            self.state = STA;
            self.pending_stop = None;
        }
        if word & STO != 0 && self.pending_stop.is_none() {
            self.pending_stop = Some(self.stop_latency);
        }
    }

    fn status(&mut self) -> u32 {
        match self.pending_stop {
            Some(0) => {
                self.state = STO;
                self.pending_stop = None;
            }
            Some(n) => self.pending_stop = Some(n - 1),
            None => (),
        }
        self.state
    }
}

impl Transport for Mock {
    fn read_word(&mut self, offset: usize) -> TransportResult<u32> {
        check_word(offset, PAGE_LEN)?;
        if offset == CTL_STS {
            return Ok(self.status());
        }
        Ok(self.registers.get(&offset).copied().unwrap_or_default())
    }

    fn write_word(&mut self, offset: usize, word: u32) -> TransportResult<()> {
        check_word(offset, PAGE_LEN)?;
        self.writes.push((offset, word));
        if offset == CTL_STS {
            self.command(word);
        } else {
            self.registers.insert(offset, word);
        }
        Ok(())
    }

    fn slots(&self) -> usize {
        self.table.len()
    }

    fn read_slot(&mut self, index: usize) -> TransportResult<i32> {
        check_slot(index, self.slots())?;
        Ok(self.table[index])
    }

    fn write_slot(&mut self, index: usize, value: i32) -> TransportResult<()> {
        check_slot(index, self.slots())?;
        self.table[index] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Error;

    #[test]
    fn test_read_unwritten() {
        let mut transport = Mock::new();
        assert_eq!(transport.read_word(0x5C).unwrap(), 0);
        assert_eq!(transport.read_slot(0).unwrap(), 0);
    }

    #[test]
    fn test_write_read() {
        let mut transport = Mock::new();
        transport.write_word(0x10, 1234).unwrap();
        assert_eq!(transport.read_word(0x10).unwrap(), 1234);
        assert_eq!(transport.writes(), &[(0x10, 1234)]);
    }

    #[test]
    fn test_bounds() {
        let mut transport = Mock::new();
        assert!(matches!(
            transport.read_word(PAGE_LEN),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(matches!(
            transport.write_word(0x11, 0),
            Err(Error::Misaligned(0x11))
        ));
        assert!(transport.write_slot(N, 0).is_err());
    }

    #[test]
    fn test_preload() {
        let mut transport = Mock::new()
            .with_table(&[5, -5])
            .with_register(0x30, 99);
        assert_eq!(transport.read_slots(0, 3).unwrap(), vec![5, -5, 0]);
        assert_eq!(transport.read_word(0x30).unwrap(), 99);
    }

    #[test]
    fn test_start_is_immediate() {
        let mut transport = Mock::new();
        transport.write_word(CTL_STS, STA).unwrap();
        assert_eq!(transport.read_word(CTL_STS).unwrap(), STA);
    }

    #[test]
    fn test_stop_latency() {
        let mut transport = Mock::new().with_stop_latency(3);
        transport.write_word(CTL_STS, STA).unwrap();
        transport.write_word(CTL_STS, STO).unwrap();
        for _ in 0..3 {
            assert_eq!(transport.read_word(CTL_STS).unwrap(), STA);
        }
        assert_eq!(transport.read_word(CTL_STS).unwrap(), STO);
        assert_eq!(transport.read_word(CTL_STS).unwrap(), STO);
    }

    #[test]
    fn test_reset_cancels_stop() {
        let mut transport = Mock::new();
        transport.write_word(CTL_STS, STA).unwrap();
        transport.write_word(CTL_STS, STO).unwrap();
        transport.write_word(CTL_STS, RST).unwrap();
        for _ in 0..5 {
            assert_eq!(transport.read_word(CTL_STS).unwrap(), 0);
        }
    }
}
