//! The core constants and types shared by every mercury peripheral
use std::path::{
    Path,
    PathBuf,
};

/// Sampling frequency of both the ADC and DAC in Hz
pub const FS: f64 = 125_000_000.0;

/// Data width of the ADC/DAC samples and of the linear scaling registers
pub const DW: u32 = 14;

/// Buffer counter width magnitude (fixed point integer bits)
pub const CWM: u32 = 14;

/// Buffer counter width fraction (fixed point fractional bits)
pub const CWF: u32 = 16;

/// Number of 32-bit slots in a sample buffer
pub const N: usize = 1 << CWM;

/// Where the UIO nodes of the overlay are published
pub const DEFAULT_UIO_PREFIX: &str = "/dev/uio";

/// The kinds of FPGA blocks this crate knows how to drive
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Peripheral {
    /// Triggered digitizer
    Capture,
    /// Arbitrary waveform generator with burst playback
    Generator,
}

impl Peripheral {
    /// The UIO node name stem for this block
    #[must_use]
    pub fn device_name(self) -> &'static str {
        match self {
            Peripheral::Capture => "acq",
            Peripheral::Generator => "asg",
        }
    }

    /// The device node of instance `index`, namespaced under `prefix`
    #[must_use]
    pub fn device_path(self, prefix: &Path, index: u32) -> PathBuf {
        prefix.join(format!("{}{index}", self.device_name()))
    }
}

/// The representation of a named register in a peripheral's register page
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Register {
    /// The field name as it appears in the gateware
    pub name: &'static str,
    /// Byte offset from the start of the register page
    pub offset: usize,
}

/// The full layout of one register bank, in address order
pub type RegisterMap = &'static [Register];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_path() {
        let prefix = Path::new(DEFAULT_UIO_PREFIX);
        assert_eq!(
            Peripheral::Capture.device_path(prefix, 0),
            PathBuf::from("/dev/uio/acq0")
        );
        assert_eq!(
            Peripheral::Generator.device_path(prefix, 1),
            PathBuf::from("/dev/uio/asg1")
        );
    }

    #[test]
    fn test_buffer_geometry() {
        assert_eq!(N, 16384);
        // The size field of a full table still fits a u32
        assert!((N as u64) << CWF <= u64::from(u32::MAX));
    }
}
