//! Monitor and control of the acquisition (`acq`) and arbitrary waveform generator (`asg`) FPGA
//! peripherals.
//!
//! Each peripheral is exported by the FPGA overlay as a UIO device node with a page of 32-bit
//! registers followed by a circular buffer of samples. A peripheral struct owns a [`Transport`]
//! to that memory and exposes the registers as calibrated, validated quantities.
//!
//! ```no_run
//! use mercury::prelude::*;
//!
//! # fn main() -> Result<(), mercury::peripherals::Error> {
//! let asg = Generator::open(0)?;
//! asg.set_waveform(&(0..1024).map(|i| (f64::from(i) / 1024.0 * std::f64::consts::TAU).sin()).collect::<Vec<_>>())?;
//! asg.set_frequency(1e3)?;
//! asg.set_amplitude(0.5)?;
//! asg.control.start()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Transport`]: transport::Transport

pub mod core;
pub mod fixed_point;
pub mod peripherals;
pub mod prelude;
pub mod transport;

#[cfg(feature = "python")]
mod python;
