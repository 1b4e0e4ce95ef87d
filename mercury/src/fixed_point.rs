//! Conversions between normalized real quantities and the fixed point integers held in registers.
//!
//! Two scaling conventions exist in the gateware. Samples, trigger levels and offsets use the
//! symmetric signed range `±(2^(DW-1) - 1)` while the amplitude multiplier uses `2^(DW-2)`, which
//! leaves one bit of headroom for gains above unity. Encoding truncates toward zero, exactly like
//! the integer cast the hardware tooling has always used.
//!
//! Buffer addressing counters are unsigned `CWM.CWF` fixed point numbers and are handled with the
//! `fixed` crate.

use crate::core::{
    CWF,
    DW,
};
use fixed::{
    types::extra::U16,
    FixedU32,
};
use std::fmt;
use thiserror::Error;

/// The `CWM.CWF` buffer address counter
pub type Counter = FixedU32<U16>;

/// The domain a numeric argument was checked against
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Domain {
    /// Inclusive on both ends
    Closed { min: f64, max: f64 },
    /// Strictly positive and strictly below the Nyquist bound (half the sample rate)
    Nyquist(f64),
    /// Inclusive lower bound
    AtLeast(f64),
    /// Any finite number
    Finite,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Closed { min, max } => write!(f, "[{min}, {max}]"),
            Domain::Nyquist(bound) => write!(f, "0 < f < FS/2 = {bound}"),
            Domain::AtLeast(min) => write!(f, ">= {min}"),
            Domain::Finite => write!(f, "the finite numbers"),
        }
    }
}

/// A numeric input was outside of its declared domain
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{name} = {value} is outside of {domain}")]
pub struct RangeError {
    /// What was being set
    pub name: &'static str,
    /// The offending value
    pub value: f64,
    /// The domain it violated
    pub domain: Domain,
}

impl RangeError {
    /// The normalized `[-1, 1]` domain
    pub const UNIT: Domain = Domain::Closed {
        min: -1.0,
        max: 1.0,
    };

    /// Rename the quantity this error talks about
    #[must_use]
    pub fn of(self, name: &'static str) -> Self {
        Self { name, ..self }
    }
}

/// Layout of a signed fixed point register field
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    /// Full scale `2^(bits-1) - 1`, symmetric around zero
    Symmetric { bits: u32 },
    /// Full scale `2^(bits-2)`
    Magnitude { bits: u32 },
}

/// Samples, trigger level/hysteresis and output offset
pub const SAMPLE: Format = Format::Symmetric { bits: DW };

/// Output amplitude multiplier
pub const AMPLITUDE: Format = Format::Magnitude { bits: DW };

impl Format {
    /// Register field width in bits
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Format::Symmetric { bits } | Format::Magnitude { bits } => bits,
        }
    }

    /// Position of the binary point
    #[must_use]
    pub const fn frac_bits(self) -> u32 {
        match self {
            Format::Symmetric { bits } => bits - 1,
            Format::Magnitude { bits } => bits - 2,
        }
    }

    /// The integer that represents `1.0`
    #[must_use]
    pub fn full_scale(self) -> f64 {
        let one = f64::from(1u32 << self.frac_bits());
        match self {
            Format::Symmetric { .. } => one - 1.0,
            Format::Magnitude { .. } => one,
        }
    }
}

/// Check that `value` lies in `[-1, 1]`
/// # Errors
/// Returns a [`RangeError`] naming `name` otherwise (including for NaN)
pub fn check_unit(name: &'static str, value: f64) -> Result<f64, RangeError> {
    if (-1.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(RangeError {
            name,
            value,
            domain: RangeError::UNIT,
        })
    }
}

/// Encode a normalized `value` into the register integer for `format`, truncating toward zero
/// # Errors
/// Returns an error if `value` is outside `[-1, 1]`
#[allow(clippy::cast_possible_truncation)]
pub fn encode(value: f64, format: Format) -> Result<i32, RangeError> {
    let value = check_unit("value", value)?;
    Ok((value * format.full_scale()) as i32)
}

/// Decode a register integer back into a normalized value
#[must_use]
pub fn decode(raw: i32, format: Format) -> f64 {
    f64::from(raw) / format.full_scale()
}

/// The buffer size register value for a table of `len` slots, `(len << CWF) - 1`
///
/// Returns `None` if `len` is zero or doesn't fit the counter
#[must_use]
pub fn size_field(len: usize) -> Option<u32> {
    Counter::checked_from_num(len)?.to_bits().checked_sub(1)
}

/// The number of table slots described by a buffer size register value
#[must_use]
pub fn table_len(size_field: u32) -> usize {
    Counter::from_bits(size_field.wrapping_add(1)).to_num()
}
