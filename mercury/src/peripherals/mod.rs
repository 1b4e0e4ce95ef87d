//! Logic and implementations for the FPGA peripherals.
//!
//! Each peripheral owns its transport behind an `Arc<Mutex<T>>` and hands `Weak` upward pointers
//! to the sub-blocks it is built from (the control state machine and the sample buffer).

pub mod acquire;
pub mod buffer;
pub mod control;
pub mod generate;

use crate::{
    fixed_point::RangeError,
    transport,
};
use std::fmt::Display;
use thiserror::Error;
use tracing::warn;

/// Register layouts that live at a fixed offset of the register page
pub trait Offset {
    /// Byte offset from the start of the register page
    const OFFSET: usize;
}

/// A non-numeric argument that isn't one of the accepted choices
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidArgument {
    #[error("Unknown trigger edge {0:?}, expected one of positive/pos/p/+ or negative/neg/n/-")]
    Edge(String),
    #[error("Unsupported input range {0} V, expected 1.0 or 20.0")]
    Range(f64),
    #[error("Unknown burst mode {0:?}, expected one of continuous/finite/infinite")]
    BurstMode(String),
}

/// Everything a peripheral operation can fail with
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] transport::Error),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),
}

/// Log a validation failure before handing it back to the caller
pub(crate) fn reject<E>(err: E) -> Error
where
    E: Into<Error> + Display,
{
    warn!(%err, "Rejected argument");
    err.into()
}
