//! Prelude (helpful reexports) for this package

pub use crate::{
    core::{
        Peripheral,
        FS,
        N,
    },
    peripherals::{
        acquire::{
            Acquisition,
            Edge,
            InputRange,
        },
        generate::{
            BurstMode,
            Generator,
        },
        Error,
    },
    transport::{
        local::Local,
        mock::Mock,
        Transport,
    },
};
