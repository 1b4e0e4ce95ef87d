//! The triggered acquisition ("acq") peripheral
//!
//! A capture runs until the trigger qualifies, keeps recording for the configured number of
//! post-trigger samples and then stops on its own. The analog front end has two input ranges and
//! the equalization filter coefficients are tied to the selected one, so they are only ever
//! written together with the range tag.

use super::{
    buffer::SampleBuffer,
    control::TriggerController,
    reject,
    Error,
    InvalidArgument,
    Offset,
};
use crate::{
    core::{
        Peripheral,
        Register,
        RegisterMap,
        FS,
    },
    fixed_point::{
        check_unit,
        decode,
        encode,
        Domain,
        RangeError,
        SAMPLE,
    },
    transport::{
        local::Local,
        lock,
        Deserialize,
        Serialize,
        Transport,
        TransportResult,
    },
};
use mercury_derive::{
    offset,
    RegisterSerde,
};
use packed_struct::prelude::*;
use std::{
    fmt,
    str::FromStr,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tracing::debug;

const CFG_TRG: usize = 0x08;
const CFG_PRE: usize = 0x10;
const CFG_PST: usize = 0x14;
const STS_PRE: usize = 0x18;
const STS_PST: usize = 0x1C;
const CTS_ACQ: usize = 0x20;
const CTS_TRG: usize = 0x28;
const CTS_STP: usize = 0x30;
const CFG_LVL: usize = 0x40;
const CFG_HST: usize = 0x44;
const CFG_RNG: usize = 0x4C;
const CFG_DEC: usize = 0x50;
const CFG_SHR: usize = 0x54;
const CFG_AVG: usize = 0x58;
const CFG_BYP: usize = 0x5C;
const CFG_FAA: usize = 0x60;
const CFG_FBB: usize = 0x64;
const CFG_FKK: usize = 0x68;
const CFG_FPP: usize = 0x6C;

/// Every field of the capture register bank, in address order
pub const REGISTERS: RegisterMap = &[
    Register { name: "ctl_sts", offset: 0x00 },
    Register { name: "cfg_mod", offset: 0x04 },
    Register { name: "cfg_trg", offset: CFG_TRG },
    Register { name: "cfg_pre", offset: CFG_PRE },
    Register { name: "cfg_pst", offset: CFG_PST },
    Register { name: "sts_pre", offset: STS_PRE },
    Register { name: "sts_pst", offset: STS_PST },
    Register { name: "cts_acq_lo", offset: CTS_ACQ },
    Register { name: "cts_acq_hi", offset: CTS_ACQ + 4 },
    Register { name: "cts_trg_lo", offset: CTS_TRG },
    Register { name: "cts_trg_hi", offset: CTS_TRG + 4 },
    Register { name: "cts_stp_lo", offset: CTS_STP },
    Register { name: "cts_stp_hi", offset: CTS_STP + 4 },
    Register { name: "cfg_lvl", offset: CFG_LVL },
    Register { name: "cfg_hst", offset: CFG_HST },
    Register { name: "cfg_edg", offset: 0x48 },
    Register { name: "cfg_rng", offset: CFG_RNG },
    Register { name: "cfg_dec", offset: CFG_DEC },
    Register { name: "cfg_shr", offset: CFG_SHR },
    Register { name: "cfg_avg", offset: CFG_AVG },
    Register { name: "cfg_byp", offset: CFG_BYP },
    Register { name: "cfg_faa", offset: CFG_FAA },
    Register { name: "cfg_fbb", offset: CFG_FBB },
    Register { name: "cfg_fkk", offset: CFG_FKK },
    Register { name: "cfg_fpp", offset: CFG_FPP },
];

/// Acquisition mode bits
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PackedStruct, RegisterSerde)]
#[offset(0x04)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct Mode {
    /// Rearm after every capture instead of stopping
    #[packed_field(bits = "31")]
    pub continuous: bool,
    /// Trigger by itself when no qualifying edge shows up
    #[packed_field(bits = "30")]
    pub automatic: bool,
}

/// Trigger edge polarity
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Edge {
    Positive,
    Negative,
}

impl FromStr for Edge {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" | "pos" | "p" | "+" => Ok(Edge::Positive),
            "negative" | "neg" | "n" | "-" => Ok(Edge::Negative),
            _ => Err(InvalidArgument::Edge(s.to_string())),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Positive => write!(f, "positive"),
            Edge::Negative => write!(f, "negative"),
        }
    }
}

impl Offset for Edge {
    const OFFSET: usize = 0x48;
}

impl Serialize for Edge {
    fn serialize(&self) -> u32 {
        match self {
            Edge::Positive => 0,
            Edge::Negative => 1,
        }
    }
}

impl Deserialize for Edge {
    fn deserialize(word: u32) -> TransportResult<Self> {
        // Only the lowest bit is implemented in the fabric
        Ok(if word & 1 == 0 {
            Edge::Positive
        } else {
            Edge::Negative
        })
    }
}

/// The equalization filter coefficients
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FilterCoefficients {
    pub aa: u32,
    pub bb: u32,
    pub kk: u32,
    pub pp: u32,
}

/// The analog front end ranges
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InputRange {
    /// ±1 V
    Low,
    /// ±20 V
    High,
}

impl InputRange {
    /// Full scale in volts
    #[must_use]
    pub fn volts(self) -> f64 {
        match self {
            InputRange::Low => 1.0,
            InputRange::High => 20.0,
        }
    }

    /// The filter that compensates the front end at this range
    #[must_use]
    pub fn coefficients(self) -> FilterCoefficients {
        match self {
            InputRange::Low => FilterCoefficients {
                aa: 0x7D93,
                bb: 0x437C7,
                kk: 0xD9_999A,
                pp: 0x2666,
            },
            InputRange::High => FilterCoefficients {
                aa: 0x4C5F,
                bb: 0x2F38B,
                kk: 0xD9_999A,
                pp: 0x2666,
            },
        }
    }

    fn tag(self) -> u32 {
        match self {
            InputRange::Low => 0,
            InputRange::High => 1,
        }
    }
}

impl TryFrom<f64> for InputRange {
    type Error = InvalidArgument;

    #[allow(clippy::float_cmp)]
    fn try_from(volts: f64) -> Result<Self, Self::Error> {
        if volts == 1.0 {
            Ok(InputRange::Low)
        } else if volts == 20.0 {
            Ok(InputRange::High)
        } else {
            Err(InvalidArgument::Range(volts))
        }
    }
}

/// Free running counter values latched at the capture milestones, in sample clock ticks
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Timestamps {
    pub acquire: u64,
    pub trigger: u64,
    pub stop: u64,
}

/// Convert a number of sample clock ticks to wall time
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_secs_f64(ticks as f64 / FS)
}

impl Timestamps {
    /// Time from start until the trigger
    #[must_use]
    pub fn pre_trigger(&self) -> Duration {
        ticks_to_duration(self.trigger.saturating_sub(self.acquire))
    }

    /// Time from the trigger until the capture stopped
    #[must_use]
    pub fn post_trigger(&self) -> Duration {
        ticks_to_duration(self.stop.saturating_sub(self.trigger))
    }

    /// Length of the whole capture
    #[must_use]
    pub fn total(&self) -> Duration {
        ticks_to_duration(self.stop.saturating_sub(self.acquire))
    }
}

/// `ceil(log2(factor))`, the right shift that normalizes a sum of `factor` samples
fn average_shift(factor: u32) -> u32 {
    u32::BITS - factor.saturating_sub(1).leading_zeros()
}

/// A triggered capture channel
#[derive(Debug)]
pub struct Acquisition<T> {
    transport: Arc<Mutex<T>>,
    /// The state machine
    pub control: TriggerController<T>,
    /// The captured samples
    pub buffer: SampleBuffer<T>,
    range: InputRange,
}

impl Acquisition<Local> {
    /// Attach to capture instance `index` and select the input range `volts`
    /// # Errors
    /// Returns an error if the device can't be claimed or if `volts` isn't a supported range
    pub fn open(index: u32, volts: f64) -> Result<Self, Error> {
        Self::new(Local::open(Peripheral::Capture, index)?, volts)
    }
}

impl<T> Acquisition<T>
where
    T: Transport,
{
    /// Take ownership of `transport` and select the input range `volts`. There is no default
    /// range, the filter coefficients always have to match the front end.
    /// # Errors
    /// Returns an error on bad transport or if `volts` isn't a supported range
    pub fn new(transport: T, volts: f64) -> Result<Self, Error> {
        let range = InputRange::try_from(volts).map_err(reject)?;
        let transport = Arc::new(Mutex::new(transport));
        let control = TriggerController::new(&transport);
        let buffer = SampleBuffer::new(&transport);
        let mut acq = Self {
            transport,
            control,
            buffer,
            range,
        };
        acq.apply_range(range)?;
        Ok(acq)
    }

    fn apply_range(&mut self, range: InputRange) -> Result<(), Error> {
        let FilterCoefficients { aa, bb, kk, pp } = range.coefficients();
        let mut transport = lock(&self.transport)?;
        transport.write(CFG_FAA, &aa)?;
        transport.write(CFG_FBB, &bb)?;
        transport.write(CFG_FKK, &kk)?;
        transport.write(CFG_FPP, &pp)?;
        transport.write(CFG_RNG, &range.tag())?;
        debug!(volts = range.volts(), aa, bb, kk, pp, "Input range");
        self.range = range;
        Ok(())
    }

    /// Select the input range (1 or 20 V), which also loads the matching filter
    /// # Errors
    /// Returns an error on bad transport or an unsupported range, leaving the old one in place
    pub fn set_input_range(&mut self, volts: f64) -> Result<(), Error> {
        let range = InputRange::try_from(volts).map_err(reject)?;
        self.apply_range(range)
    }

    /// The active input range in volts
    #[must_use]
    pub fn input_range(&self) -> f64 {
        self.range.volts()
    }

    /// The filter coefficients as currently loaded in hardware
    /// # Errors
    /// Returns an error on bad transport
    pub fn filter_coefficients(&self) -> Result<FilterCoefficients, Error> {
        let mut transport = lock(&self.transport)?;
        Ok(FilterCoefficients {
            aa: transport.read(CFG_FAA)?,
            bb: transport.read(CFG_FBB)?,
            kk: transport.read(CFG_FKK)?,
            pp: transport.read(CFG_FPP)?,
        })
    }

    /// Validate a level-like voltage and encode it relative to the input range
    fn encode_volts(&self, name: &'static str, volts: f64) -> Result<i32, Error> {
        check_unit(name, volts).map_err(reject)?;
        encode(volts / self.range.volts(), SAMPLE).map_err(|e| reject(e.of(name)))
    }

    fn decode_volts(&self, raw: i32) -> f64 {
        decode(raw, SAMPLE) * self.range.volts()
    }

    /// Configure the whole trigger at once. Every argument is checked before anything is written.
    /// # Errors
    /// Returns an error on bad transport, an unknown edge name or a level/hysteresis outside of
    /// `[-1, 1]` volts
    pub fn set_trigger(
        &self,
        edge: &str,
        level: f64,
        hysteresis: f64,
        pre_delay: u32,
        post_delay: u32,
        mask: u32,
    ) -> Result<(), Error> {
        let edge: Edge = edge.parse().map_err(reject)?;
        let level = self.encode_volts("level", level)?;
        let hysteresis = self.encode_volts("hysteresis", hysteresis)?;
        let mut transport = lock(&self.transport)?;
        transport.write(CFG_TRG, &mask)?;
        transport.write_reg(&edge)?;
        transport.write(CFG_LVL, &level)?;
        transport.write(CFG_HST, &hysteresis)?;
        transport.write(CFG_PRE, &pre_delay)?;
        transport.write(CFG_PST, &post_delay)?;
        debug!(
            mask,
            %edge,
            level,
            hysteresis,
            pre_delay,
            post_delay,
            "Trigger"
        );
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport or an unknown edge name
    pub fn set_edge(&self, edge: &str) -> Result<(), Error> {
        let edge: Edge = edge.parse().map_err(reject)?;
        lock(&self.transport)?.write_reg(&edge)?;
        debug!(%edge, "Trigger edge");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn edge(&self) -> Result<Edge, Error> {
        Ok(lock(&self.transport)?.read_reg()?)
    }

    /// Set the trigger level in volts
    /// # Errors
    /// Returns an error on bad transport or if `volts` is outside of `[-1, 1]`
    pub fn set_level(&self, volts: f64) -> Result<(), Error> {
        let raw = self.encode_volts("level", volts)?;
        lock(&self.transport)?.write(CFG_LVL, &raw)?;
        debug!(raw, "cfg_lvl");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn level(&self) -> Result<f64, Error> {
        let raw: i32 = lock(&self.transport)?.read(CFG_LVL)?;
        Ok(self.decode_volts(raw))
    }

    /// Set the trigger hysteresis in volts
    /// # Errors
    /// Returns an error on bad transport or if `volts` is outside of `[-1, 1]`
    pub fn set_hysteresis(&self, volts: f64) -> Result<(), Error> {
        let raw = self.encode_volts("hysteresis", volts)?;
        lock(&self.transport)?.write(CFG_HST, &raw)?;
        debug!(raw, "cfg_hst");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn hysteresis(&self) -> Result<f64, Error> {
        let raw: i32 = lock(&self.transport)?.read(CFG_HST)?;
        Ok(self.decode_volts(raw))
    }

    /// Number of samples to keep before the trigger
    /// # Errors
    /// Returns an error on bad transport
    pub fn set_trigger_pre_delay(&self, samples: u32) -> Result<(), Error> {
        lock(&self.transport)?.write(CFG_PRE, &samples)?;
        debug!(samples, "cfg_pre");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn trigger_pre_delay(&self) -> Result<u32, Error> {
        Ok(lock(&self.transport)?.read(CFG_PRE)?)
    }

    /// Number of samples to record after the trigger
    /// # Errors
    /// Returns an error on bad transport
    pub fn set_trigger_post_delay(&self, samples: u32) -> Result<(), Error> {
        lock(&self.transport)?.write(CFG_PST, &samples)?;
        debug!(samples, "cfg_pst");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn trigger_post_delay(&self) -> Result<u32, Error> {
        Ok(lock(&self.transport)?.read(CFG_PST)?)
    }

    /// Samples recorded before the trigger in the current capture
    /// # Errors
    /// Returns an error on bad transport
    pub fn trigger_pre_status(&self) -> Result<u32, Error> {
        Ok(lock(&self.transport)?.read(STS_PRE)?)
    }

    /// Samples recorded after the trigger in the current capture
    /// # Errors
    /// Returns an error on bad transport
    pub fn trigger_post_status(&self) -> Result<u32, Error> {
        Ok(lock(&self.transport)?.read(STS_PST)?)
    }

    /// Select which trigger sources are listened to
    /// # Errors
    /// Returns an error on bad transport
    pub fn set_trigger_mask(&self, mask: u32) -> Result<(), Error> {
        lock(&self.transport)?.write(CFG_TRG, &mask)?;
        debug!(mask, "cfg_trg");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn trigger_mask(&self) -> Result<u32, Error> {
        Ok(lock(&self.transport)?.read(CFG_TRG)?)
    }

    /// Set or clear `bits` of `cfg_mod`, leaving the rest of the word alone
    fn update_mode(&self, bits: Mode, enabled: bool) -> Result<(), Error> {
        let mask = bits.serialize();
        let mut transport = lock(&self.transport)?;
        let word: u32 = transport.read(Mode::OFFSET)?;
        let raw = if enabled { word | mask } else { word & !mask };
        transport.write(Mode::OFFSET, &raw)?;
        debug!(raw, "cfg_mod");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn set_continuous(&self, enabled: bool) -> Result<(), Error> {
        self.update_mode(
            Mode {
                continuous: true,
                ..Mode::default()
            },
            enabled,
        )
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn continuous(&self) -> Result<bool, Error> {
        let mode: Mode = lock(&self.transport)?.read_reg()?;
        Ok(mode.continuous)
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn set_automatic(&self, enabled: bool) -> Result<(), Error> {
        self.update_mode(
            Mode {
                automatic: true,
                ..Mode::default()
            },
            enabled,
        )
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn automatic(&self) -> Result<bool, Error> {
        let mode: Mode = lock(&self.transport)?.read_reg()?;
        Ok(mode.automatic)
    }

    /// Keep one of every `factor` samples
    /// # Errors
    /// Returns an error on bad transport or if `factor` is zero
    pub fn set_decimation(&self, factor: u32) -> Result<(), Error> {
        if factor == 0 {
            return Err(reject(RangeError {
                name: "decimation",
                value: 0.0,
                domain: Domain::AtLeast(1.0),
            }));
        }
        lock(&self.transport)?.write(CFG_DEC, &(factor - 1))?;
        debug!(raw = factor - 1, "cfg_dec");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn decimation(&self) -> Result<u32, Error> {
        let raw: u32 = lock(&self.transport)?.read(CFG_DEC)?;
        Ok(raw.saturating_add(1))
    }

    /// Average instead of dropping the decimated samples. Enabling recomputes the normalizing
    /// shift from the decimation currently in hardware, so set the decimation first.
    /// # Errors
    /// Returns an error on bad transport
    pub fn set_average(&self, enabled: bool) -> Result<(), Error> {
        let mut transport = lock(&self.transport)?;
        transport.write(CFG_AVG, &enabled)?;
        if enabled {
            let raw: u32 = transport.read(CFG_DEC)?;
            let shift = average_shift(raw.saturating_add(1));
            transport.write(CFG_SHR, &shift)?;
            debug!(shift, "cfg_shr");
        }
        debug!(enabled, "cfg_avg");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn average(&self) -> Result<bool, Error> {
        Ok(lock(&self.transport)?.read(CFG_AVG)?)
    }

    /// The right shift applied to averaged samples
    /// # Errors
    /// Returns an error on bad transport
    pub fn shift(&self) -> Result<u32, Error> {
        Ok(lock(&self.transport)?.read(CFG_SHR)?)
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn set_filter_bypass(&self, bypass: bool) -> Result<(), Error> {
        lock(&self.transport)?.write(CFG_BYP, &bypass)?;
        debug!(bypass, "cfg_byp");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn filter_bypass(&self) -> Result<bool, Error> {
        Ok(lock(&self.transport)?.read(CFG_BYP)?)
    }

    /// Snapshot the whole buffer in volts
    /// # Errors
    /// Returns an error on bad transport
    pub fn read_samples(&self) -> Result<Vec<f64>, Error> {
        let raw = self.buffer.read()?;
        Ok(raw.into_iter().map(|r| self.decode_volts(r)).collect())
    }

    /// Read `len` samples in volts starting at buffer slot `start`, wrapping around the end
    /// # Errors
    /// Returns an error on bad transport
    pub fn read_window(&self, start: usize, len: usize) -> Result<Vec<f64>, Error> {
        let raw = self.buffer.read_window(start, len)?;
        Ok(raw.into_iter().map(|r| self.decode_volts(r)).collect())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn timestamps(&self) -> Result<Timestamps, Error> {
        let mut transport = lock(&self.transport)?;
        Ok(Timestamps {
            acquire: transport.read_u64(CTS_ACQ)?,
            trigger: transport.read_u64(CTS_TRG)?,
            stop: transport.read_u64(CTS_STP)?,
        })
    }

    /// Read every register of the bank
    /// # Errors
    /// Returns an error on bad transport
    pub fn dump(&self) -> Result<Vec<(&'static str, u32)>, Error> {
        let mut transport = lock(&self.transport)?;
        Ok(REGISTERS
            .iter()
            .map(|reg| Ok((reg.name, transport.read_word(reg.offset)?)))
            .collect::<TransportResult<_>>()?)
    }
}
