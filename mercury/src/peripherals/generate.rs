//! The arbitrary waveform generator ("asg") peripheral
//!
//! The waveform table is walked by a `CWM.CWF` fixed point address counter. Its size field sets
//! the table period, the step sets how far the counter advances per sample clock (and therefore
//! the output frequency) and the offset sets the starting phase.

use super::{
    buffer::SampleBuffer,
    control::TriggerController,
    reject,
    Error,
    InvalidArgument,
};
use crate::{
    core::{
        Peripheral,
        Register,
        RegisterMap,
        FS,
        N,
    },
    fixed_point::{
        check_unit,
        decode,
        encode,
        size_field,
        table_len,
        Domain,
        RangeError,
        AMPLITUDE,
        SAMPLE,
    },
    transport::{
        local::Local,
        lock,
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
};
use tracing::debug;

const CFG_TRG: usize = 0x04;
const CFG_SIZ: usize = 0x10;
const CFG_OFF: usize = 0x14;
const CFG_STP: usize = 0x18;
const CFG_BDL: usize = 0x24;
const CFG_BLN: usize = 0x28;
const CFG_BNM: usize = 0x2C;
const STS_BLN: usize = 0x30;
const STS_BNM: usize = 0x34;
const CFG_MUL: usize = 0x38;
const CFG_SUM: usize = 0x3C;

/// Every field of the generator register bank, in address order
pub const REGISTERS: RegisterMap = &[
    Register { name: "ctl_sts", offset: 0x00 },
    Register { name: "cfg_trg", offset: CFG_TRG },
    Register { name: "cfg_siz", offset: CFG_SIZ },
    Register { name: "cfg_off", offset: CFG_OFF },
    Register { name: "cfg_stp", offset: CFG_STP },
    Register { name: "cfg_bmd", offset: 0x20 },
    Register { name: "cfg_bdl", offset: CFG_BDL },
    Register { name: "cfg_bln", offset: CFG_BLN },
    Register { name: "cfg_bnm", offset: CFG_BNM },
    Register { name: "sts_bln", offset: STS_BLN },
    Register { name: "sts_bnm", offset: STS_BNM },
    Register { name: "cfg_mul", offset: CFG_MUL },
    Register { name: "cfg_sum", offset: CFG_SUM },
];

/// How the table is played back, encoded as `[inf, ben]`
#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BurstMode {
    /// Loop the table forever without pauses
    #[default]
    Continuous = 0b00,
    /// A fixed number of bursts
    Finite = 0b01,
    /// Bursts repeated until stopped
    Infinite = 0b11,
}

impl FromStr for BurstMode {
    type Err = InvalidArgument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continuous" => Ok(BurstMode::Continuous),
            "finite" => Ok(BurstMode::Finite),
            "infinite" => Ok(BurstMode::Infinite),
            _ => Err(InvalidArgument::BurstMode(s.to_string())),
        }
    }
}

impl fmt::Display for BurstMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BurstMode::Continuous => write!(f, "continuous"),
            BurstMode::Finite => write!(f, "finite"),
            BurstMode::Infinite => write!(f, "infinite"),
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PackedStruct, RegisterSerde)]
#[offset(0x20)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct BurstControl {
    #[packed_field(bits = "30..=31", ty = "enum")]
    pub mode: BurstMode,
}

/// Where the burst state machine currently is
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct BurstStatus {
    /// Position inside the current burst period
    pub position: u32,
    /// Bursts played so far
    pub count: u32,
}

/// An arbitrary waveform generator channel
#[derive(Debug)]
pub struct Generator<T> {
    transport: Arc<Mutex<T>>,
    /// The state machine
    pub control: TriggerController<T>,
    /// The waveform table
    pub buffer: SampleBuffer<T>,
}

impl Generator<Local> {
    /// Attach to generator instance `index`
    /// # Errors
    /// Returns an error if the device can't be claimed
    pub fn open(index: u32) -> Result<Self, Error> {
        Ok(Self::new(Local::open(Peripheral::Generator, index)?))
    }
}

impl<T> Generator<T>
where
    T: Transport,
{
    #[must_use]
    pub fn new(transport: T) -> Self {
        let transport = Arc::new(Mutex::new(transport));
        let control = TriggerController::new(&transport);
        let buffer = SampleBuffer::new(&transport);
        Self {
            transport,
            control,
            buffer,
        }
    }

    /// The table period in counter units, `cfg_siz + 1`
    #[allow(clippy::cast_precision_loss)]
    fn period(transport: &mut T) -> TransportResult<f64> {
        let siz: u32 = transport.read(CFG_SIZ)?;
        Ok((u64::from(siz) + 1) as f64)
    }

    /// Output gain in `[-1, 1]`
    /// # Errors
    /// Returns an error on bad transport or if `gain` is out of range
    pub fn set_amplitude(&self, gain: f64) -> Result<(), Error> {
        check_unit("amplitude", gain).map_err(reject)?;
        let raw = encode(gain, AMPLITUDE).map_err(|e| reject(e.of("amplitude")))?;
        lock(&self.transport)?.write(CFG_MUL, &raw)?;
        debug!(raw, "cfg_mul");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn amplitude(&self) -> Result<f64, Error> {
        let raw: i32 = lock(&self.transport)?.read(CFG_MUL)?;
        Ok(decode(raw, AMPLITUDE))
    }

    /// DC offset added after the gain, in `[-1, 1]`
    /// # Errors
    /// Returns an error on bad transport or if `offset` is out of range
    pub fn set_offset(&self, offset: f64) -> Result<(), Error> {
        check_unit("offset", offset).map_err(reject)?;
        let raw = encode(offset, SAMPLE).map_err(|e| reject(e.of("offset")))?;
        lock(&self.transport)?.write(CFG_SUM, &raw)?;
        debug!(raw, "cfg_sum");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn offset(&self) -> Result<f64, Error> {
        let raw: i32 = lock(&self.transport)?.read(CFG_SUM)?;
        Ok(decode(raw, SAMPLE))
    }

    /// Set the repetition frequency of the table in Hz, rounded to the nearest step the counter
    /// can represent. Load the waveform first, the step depends on the table size.
    /// # Errors
    /// Returns an error on bad transport, if `hz` isn't strictly between 0 and `FS/2` or if it is
    /// too low to be represented for the current table size
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set_frequency(&self, hz: f64) -> Result<(), Error> {
        let nyquist = FS / 2.0;
        if !(hz > 0.0 && hz < nyquist) {
            return Err(reject(RangeError {
                name: "frequency",
                value: hz,
                domain: Domain::Nyquist(nyquist),
            }));
        }
        let mut transport = lock(&self.transport)?;
        let period = Self::period(&mut transport)?;
        let step = (period * hz / FS).round();
        if step < 1.0 {
            return Err(reject(RangeError {
                name: "frequency",
                value: hz,
                domain: Domain::AtLeast(0.5 * FS / period),
            }));
        }
        let raw = step as u32 - 1;
        transport.write(CFG_STP, &raw)?;
        debug!(raw, "cfg_stp");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn frequency(&self) -> Result<f64, Error> {
        let mut transport = lock(&self.transport)?;
        let period = Self::period(&mut transport)?;
        let stp: u32 = transport.read(CFG_STP)?;
        Ok((f64::from(stp) + 1.0) / period * FS)
    }

    /// Set the starting phase in degrees, any value wraps into `[0, 360)`
    /// # Errors
    /// Returns an error on bad transport or a non-finite angle
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set_phase(&self, degrees: f64) -> Result<(), Error> {
        if !degrees.is_finite() {
            return Err(reject(RangeError {
                name: "phase",
                value: degrees,
                domain: Domain::Finite,
            }));
        }
        let mut transport = lock(&self.transport)?;
        let period = Self::period(&mut transport)?;
        // rem_euclid rounds tiny negative angles up to exactly 360
        let mut turns = degrees.rem_euclid(360.0) / 360.0;
        if turns >= 1.0 {
            turns = 0.0;
        }
        let raw = (period * turns) as u32;
        transport.write(CFG_OFF, &raw)?;
        debug!(raw, "cfg_off");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn phase(&self) -> Result<f64, Error> {
        let mut transport = lock(&self.transport)?;
        let period = Self::period(&mut transport)?;
        let off: u32 = transport.read(CFG_OFF)?;
        Ok(f64::from(off) / period * 360.0)
    }

    /// Load one period of normalized samples into the table and size the counter to it.
    /// Nothing is written unless every sample is in `[-1, 1]` and the table fits.
    /// # Errors
    /// Returns an error on bad transport, an empty or oversized table, or an out of range sample
    #[allow(clippy::cast_precision_loss)]
    pub fn set_waveform(&self, samples: &[f64]) -> Result<(), Error> {
        let too_long = || {
            reject(RangeError {
                name: "waveform length",
                value: samples.len() as f64,
                domain: Domain::Closed {
                    min: 1.0,
                    max: N as f64,
                },
            })
        };
        if samples.is_empty() || samples.len() > N {
            return Err(too_long());
        }
        let siz = size_field(samples.len()).ok_or_else(too_long)?;
        let raw = samples
            .iter()
            .map(|&v| check_unit("waveform sample", v).and_then(|v| encode(v, SAMPLE)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(reject)?;
        self.buffer.write(&raw)?;
        lock(&self.transport)?.write(CFG_SIZ, &siz)?;
        debug!(len = samples.len(), siz, "cfg_siz");
        Ok(())
    }

    /// The normalized table contents, as long as the current size field says
    /// # Errors
    /// Returns an error on bad transport
    pub fn waveform(&self) -> Result<Vec<f64>, Error> {
        let siz: u32 = lock(&self.transport)?.read(CFG_SIZ)?;
        let len = table_len(siz).min(N);
        let raw = self.buffer.read_window(0, len)?;
        Ok(raw.into_iter().map(|r| decode(r, SAMPLE)).collect())
    }

    /// Configure burst playback. The lengths are in samples and, like the count, are passed to the
    /// hardware as is.
    /// # Errors
    /// Returns an error on bad transport
    pub fn set_burst(
        &self,
        mode: BurstMode,
        data_len: u32,
        period_len: u32,
        repetitions: u32,
    ) -> Result<(), Error> {
        let mut transport = lock(&self.transport)?;
        transport.write_reg(&BurstControl { mode })?;
        transport.write(CFG_BDL, &data_len)?;
        transport.write(CFG_BLN, &period_len)?;
        transport.write(CFG_BNM, &repetitions)?;
        debug!(%mode, data_len, period_len, repetitions, "Burst");
        Ok(())
    }

    /// Select the burst mode by name (`continuous`, `finite` or `infinite`)
    /// # Errors
    /// Returns an error on bad transport or an unknown name
    pub fn set_burst_mode(&self, mode: &str) -> Result<(), Error> {
        let mode: BurstMode = mode.parse().map_err(reject)?;
        lock(&self.transport)?.write_reg(&BurstControl { mode })?;
        debug!(%mode, "cfg_bmd");
        Ok(())
    }

    /// Samples played per burst
    /// # Errors
    /// Returns an error on bad transport
    pub fn set_burst_data_len(&self, len: u32) -> Result<(), Error> {
        lock(&self.transport)?.write(CFG_BDL, &len)?;
        debug!(raw = len, "cfg_bdl");
        Ok(())
    }

    /// Samples per burst period, data plus idle
    /// # Errors
    /// Returns an error on bad transport
    pub fn set_burst_period_len(&self, len: u32) -> Result<(), Error> {
        lock(&self.transport)?.write(CFG_BLN, &len)?;
        debug!(raw = len, "cfg_bln");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn set_burst_repetitions(&self, count: u32) -> Result<(), Error> {
        lock(&self.transport)?.write(CFG_BNM, &count)?;
        debug!(raw = count, "cfg_bnm");
        Ok(())
    }

    /// # Errors
    /// Returns an error on bad transport or if the mode field holds an unused pattern
    pub fn burst_mode(&self) -> Result<BurstMode, Error> {
        let ctl: BurstControl = lock(&self.transport)?.read_reg()?;
        Ok(ctl.mode)
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn burst_data_len(&self) -> Result<u32, Error> {
        Ok(lock(&self.transport)?.read(CFG_BDL)?)
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn burst_period_len(&self) -> Result<u32, Error> {
        Ok(lock(&self.transport)?.read(CFG_BLN)?)
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn burst_repetitions(&self) -> Result<u32, Error> {
        Ok(lock(&self.transport)?.read(CFG_BNM)?)
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn burst_status(&self) -> Result<BurstStatus, Error> {
        let mut transport = lock(&self.transport)?;
        Ok(BurstStatus {
            position: transport.read(STS_BLN)?,
            count: transport.read(STS_BNM)?,
        })
    }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        peripherals::Offset,
        transport::{
            mock::Mock,
            Error as TransportError,
        },
    };
    use approx::assert_abs_diff_eq;
    use paste::paste;

    fn asg() -> Generator<Mock> {
        Generator::new(Mock::new())
    }

    fn raw(asg: &Generator<Mock>, offset: usize) -> u32 {
        asg.transport.lock().unwrap().read_word(offset).unwrap()
    }

    #[test]
    fn test_amplitude() {
        let asg = asg();
        asg.set_amplitude(1.0).unwrap();
        assert_eq!(raw(&asg, CFG_MUL), 4096);
        asg.set_amplitude(-0.5).unwrap();
        assert_eq!(raw(&asg, CFG_MUL), (-2048i32) as u32);
        assert_abs_diff_eq!(asg.amplitude().unwrap(), -0.5);
        assert!(matches!(asg.set_amplitude(1.01), Err(Error::Range(_))));
        assert_abs_diff_eq!(asg.amplitude().unwrap(), -0.5);
    }

    #[test]
    fn test_offset() {
        let asg = asg();
        asg.set_offset(-1.0).unwrap();
        assert_eq!(raw(&asg, CFG_SUM), (-8191i32) as u32);
        assert_abs_diff_eq!(asg.offset().unwrap(), -1.0);
        let err = asg.set_offset(f64::NAN).unwrap_err();
        assert!(matches!(err, Error::Range(RangeError { name: "offset", .. })));
    }

    #[test]
    fn test_waveform() {
        let asg = asg();
        asg.set_waveform(&[0.0, 0.5, 1.0, -1.0]).unwrap();
        assert_eq!(raw(&asg, CFG_SIZ), (4 << 16) - 1);
        let table = asg.buffer.read_window(0, 4).unwrap();
        assert_eq!(table, vec![0, 4095, 8191, -8191]);
        let back = asg.waveform().unwrap();
        assert_eq!(back.len(), 4);
        assert_abs_diff_eq!(back[2], 1.0);
        assert_abs_diff_eq!(back[3], -1.0);
    }

    #[test]
    fn test_full_waveform() {
        let asg = asg();
        asg.set_waveform(&vec![0.25; N]).unwrap();
        assert_eq!(raw(&asg, CFG_SIZ), (1 << 30) - 1);
        assert_eq!(asg.waveform().unwrap().len(), N);
    }

    #[test]
    fn test_oversized_waveform_writes_nothing() {
        let asg = asg();
        asg.transport.lock().unwrap().clear_writes();
        let err = asg.set_waveform(&vec![0.0; N + 1]).unwrap_err();
        assert!(matches!(err, Error::Range(_)));
        assert!(asg.set_waveform(&[]).is_err());
        assert!(asg.transport.lock().unwrap().writes().is_empty());
        assert_eq!(raw(&asg, CFG_SIZ), 0);
    }

    #[test]
    fn test_bad_sample_writes_nothing() {
        let asg = Generator::new(Mock::new().with_table(&[1, 2, 3]));
        let err = asg.set_waveform(&[0.1, 0.2, 1.5]).unwrap_err();
        assert!(matches!(
            err,
            Error::Range(RangeError {
                name: "waveform sample",
                ..
            })
        ));
        assert_eq!(asg.buffer.read_window(0, 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(raw(&asg, CFG_SIZ), 0);
    }

    #[test]
    fn test_frequency() {
        let asg = asg();
        asg.set_waveform(&vec![0.0; 1000]).unwrap();
        // period = 1000 << 16, step = period * 1 MHz / 125 MHz = 524288
        asg.set_frequency(1e6).unwrap();
        assert_eq!(raw(&asg, CFG_STP), 524_287);
        assert_abs_diff_eq!(asg.frequency().unwrap(), 1e6, epsilon = 1e-6);
    }

    #[test]
    fn test_frequency_bounds() {
        let asg = asg();
        asg.set_waveform(&vec![0.0; N]).unwrap();
        for hz in [FS / 2.0, FS, 0.0, -1.0, f64::NAN] {
            let err = asg.set_frequency(hz).unwrap_err();
            assert!(matches!(
                err,
                Error::Range(RangeError {
                    domain: Domain::Nyquist(_),
                    ..
                })
            ));
        }
        asg.set_frequency(FS / 2.0 - 1.0).unwrap();
        // Far below one counter step per table
        assert!(matches!(
            asg.set_frequency(1e-3),
            Err(Error::Range(RangeError {
                domain: Domain::AtLeast(_),
                ..
            }))
        ));
    }

    #[test]
    fn test_phase() {
        let asg = asg();
        asg.set_waveform(&vec![0.0; 1024]).unwrap();
        asg.set_phase(90.0).unwrap();
        assert_eq!(raw(&asg, CFG_OFF), 1 << 24);
        assert_abs_diff_eq!(asg.phase().unwrap(), 90.0);
        asg.set_phase(-90.0).unwrap();
        assert_abs_diff_eq!(asg.phase().unwrap(), 270.0);
        asg.set_phase(720.0).unwrap();
        assert_eq!(raw(&asg, CFG_OFF), 0);
    }

    #[test]
    fn test_phase_stays_below_a_full_turn() {
        let asg = asg();
        asg.set_waveform(&vec![0.0; 1024]).unwrap();
        asg.set_phase(-1e-20).unwrap();
        assert_eq!(raw(&asg, CFG_OFF), 0);
        assert_abs_diff_eq!(asg.phase().unwrap(), 0.0);
        asg.set_phase(-90.0).unwrap();
        assert!(raw(&asg, CFG_OFF) < 1 << 26);
    }

    #[test]
    fn test_phase_rejects_non_finite() {
        let asg = asg();
        for degrees in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            match asg.set_phase(degrees).unwrap_err() {
                Error::Range(e) => {
                    assert_eq!(e.domain, Domain::Finite);
                    assert!(e.to_string().ends_with("outside of the finite numbers"));
                }
                e => panic!("unexpected {e:?}"),
            }
        }
        assert_eq!(raw(&asg, CFG_OFF), 0);
    }

    macro_rules! test_burst_mode {
        ($mode:ident, $name:ident, $bits:literal) => {
            paste! {
                #[test]
                fn [<test_burst_mode_$name>]() {
                    let asg = asg();
                    asg.set_burst_mode(stringify!($name)).unwrap();
                    assert_eq!(raw(&asg, BurstControl::OFFSET), $bits);
                    assert_eq!(asg.burst_mode().unwrap(), BurstMode::$mode);
                    assert_eq!(BurstMode::$mode.to_string(), stringify!($name));
                }
            }
        };
    }

    test_burst_mode!(Continuous, continuous, 0b00);
    test_burst_mode!(Finite, finite, 0b01);
    test_burst_mode!(Infinite, infinite, 0b11);

    #[test]
    fn test_burst_mode_rejects_unknown() {
        let asg = asg();
        assert!(matches!(
            asg.set_burst_mode("burst"),
            Err(Error::InvalidArgument(InvalidArgument::BurstMode(_)))
        ));
        // The unused pattern doesn't decode to any mode
        let asg = Generator::new(Mock::new().with_register(BurstControl::OFFSET, 0b10));
        assert!(matches!(
            asg.burst_mode(),
            Err(Error::Transport(TransportError::Packing(_)))
        ));
    }

    #[test]
    fn test_set_burst() {
        let asg = asg();
        asg.set_burst(BurstMode::Finite, 100, 250, 5).unwrap();
        assert_eq!(asg.burst_mode().unwrap(), BurstMode::Finite);
        assert_eq!(asg.burst_data_len().unwrap(), 100);
        assert_eq!(asg.burst_period_len().unwrap(), 250);
        assert_eq!(asg.burst_repetitions().unwrap(), 5);
        // Raw values go through unchecked
        asg.set_burst(BurstMode::Infinite, 0, u32::MAX, 0).unwrap();
        assert_eq!(raw(&asg, CFG_BLN), u32::MAX);
    }

    #[test]
    fn test_burst_fields_are_independent() {
        let asg = Generator::new(Mock::new().with_register(BurstControl::OFFSET, 0b10));
        asg.set_burst_data_len(64).unwrap();
        asg.set_burst_period_len(128).unwrap();
        asg.set_burst_repetitions(7).unwrap();
        assert_eq!(asg.burst_data_len().unwrap(), 64);
        assert_eq!(asg.burst_period_len().unwrap(), 128);
        assert_eq!(asg.burst_repetitions().unwrap(), 7);
        assert_eq!(raw(&asg, BurstControl::OFFSET), 0b10);
    }

    #[test]
    fn test_burst_status() {
        let mock = Mock::new()
            .with_register(STS_BLN, 42)
            .with_register(STS_BNM, 3);
        let asg = Generator::new(mock);
        assert_eq!(
            asg.burst_status().unwrap(),
            BurstStatus {
                position: 42,
                count: 3
            }
        );
    }

    #[test]
    fn test_trigger_mask_and_dump() {
        let asg = asg();
        asg.set_trigger_mask(0b10).unwrap();
        assert_eq!(asg.trigger_mask().unwrap(), 0b10);
        let dump = asg.dump().unwrap();
        assert_eq!(dump.len(), REGISTERS.len());
        assert!(dump.contains(&("cfg_trg", 0b10)));
    }
}
