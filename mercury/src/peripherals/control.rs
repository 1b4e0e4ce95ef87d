//! The reset/start/stop/trigger state machine shared by both peripherals

use super::Offset;
use crate::transport::{
    lock,
    upgrade,
    Transport,
    TransportResult,
};
use mercury_derive::{
    offset,
    RegisterSerde,
};
use packed_struct::prelude::*;
use std::sync::{
    Arc,
    Mutex,
    Weak,
};
use tracing::trace;

/// The control/status word. Writing latches commands, reading reports the current state.
///
/// Bits are numbered msb0 over the big-endian word, so bit 31 here is register bit 0.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PackedStruct, RegisterSerde)]
#[offset(0x00)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct Control {
    /// RST
    #[packed_field(bits = "31")]
    pub reset: bool,
    /// SWT
    #[packed_field(bits = "30")]
    pub software_trigger: bool,
    /// STA, reads back as running
    #[packed_field(bits = "29")]
    pub start: bool,
    /// STO, reads back as stopped
    #[packed_field(bits = "28")]
    pub stop: bool,
}

/// Drives the peripheral's state machine through its control/status register
#[derive(Debug)]
pub struct TriggerController<T> {
    /// Upwards pointer to the parent peripheral's transport
    transport: Weak<Mutex<T>>,
}

impl<T> TriggerController<T>
where
    T: Transport,
{
    #[must_use]
    pub fn new(transport: &Arc<Mutex<T>>) -> Self {
        Self {
            transport: Arc::downgrade(transport),
        }
    }

    fn command(&self, command: &'static str, word: Control) -> TransportResult<()> {
        let tarc = upgrade(&self.transport)?;
        let mut transport = lock(&tarc)?;
        trace!(command, "State machine command");
        transport.write_reg(&word)
    }

    /// Return the state machine to idle
    /// # Errors
    /// Returns an error on bad transport
    pub fn reset(&self) -> TransportResult<()> {
        self.command(
            "reset",
            Control {
                reset: true,
                ..Default::default()
            },
        )
    }

    /// Arm the peripheral
    /// # Errors
    /// Returns an error on bad transport
    pub fn start(&self) -> TransportResult<()> {
        self.command(
            "start",
            Control {
                start: true,
                ..Default::default()
            },
        )
    }

    /// Request a stop. Completion is reported later through [`Self::is_stopped`].
    /// # Errors
    /// Returns an error on bad transport
    pub fn stop(&self) -> TransportResult<()> {
        self.command(
            "stop",
            Control {
                stop: true,
                ..Default::default()
            },
        )
    }

    /// Fire a trigger from software, only effective if software triggers are unmasked
    /// # Errors
    /// Returns an error on bad transport
    pub fn software_trigger(&self) -> TransportResult<()> {
        self.command(
            "software_trigger",
            Control {
                software_trigger: true,
                ..Default::default()
            },
        )
    }

    /// The raw status word, read fresh from hardware
    /// # Errors
    /// Returns an error on bad transport
    pub fn status(&self) -> TransportResult<u32> {
        let tarc = upgrade(&self.transport)?;
        let mut transport = lock(&tarc)?;
        transport.read_word(Control::OFFSET)
    }

    /// The status word decoded into its bits
    /// # Errors
    /// Returns an error on bad transport
    pub fn state(&self) -> TransportResult<Control> {
        let tarc = upgrade(&self.transport)?;
        let mut transport = lock(&tarc)?;
        transport.read_reg()
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn is_running(&self) -> TransportResult<bool> {
        Ok(self.state()?.start)
    }

    /// # Errors
    /// Returns an error on bad transport
    pub fn is_stopped(&self) -> TransportResult<bool> {
        Ok(self.state()?.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{
        mock::Mock,
        Error,
    };

    fn controller(mock: Mock) -> (Arc<Mutex<Mock>>, TriggerController<Mock>) {
        let transport = Arc::new(Mutex::new(mock));
        let ctl = TriggerController::new(&transport);
        (transport, ctl)
    }

    #[test]
    fn test_control_layout() {
        let word = Control {
            stop: true,
            ..Default::default()
        };
        assert_eq!(crate::transport::Serialize::serialize(&word), 0b1000);
        assert_eq!(Control::OFFSET, 0);
    }

    #[test]
    fn test_commands_write_single_bits() {
        let (transport, ctl) = controller(Mock::new());
        ctl.reset().unwrap();
        ctl.software_trigger().unwrap();
        ctl.start().unwrap();
        ctl.stop().unwrap();
        assert_eq!(
            transport.lock().unwrap().writes(),
            &[(0, 0b0001), (0, 0b0010), (0, 0b0100), (0, 0b1000)]
        );
    }

    #[test]
    fn test_stop_is_observed_eventually() {
        let (_transport, ctl) = controller(Mock::new().with_stop_latency(4));
        ctl.start().unwrap();
        assert!(ctl.is_running().unwrap());
        ctl.stop().unwrap();
        let mut polls = 0;
        while !ctl.is_stopped().unwrap() {
            polls += 1;
            assert!(polls < 100, "stop never completed");
        }
        assert_eq!(polls, 4);
        assert_eq!(ctl.status().unwrap(), 0b1000);
        assert!(!ctl.is_running().unwrap());
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let (_transport, ctl) = controller(Mock::new());
        ctl.start().unwrap();
        ctl.reset().unwrap();
        assert_eq!(ctl.state().unwrap(), Control::default());
    }

    #[test]
    fn test_detached() {
        let (transport, ctl) = controller(Mock::new());
        drop(transport);
        assert!(matches!(ctl.start(), Err(Error::Detached)));
    }
}
