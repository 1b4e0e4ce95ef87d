//! Defines the register/buffer access that every mercury transport must implement

pub mod local;
pub mod mock;

use std::{
    path::PathBuf,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        Weak,
    },
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Opening {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Locking {path:?}, is another process driving this peripheral?")]
    Lock {
        path: PathBuf,
        #[source]
        source: nix::errno::Errno,
    },
    #[error("Mapping ({region}) {path:?}")]
    Map {
        path: PathBuf,
        region: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Offset {offset:#x} is outside of the {len:#x} byte {region}")]
    OutOfBounds {
        region: &'static str,
        offset: usize,
        len: usize,
    },
    #[error("Register offset {0:#x} is not word aligned")]
    Misaligned(usize),
    #[error("Register word could not be decoded")]
    Packing(#[from] packed_struct::PackingError),
    #[error("The owning controller has been dropped")]
    Detached,
    #[error("The transport lock was poisoned")]
    Poisoned,
}

pub type TransportResult<T> = Result<T, Error>;

/// Types that implement this trait can be written to a 32-bit register
pub trait Serialize {
    fn serialize(&self) -> u32;
}

/// Types that implement this trait can be read from a 32-bit register
pub trait Deserialize: Sized {
    fn deserialize(word: u32) -> TransportResult<Self>;
}

impl Serialize for u32 {
    fn serialize(&self) -> u32 {
        *self
    }
}

impl Deserialize for u32 {
    fn deserialize(word: u32) -> TransportResult<Self> {
        Ok(word)
    }
}

impl Serialize for i32 {
    fn serialize(&self) -> u32 {
        u32::from_ne_bytes(self.to_ne_bytes())
    }
}

impl Deserialize for i32 {
    fn deserialize(word: u32) -> TransportResult<Self> {
        Ok(i32::from_ne_bytes(word.to_ne_bytes()))
    }
}

impl Serialize for bool {
    fn serialize(&self) -> u32 {
        u32::from(*self)
    }
}

impl Deserialize for bool {
    fn deserialize(word: u32) -> TransportResult<Self> {
        Ok(word != 0)
    }
}

/// The trait that is implemented for mercury transport mechanisms.
/// The methods of this trait *assume* the device is already opened, locked and mapped.
pub trait Transport {
    /// Read the 32-bit word at byte offset `offset` of the register page
    fn read_word(&mut self, offset: usize) -> TransportResult<u32>;

    /// Write the 32-bit word at byte offset `offset` of the register page
    fn write_word(&mut self, offset: usize, word: u32) -> TransportResult<()>;

    /// Number of 32-bit slots in the sample buffer
    fn slots(&self) -> usize;

    /// Read the sample buffer slot `index`
    fn read_slot(&mut self, index: usize) -> TransportResult<i32>;

    /// Write the sample buffer slot `index`
    fn write_slot(&mut self, index: usize, value: i32) -> TransportResult<()>;

    /// Generically read a [`Deserialize`] type `T` from byte offset `offset`. # Example
    /// ```
    /// # use mercury::transport::{mock::Mock, Transport};
    /// let mut transport = Mock::new();
    /// let word: u32 = transport.read(0x04).unwrap();
    /// ```
    fn read<T>(&mut self, offset: usize) -> TransportResult<T>
    where
        T: Deserialize,
    {
        T::deserialize(self.read_word(offset)?)
    }

    /// Generically write a [`Serialize`] type `T` to byte offset `offset`. # Example
    /// ```
    /// # use mercury::transport::{mock::Mock, Transport};
    /// let mut transport = Mock::new();
    /// transport.write(0x38, &-4096i32).unwrap();
    /// ```
    fn write<T>(&mut self, offset: usize, data: &T) -> TransportResult<()>
    where
        T: Serialize,
    {
        self.write_word(offset, data.serialize())
    }

    /// Read a register layout from the offset it is bound to
    fn read_reg<R>(&mut self) -> TransportResult<R>
    where
        R: Deserialize + crate::peripherals::Offset,
    {
        self.read(R::OFFSET)
    }

    /// Write a register layout to the offset it is bound to
    fn write_reg<R>(&mut self, reg: &R) -> TransportResult<()>
    where
        R: Serialize + crate::peripherals::Offset,
    {
        self.write(R::OFFSET, reg)
    }

    /// Read a 64-bit counter stored as two consecutive words, low word first
    fn read_u64(&mut self, offset: usize) -> TransportResult<u64> {
        let lo = self.read_word(offset)?;
        let hi = self.read_word(offset + 4)?;
        Ok((u64::from(hi) << 32) | u64::from(lo))
    }

    /// Read `n` consecutive buffer slots starting at `start`
    fn read_slots(&mut self, start: usize, n: usize) -> TransportResult<Vec<i32>> {
        (start..start + n).map(|i| self.read_slot(i)).collect()
    }

    /// Write `data` into consecutive buffer slots starting at `start`
    fn write_slots(&mut self, start: usize, data: &[i32]) -> TransportResult<()> {
        for (i, v) in data.iter().enumerate() {
            self.write_slot(start + i, *v)?;
        }
        Ok(())
    }
}

/// Check that a register access of one word at `offset` fits in a `len` byte page
pub(crate) fn check_word(offset: usize, len: usize) -> TransportResult<()> {
    if offset % 4 != 0 {
        return Err(Error::Misaligned(offset));
    }
    if offset + 4 > len {
        return Err(Error::OutOfBounds {
            region: "register page",
            offset,
            len,
        });
    }
    Ok(())
}

/// Check that `index` addresses one of `slots` buffer slots
pub(crate) fn check_slot(index: usize, slots: usize) -> TransportResult<()> {
    if index >= slots {
        return Err(Error::OutOfBounds {
            region: "sample buffer",
            offset: index * 4,
            len: slots * 4,
        });
    }
    Ok(())
}

/// Lock the transport owned by a controller
pub(crate) fn lock<T>(transport: &Arc<Mutex<T>>) -> TransportResult<MutexGuard<'_, T>> {
    transport.lock().map_err(|_| Error::Poisoned)
}

/// Follow a sub-block's upwards pointer back to its transport
pub(crate) fn upgrade<T>(transport: &Weak<Mutex<T>>) -> TransportResult<Arc<Mutex<T>>> {
    transport.upgrade().ok_or(Error::Detached)
}
