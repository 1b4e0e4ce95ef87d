//! "Local" transport where the FPGA peripheral is exported as a UIO device node
//!
//! The node is opened synchronously, locked exclusively (without blocking) and mapped twice: the
//! first page holds the register bank and the sample buffer follows it at the next page boundary.

use super::{
    check_slot,
    check_word,
    Error,
    Transport,
    TransportResult,
};
use crate::core::{
    Peripheral,
    DEFAULT_UIO_PREFIX,
    N,
};
use memmap2::{
    MmapMut,
    MmapOptions,
};
use nix::{
    fcntl::{
        flock,
        FlockArg,
    },
    libc::O_SYNC,
    unistd::{
        sysconf,
        SysconfVar,
    },
};
use std::{
    fs::File,
    os::unix::{
        fs::OpenOptionsExt,
        io::AsRawFd,
    },
    path::{
        Path,
        PathBuf,
    },
};
use tracing::info;

const FALLBACK_PAGE_SIZE: usize = 4096;

fn page_size() -> usize {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) => usize::try_from(size).unwrap_or(FALLBACK_PAGE_SIZE),
        _ => FALLBACK_PAGE_SIZE,
    }
}

#[derive(Debug)]
/// An exclusive connection to one peripheral through its UIO node
pub struct Local {
    /// The register page
    regs: MmapMut,
    /// The sample buffer
    table: MmapMut,
    /// Holds the advisory lock until it is closed, after both mappings are gone
    file: File,
    path: PathBuf,
}

impl Local {
    /// Open instance `index` of `peripheral` under the default UIO prefix
    /// # Errors
    /// Returns an error if the node can't be opened, locked or mapped
    pub fn open(peripheral: Peripheral, index: u32) -> TransportResult<Self> {
        Self::open_with_prefix(Path::new(DEFAULT_UIO_PREFIX), peripheral, index)
    }

    /// Open instance `index` of `peripheral` with its node namespaced under `prefix`
    /// # Errors
    /// Returns an error if the node can't be opened, locked or mapped
    pub fn open_with_prefix(
        prefix: &Path,
        peripheral: Peripheral,
        index: u32,
    ) -> TransportResult<Self> {
        Self::open_path(peripheral.device_path(prefix, index))
    }

    /// Open, lock and map the device node at `path`
    ///
    /// Locking never blocks, if someone else holds the node this fails immediately.
    /// # Errors
    /// Returns an error if the node can't be opened, locked or mapped
    pub fn open_path(path: impl AsRef<Path>) -> TransportResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::options()
            .read(true)
            .write(true)
            .custom_flags(O_SYNC)
            .open(&path)
            .map_err(|source| Error::Open {
                path: path.clone(),
                source,
            })?;
        flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock).map_err(|source| {
            Error::Lock {
                path: path.clone(),
                source,
            }
        })?;
        let page = page_size();
        // Safety: the mappings are shared with the fabric and only touched through volatile
        // word accesses that are bounds checked against the mapping length
        let regs = unsafe { MmapOptions::new().len(page).map_mut(&file) }.map_err(|source| {
            Error::Map {
                path: path.clone(),
                region: "regset",
                source,
            }
        })?;
        let table = unsafe {
            MmapOptions::new()
                .offset(page as u64)
                .len(N * 4)
                .map_mut(&file)
        }
        .map_err(|source| Error::Map {
            path: path.clone(),
            region: "buffer",
            source,
        })?;
        info!(?path, page, "Opened peripheral");
        Ok(Self {
            regs,
            table,
            file,
            path,
        })
    }

    /// The device node this transport holds
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Local {
    fn drop(&mut self) {
        info!(path = ?self.path, fd = self.file.as_raw_fd(), "Releasing peripheral");
    }
}

impl Transport for Local {
    fn read_word(&mut self, offset: usize) -> TransportResult<u32> {
        check_word(offset, self.regs.len())?;
        // Safety: `check_word` guarantees an aligned word inside the mapping
        let word = unsafe { self.regs.as_ptr().add(offset).cast::<u32>().read_volatile() };
        Ok(word)
    }

    fn write_word(&mut self, offset: usize, word: u32) -> TransportResult<()> {
        check_word(offset, self.regs.len())?;
        // Safety: as above
        unsafe {
            self.regs
                .as_mut_ptr()
                .add(offset)
                .cast::<u32>()
                .write_volatile(word);
        }
        Ok(())
    }

    fn slots(&self) -> usize {
        self.table.len() / 4
    }

    fn read_slot(&mut self, index: usize) -> TransportResult<i32> {
        check_slot(index, self.slots())?;
        // Safety: `check_slot` keeps us inside the page aligned buffer mapping
        let value = unsafe {
            self.table
                .as_ptr()
                .cast::<i32>()
                .add(index)
                .read_volatile()
        };
        Ok(value)
    }

    fn write_slot(&mut self, index: usize, value: i32) -> TransportResult<()> {
        check_slot(index, self.slots())?;
        // Safety: as above
        unsafe {
            self.table
                .as_mut_ptr()
                .cast::<i32>()
                .add(index)
                .write_volatile(value);
        }
        Ok(())
    }
}
