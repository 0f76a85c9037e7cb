// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Opening block devices safely
//!
//! [`BlockDevice::open`] honours an [`Options`] value: an optional
//! non-blocking exclusive `flock`, the `open(2)` mode, and optional creation
//! of an empty GPT on devices that carry no partition table at all.

use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};

use disks::Disk;
use log::{debug, info, warn};
use nix::{
    errno::Errno,
    fcntl::{Flock, FlockArg, OFlag},
};
use thiserror::Error;

pub use gpt;

mod blkdev;

mod options;
pub use options::*;

pub mod table;
pub use table::TableKind;

/// Errors that can occur while opening a block device
#[derive(Error, Debug)]
pub enum Error {
    /// IO operation error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// GPT-specific error
    #[error("GPT error: {0}")]
    Gpt(#[from] gpt::GptError),
    /// Protective MBR error
    #[error("MBR error: {0}")]
    Mbr(#[from] gpt::mbr::MBRError),
    /// Another holder owns the exclusive lock
    #[error("{} is locked by another holder", .0.display())]
    Locked(PathBuf),
    /// The requested open mode is not usable
    #[error("invalid open mode {0:#o}")]
    InvalidMode(i32),
    /// Partition table creation was requested on a handle that can't read and write
    #[error("creating a partition table requires read-write mode")]
    ReadWriteRequired,
    /// A partition table appeared where none was expected
    #[error("refusing to create GPT on {}: found existing {found} partition table", path.display())]
    GptConflict { path: PathBuf, found: TableKind },
    /// The disk record carries no device path to open
    #[error("disk {0} has no device path")]
    NoDeviceName(String),
}

#[derive(Debug)]
enum Handle {
    Plain(File),
    // The lock belongs to the open file description and goes away with it
    Locked(Flock<File>),
}

impl Handle {
    fn file(&self) -> &File {
        match self {
            Handle::Plain(file) => file,
            Handle::Locked(lock) => &**lock,
        }
    }

    fn file_mut(&mut self) -> &mut File {
        match self {
            Handle::Plain(file) => file,
            Handle::Locked(lock) => &mut **lock,
        }
    }
}

/// An open block device (or disk image).
///
/// If opened with an exclusive lock, the lock is held until [`close`](Self::close)
/// or drop.
#[derive(Debug)]
pub struct BlockDevice {
    path: PathBuf,
    handle: Handle,
}

impl BlockDevice {
    /// Opens the device at `path` according to `options`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidMode`] if the mode is unusable, before anything is opened
    /// * [`Error::ReadWriteRequired`] if GPT creation is requested without `O_RDWR`
    /// * [`Error::Locked`] if an exclusive lock was requested and is held elsewhere
    pub fn open(path: impl AsRef<Path>, options: &Options) -> Result<Self, Error> {
        let path = path.as_ref();
        let flags = options.flags()?;
        let (read, write) = (Options::readable(flags), Options::writable(flags));
        if options.create_gpt && !(read && write) {
            return Err(Error::ReadWriteRequired);
        }

        debug!("Opening {} with {:?}", path.display(), options);
        let file = OpenOptions::new()
            .read(read)
            .write(write)
            .custom_flags(flags.difference(OFlag::O_ACCMODE).bits())
            .open(path)?;

        let handle = if options.exclusive_lock {
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(lock) => Handle::Locked(lock),
                Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                    debug!("{} is locked elsewhere", path.display());
                    return Err(Error::Locked(path.to_owned()));
                }
                Err((_, errno)) => return Err(io::Error::from(errno).into()),
            }
        } else {
            Handle::Plain(file)
        };

        let mut device = Self {
            path: path.to_owned(),
            handle,
        };
        info!(
            "Opened {}{}",
            path.display(),
            if device.is_locked() { " (exclusive)" } else { "" }
        );

        // Any failure from here drops the handle, and the lock with it
        if options.create_gpt {
            device.ensure_gpt()?;
        }

        Ok(device)
    }

    /// Returns the path this device was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the underlying file
    pub fn file(&self) -> &File {
        self.handle.file()
    }

    /// Whether this handle holds the exclusive lock
    pub fn is_locked(&self) -> bool {
        matches!(self.handle, Handle::Locked(_))
    }

    /// Returns the size of the device in bytes
    pub fn size(&self) -> Result<u64, Error> {
        Ok(blkdev::size(self.file())?)
    }

    /// Probes the device for an existing partition table
    pub fn partition_table(&self) -> Result<Option<TableKind>, Error> {
        Ok(table::probe(&mut self.file())?)
    }

    /// Creates an empty GPT unless some partition table is already present
    fn ensure_gpt(&mut self) -> Result<(), Error> {
        if let Some(kind) = self.partition_table()? {
            info!(
                "{} already has a {kind} partition table, leaving it untouched",
                self.path.display()
            );
            return Ok(());
        }

        let size = self.size()?;
        let sector_size = blkdev::sector_size(self.file())?;
        table::create_gpt(self.handle.file_mut(), size, sector_size, &self.path)?;
        self.file().sync_all()?;

        if let Err(e) = blkdev::reread_partitions(self.file()) {
            warn!("Failed to re-read partitions on {}: {}", self.path.display(), e);
        }

        Ok(())
    }

    /// Closes the device, releasing the lock if held.
    pub fn close(self) -> Result<(), Error> {
        debug!("Closing {}", self.path.display());
        match self.handle {
            Handle::Locked(lock) => {
                let file = lock.unlock().map_err(|(_, errno)| io::Error::from(errno))?;
                drop(file);
            }
            Handle::Plain(file) => drop(file),
        }
        Ok(())
    }
}

/// Opens the device node of a discovered disk.
pub fn open_disk(disk: &Disk, options: &Options) -> Result<BlockDevice, Error> {
    let device = disk
        .device_name()
        .ok_or_else(|| Error::NoDeviceName(disk.to_string()))?;
    BlockDevice::open(device, options)
}
