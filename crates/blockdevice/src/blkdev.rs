// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Block device ioctls

use std::{fs::File, io, os::fd::AsRawFd, os::unix::fs::FileTypeExt};

use linux_raw_sys::ioctl::{BLKGETSIZE64, BLKRRPART, BLKSSZGET};
use log::{debug, error};
use nix::libc;

/// Returns the size in bytes of a block device or regular file
///
/// # Arguments
/// * `file` - Open handle to the device
///
/// # Returns
/// `io::Result<u64>` with the size, via `BLKGETSIZE64` for block devices
pub(crate) fn size(file: &File) -> io::Result<u64> {
    let metadata = file.metadata()?;
    if !metadata.file_type().is_block_device() {
        return Ok(metadata.len());
    }

    let mut size: u64 = 0;
    let res = unsafe { libc::ioctl(file.as_raw_fd(), BLKGETSIZE64 as _, &mut size) };
    if res < 0 {
        let err = io::Error::last_os_error();
        error!("Failed to query device size: {}", err);
        return Err(err);
    }
    Ok(size)
}

/// Logical sector size assumed for regular files
pub(crate) const DEFAULT_SECTOR_SIZE: u64 = 512;

/// Returns the logical sector size of a block device, via `BLKSSZGET`
///
/// Regular files report [`DEFAULT_SECTOR_SIZE`].
pub(crate) fn sector_size(file: &File) -> io::Result<u64> {
    if !file.metadata()?.file_type().is_block_device() {
        return Ok(DEFAULT_SECTOR_SIZE);
    }

    let mut sector_size: libc::c_int = 0;
    let res = unsafe { libc::ioctl(file.as_raw_fd(), BLKSSZGET as _, &mut sector_size) };
    if res < 0 {
        let err = io::Error::last_os_error();
        error!("Failed to query logical sector size: {}", err);
        return Err(err);
    }
    u64::try_from(sector_size).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative sector size"))
}

/// Asks the kernel to re-read the partition table of a block device
///
/// Regular files are left alone.
///
/// # Returns
/// `io::Result<()>` indicating success or failure
pub(crate) fn reread_partitions(file: &File) -> io::Result<()> {
    if !file.metadata()?.file_type().is_block_device() {
        return Ok(());
    }

    debug!("Requesting partition table re-read");
    let res = unsafe { libc::ioctl(file.as_raw_fd(), BLKRRPART as _) };
    if res < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
