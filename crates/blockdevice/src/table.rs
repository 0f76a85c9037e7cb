// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Partition table detection and creation
//!
//! Detection only looks at on-disk signatures: a GPT header at LBA 1 (for
//! 512 or 4096 byte sectors) or an MBR boot signature at LBA 0. Creation
//! writes an empty GPT sized to the device's logical sectors, then the
//! protective MBR.

use std::{
    fmt,
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

use gpt::{disk::LogicalBlockSize, mbr::ProtectiveMBR, GptConfig};
use log::{debug, error, info};

use crate::Error;

const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";
const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];
const MBR_SIGNATURE_OFFSET: u64 = 510;

/// Kind of partition table found on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// GUID Partition Table
    Gpt,
    /// Legacy MBR (DOS) partition table
    Mbr,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Gpt => f.write_str("gpt"),
            TableKind::Mbr => f.write_str("dos"),
        }
    }
}

/// Reads `buf.len()` bytes at `offset`, returning `false` when the device is too short
fn read_at<D: Read + Seek>(device: &mut D, offset: u64, buf: &mut [u8]) -> io::Result<bool> {
    device.seek(SeekFrom::Start(offset))?;
    match device.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Probes a device for an existing partition table signature.
pub fn probe<D: Read + Seek>(device: &mut D) -> io::Result<Option<TableKind>> {
    let mut signature = [0u8; 8];
    for sector_size in [512u64, 4096] {
        if read_at(device, sector_size, &mut signature)? && &signature == GPT_SIGNATURE {
            return Ok(Some(TableKind::Gpt));
        }
    }

    let mut boot = [0u8; 2];
    if read_at(device, MBR_SIGNATURE_OFFSET, &mut boot)? && boot == MBR_SIGNATURE {
        return Ok(Some(TableKind::Mbr));
    }

    Ok(None)
}

/// Maps a device's logical sector size onto what the GPT writer supports
fn logical_block_size(sector_size: u64) -> io::Result<LogicalBlockSize> {
    match sector_size {
        512 => Ok(LogicalBlockSize::Lb512),
        4096 => Ok(LogicalBlockSize::Lb4096),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported logical sector size {other}"),
        )),
    }
}

/// Writes a protective MBR and an empty GPT to a device of `size` bytes.
///
/// The device must carry no table; the probe is repeated here and creation
/// is refused with [`Error::GptConflict`] otherwise. The table is laid out in
/// memory before anything is written, and the first two sectors are restored
/// if a write fails, so a failed creation never leaves a signature behind.
pub(crate) fn create_gpt(file: &mut File, size: u64, sector_size: u64, path: &Path) -> Result<(), Error> {
    if let Some(kind) = probe(file)? {
        return Err(Error::GptConflict {
            path: path.to_owned(),
            found: kind,
        });
    }

    let lb = logical_block_size(sector_size)?;

    // Fails on devices too small to hold both headers, before any write
    debug!("Laying out empty GPT for {} ({sector_size} byte sectors)", path.display());
    let mut gpt_disk = GptConfig::new()
        .writable(true)
        .logical_block_size(lb)
        .create_from_device(&mut *file, None)?;

    let mut head = vec![0u8; 2 * sector_size as usize];
    let complete = read_at(gpt_disk.device_mut(), 0, &mut head)?;

    let written = (|| -> Result<(), Error> {
        gpt_disk.write_inplace()?;
        let sectors = size / sector_size;
        let lb_size = u32::try_from(sectors.saturating_sub(1)).unwrap_or(u32::MAX);
        debug!("Writing protective MBR to {} ({sectors} sectors)", path.display());
        ProtectiveMBR::with_lb_size(lb_size).overwrite_lba0(gpt_disk.device_mut())?;
        Ok(())
    })();

    if let Err(e) = written {
        error!("GPT creation on {} failed, restoring first sectors: {e}", path.display());
        if complete {
            let device = gpt_disk.device_mut();
            device.seek(SeekFrom::Start(0))?;
            device.write_all(&head)?;
        }
        return Err(e);
    }

    info!("Created empty GPT on {}", path.display());
    Ok(())
}
