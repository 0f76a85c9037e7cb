// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Disk discovery and selection
//!
//! Disks are enumerated fresh on every call, as [`Disk`] snapshots, and
//! selected with glob [`Matcher`]s over their identifying attributes.
//!
//! ```no_run
//! let disk = disks::find(&[disks::with_model("WDC*"), disks::with_bus_path("/pci0000:00/*")])?;
//! println!("{disk}");
//! # Ok::<(), disks::Error>(())
//! ```

use std::io;

use log::debug;
use thiserror::Error;

mod disk;
pub use disk::{Disk, Kind};

mod matcher;
pub use matcher::*;

pub mod mock;

mod sysfs;
pub use sysfs::Sysfs;

const SYSFS_DIR: &str = "sys/class/block";
const DEVFS_DIR: &str = "/dev";

/// Errors that can occur while discovering or selecting disks
#[derive(Debug, Error)]
pub enum Error {
    /// The enumerator could not produce a disk list
    #[error("failed to enumerate disks: {0}")]
    Enumeration(#[from] io::Error),

    /// Enumeration succeeded but no disk satisfied the matchers
    #[error("no disk matches {matchers}")]
    NotFound { matchers: String },

    /// A textual matcher could not be parsed
    #[error("invalid matcher: {0}")]
    InvalidPattern(String),
}

/// A source of disk snapshots.
///
/// Implementations yield one [`Disk`] per physical block device, skipping
/// pseudo devices, zero-length devices and devices whose model, device name
/// and subsystem can't be read. Order need not be stable across calls.
pub trait Enumerator {
    fn enumerate(&self) -> io::Result<Vec<Disk>>;
}

/// Lists every disk on the running system, in enumeration order.
pub fn list() -> Result<Vec<Disk>, Error> {
    list_with(&Sysfs::default())
}

/// Lists every disk yielded by `enumerator`, in its order.
pub fn list_with(enumerator: &impl Enumerator) -> Result<Vec<Disk>, Error> {
    Ok(enumerator.enumerate()?)
}

/// Finds the first disk on the running system satisfying `matchers`.
pub fn find(matchers: &[Matcher]) -> Result<Disk, Error> {
    find_with(&Sysfs::default(), matchers)
}

/// Finds the first disk yielded by `enumerator` satisfying `matchers`.
///
/// See [`matches`] for how the matchers combine.
pub fn find_with(enumerator: &impl Enumerator, matchers: &[Matcher]) -> Result<Disk, Error> {
    let found = list_with(enumerator)?
        .into_iter()
        .find(|disk| matches(disk, matchers));

    match found {
        Some(disk) => {
            debug!("Selected {disk} for {}", matcher::describe(matchers));
            Ok(disk)
        }
        None => Err(Error::NotFound {
            matchers: matcher::describe(matchers),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock::MockEnumerator;
    use test_log::test;

    fn pool() -> MockEnumerator {
        MockEnumerator::new([
            Disk::new("sdb")
                .with_device_name("/dev/sdb")
                .with_model("Samsung SSD 870")
                .with_subsystem("block:scsi")
                .with_serial("S6PNNM0T123"),
            Disk::new("sda")
                .with_device_name("/dev/sda")
                .with_model("WDC  WDS100T2B0B")
                .with_subsystem("block:scsi")
                .with_wwid("naa.5044cca67bddsd"),
            Disk::new("nvme0n1")
                .with_device_name("/dev/nvme0n1")
                .with_model("WDC PC SN730")
                .with_subsystem("block:nvme")
                .with_uuid("d8a9e3c0-0000-4000-8000-00000000abcd"),
        ])
    }

    #[test]
    fn test_list_preserves_order() {
        let enumerator = pool();
        let disks = list_with(&enumerator).unwrap();
        let names = disks.iter().filter_map(Disk::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["sdb", "sda", "nvme0n1"]);
        assert_eq!(disks, enumerator.enumerate().unwrap());
    }

    #[test]
    fn test_find_first_match() {
        let enumerator = pool();
        let disk = find_with(&enumerator, &[with_model("WDC*")]).unwrap();
        assert_eq!(disk.name(), Some("sda"));

        let disk = find_with(&enumerator, &[with_model("WDC*"), with_subsystem("block:nvme")]).unwrap();
        assert_eq!(disk.name(), Some("nvme0n1"));

        // Empty set selects the first disk
        let disk = find_with(&enumerator, &[]).unwrap();
        assert_eq!(disk.name(), Some("sdb"));
    }

    #[test]
    fn test_find_not_found() {
        let enumerator = pool();
        let err = find_with(&enumerator, &[with_model("WDC*"), with_serial("S6PNNM0T*")]).unwrap_err();
        match err {
            Error::NotFound { matchers } => assert_eq!(matchers, "model=WDC*, serial=S6PNNM0T*"),
            other => panic!("unexpected error: {other}"),
        }

        let empty = MockEnumerator::default();
        assert!(matches!(find_with(&empty, &[]), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_find_sees_later_disks() {
        let mut enumerator = pool();
        assert!(find_with(&enumerator, &[with_name("xvda")]).is_err());

        enumerator.push(Disk::new("xvda").with_model("Xen PV disk").with_kind(Kind::Xen));
        let disk = find_with(&enumerator, &[with_name("xvd*")]).unwrap();
        assert_eq!(disk.kind(), Some(Kind::Xen));
        assert_eq!(list_with(&enumerator).unwrap().len(), 4);
    }

    #[test]
    fn test_enumeration_failure_propagates() {
        let enumerator = MockEnumerator::failing(io::ErrorKind::PermissionDenied);
        assert!(matches!(list_with(&enumerator), Err(Error::Enumeration(_))));
        assert!(matches!(
            find_with(&enumerator, &[with_name("*")]),
            Err(Error::Enumeration(e)) if e.kind() == io::ErrorKind::PermissionDenied
        ));
    }

    #[test]
    fn test_list_running_system() {
        // Hosts without sysfs (containers, sandboxes) can't enumerate
        let Ok(disks) = list() else {
            return;
        };
        for disk in &disks {
            assert!(disk.device_name().is_some());
            assert!(disk.model().is_some());
            assert!(disk.subsystem().is_some());
        }
    }
}
