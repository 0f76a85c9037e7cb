// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Disk enumeration from Linux sysfs
//!
//! Every entry of `/sys/class/block` is classified by name, and whole disks
//! are turned into [`Disk`] records from the attribute files below the node.

use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{debug, trace};

use crate::{Disk, Enumerator, Kind, DEVFS_DIR, SYSFS_DIR};

/// Reads a value from a sysfs node and attempts to parse it to type T
///
/// # Arguments
///
/// * `node` - Path to the sysfs node
/// * `key` - Name of the sysfs attribute to read
///
/// # Returns
///
/// * `Some(T)` if the value was successfully read and parsed
/// * `None` if the file could not be read or parsed
pub(crate) fn read<T>(node: &Path, key: &str) -> Option<T>
where
    T: FromStr,
{
    let path = node.join(key);
    fs::read_to_string(&path).ok()?.trim().parse().ok()
}

/// Reads a string attribute, treating empty files as absent
fn read_string(node: &Path, key: &str) -> Option<String> {
    read::<String>(node, key).filter(|s| !s.is_empty())
}

/// Returns the final component of the symlink at `node/key`
fn link_name(node: &Path, key: &str) -> Option<String> {
    let target = fs::read_link(node.join(key)).ok()?;
    Some(target.file_name()?.to_str()?.to_owned())
}

/// Enumerates disks from the sysfs tree below a system root.
#[derive(Debug, Clone)]
pub struct Sysfs {
    sysroot: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Sysfs {
    /// Creates an enumerator rooted at `sysroot`, which is `/` for the running system.
    pub fn new(sysroot: impl Into<PathBuf>) -> Self {
        Self {
            sysroot: sysroot.into(),
        }
    }

    /// Returns the system root this enumerator reads from
    pub fn sysroot(&self) -> &Path {
        &self.sysroot
    }

    /// Builds a disk record for one block class entry.
    ///
    /// Returns `None` for anything that isn't a readable, non-empty whole disk.
    fn disk(&self, class_dir: &Path, devices_dir: Option<&Path>, name: &str) -> Option<Disk> {
        let Some(kind) = Kind::from_name(name) else {
            trace!("Skipping {name}: not a whole disk");
            return None;
        };

        let node = class_dir.join(name);

        let Some(sectors) = read::<u64>(&node, "size") else {
            debug!("Skipping {name}: unreadable size");
            return None;
        };
        if sectors == 0 {
            debug!("Skipping {name}: zero-length device");
            return None;
        }

        let model = read_string(&node, "device/model")
            .or_else(|| read_string(&node, "device/name"))
            .or_else(|| link_name(&node, "device/driver"));
        let Some(model) = model else {
            debug!("Skipping {name}: no model information");
            return None;
        };

        let bus = link_name(&node, "device/subsystem").unwrap_or_else(|| kind.bus().to_owned());

        let disk = Disk {
            device_name: Some(format!("{DEVFS_DIR}/{name}")),
            name: Some(name.to_owned()),
            model: Some(model),
            subsystem: Some(format!("block:{bus}")),
            serial: read_string(&node, "device/serial").or_else(|| read_string(&node, "serial")),
            wwid: read_string(&node, "wwid").or_else(|| read_string(&node, "device/wwid")),
            uuid: read_string(&node, "uuid").or_else(|| read_string(&node, "device/uuid")),
            bus_path: devices_dir.and_then(|dir| bus_path(dir, &node, name)),
            size: sectors * 512,
            kind: Some(kind),
        };

        trace!("Discovered {disk:?}");
        Some(disk)
    }
}

/// Resolves the sysfs node to its place in the device tree, e.g.
/// `/sys/devices/pci0000:00/0000:00:17.0/.../block/sda` becomes
/// `/pci0000:00/0000:00:17.0/...`.
fn bus_path(devices_dir: &Path, node: &Path, name: &str) -> Option<String> {
    let canonical = fs::canonicalize(node).ok()?;
    let relative = canonical.strip_prefix(devices_dir).ok()?;
    if relative.starts_with("virtual") {
        return None;
    }
    let parent = relative.parent()?;
    let parent = if parent.file_name()? == "block" {
        parent.parent()?
    } else {
        parent
    };

    let mut out = String::new();
    for component in parent.components() {
        out.push('/');
        out.push_str(component.as_os_str().to_str()?);
    }

    if out.is_empty() {
        debug!("{name} has no bus path");
        None
    } else {
        Some(out)
    }
}

impl Enumerator for Sysfs {
    fn enumerate(&self) -> io::Result<Vec<Disk>> {
        let class_dir = self.sysroot.join(SYSFS_DIR);
        // Canonical so it lines up with canonicalized device nodes
        let devices_dir = fs::canonicalize(self.sysroot.join("sys/devices")).ok();

        let mut names = fs::read_dir(&class_dir)?
            .filter_map(Result::ok)
            .filter_map(|e| Some(e.file_name().to_str()?.to_owned()))
            .collect::<Vec<_>>();
        names.sort();

        let disks = names
            .iter()
            .filter_map(|name| self.disk(&class_dir, devices_dir.as_deref(), name))
            .collect::<Vec<_>>();

        debug!("Enumerated {} disks below {:?}", disks.len(), class_dir);
        Ok(disks)
    }
}
