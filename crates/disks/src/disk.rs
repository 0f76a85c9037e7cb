// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use core::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Kernel name patterns for the disk families we recognise
static NVME_PATTERN: OnceLock<Regex> = OnceLock::new();
static MMC_PATTERN: OnceLock<Regex> = OnceLock::new();

/// The family of a disk device, derived from its kernel name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// SCSI disk device (e.g. sda, sdb). All libata devices land here too.
    Scsi,
    /// NVMe namespace (e.g. nvme0n1)
    Nvme,
    /// MMC/SD card (e.g. mmcblk0)
    Mmc,
    /// virtio block device (e.g. vda)
    Virtio,
    /// Xen paravirtual block device (e.g. xvda)
    Xen,
}

impl Kind {
    /// Classifies a kernel block device name.
    ///
    /// Returns `None` for partitions and for anything that isn't a whole
    /// physical disk: device-mapper, loop, ram, zram, md, overlays.
    pub fn from_name(name: &str) -> Option<Self> {
        let nvme = NVME_PATTERN
            .get_or_init(|| Regex::new(r"^nvme\d+n\d+$").expect("Failed to initialise known-working regex"));
        let mmc = MMC_PATTERN.get_or_init(|| Regex::new(r"^mmcblk\d+$").expect("Failed to initialise known-working regex"));

        if is_lettered(name, "sd") {
            Some(Kind::Scsi)
        } else if is_lettered(name, "vd") {
            Some(Kind::Virtio)
        } else if is_lettered(name, "xvd") {
            Some(Kind::Xen)
        } else if nvme.is_match(name) {
            Some(Kind::Nvme)
        } else if mmc.is_match(name) {
            Some(Kind::Mmc)
        } else {
            None
        }
    }

    /// Bus name used when the subsystem link can't be resolved
    pub fn bus(&self) -> &'static str {
        match self {
            Kind::Scsi => "scsi",
            Kind::Nvme => "nvme",
            Kind::Mmc => "mmc",
            Kind::Virtio => "virtio",
            Kind::Xen => "xen",
        }
    }
}

// sdX / vdX / xvdX style names: prefix followed by one or more letters
fn is_lettered(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_lowercase()))
}

/// A point-in-time snapshot of one block device's identifying attributes.
///
/// Records are produced by an [`Enumerator`](crate::Enumerator) and never
/// re-queried. Holding a `Disk` does not hold the device open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disk {
    /// Kernel device path (e.g. /dev/sda)
    pub(crate) device_name: Option<String>,
    /// Short device name (e.g. sda, nvme0n1)
    pub(crate) name: Option<String>,
    pub(crate) model: Option<String>,
    /// Bus classification, e.g. `block:scsi`
    pub(crate) subsystem: Option<String>,
    pub(crate) serial: Option<String>,
    pub(crate) wwid: Option<String>,
    pub(crate) uuid: Option<String>,
    /// Topological bus address below /sys/devices
    pub(crate) bus_path: Option<String>,
    /// Size in bytes, 0 when unknown
    pub(crate) size: u64,
    pub(crate) kind: Option<Kind>,
}

// Empty strings carry no information, store them as unset.
fn normalize(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Disk {
    /// Creates a record with only the short name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: normalize(name),
            ..Default::default()
        }
    }

    pub fn with_device_name(self, value: impl Into<String>) -> Self {
        Self {
            device_name: normalize(value),
            ..self
        }
    }

    pub fn with_name(self, value: impl Into<String>) -> Self {
        Self {
            name: normalize(value),
            ..self
        }
    }

    pub fn with_model(self, value: impl Into<String>) -> Self {
        Self {
            model: normalize(value),
            ..self
        }
    }

    pub fn with_subsystem(self, value: impl Into<String>) -> Self {
        Self {
            subsystem: normalize(value),
            ..self
        }
    }

    pub fn with_serial(self, value: impl Into<String>) -> Self {
        Self {
            serial: normalize(value),
            ..self
        }
    }

    pub fn with_wwid(self, value: impl Into<String>) -> Self {
        Self {
            wwid: normalize(value),
            ..self
        }
    }

    pub fn with_uuid(self, value: impl Into<String>) -> Self {
        Self {
            uuid: normalize(value),
            ..self
        }
    }

    pub fn with_bus_path(self, value: impl Into<String>) -> Self {
        Self {
            bus_path: normalize(value),
            ..self
        }
    }

    pub fn with_size(self, size: u64) -> Self {
        Self { size, ..self }
    }

    pub fn with_kind(self, kind: Kind) -> Self {
        Self {
            kind: Some(kind),
            ..self
        }
    }

    /// Returns the kernel device path (e.g. /dev/sda).
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Returns the short device name (e.g. sda).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn subsystem(&self) -> Option<&str> {
        self.subsystem.as_deref()
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Returns the World Wide Identifier, if the hardware exposes one.
    pub fn wwid(&self) -> Option<&str> {
        self.wwid.as_deref()
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Returns the bus address, e.g. `/pci0000:00/0000:00:17.0/ata1/host0/target0:0:0/0:0:0:0`.
    pub fn bus_path(&self) -> Option<&str> {
        self.bus_path.as_deref()
    }

    /// Returns the size of the disk in bytes, 0 when unknown.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the disk family, if the record came from an enumerator.
    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }
}

impl fmt::Display for Disk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let gib = self.size as f64 / 1_073_741_824.0;

        write!(f, "{} ({:.2} GiB)", self.name().unwrap_or("<unnamed>"), gib)?;

        if let Some(model) = self.model() {
            write!(f, " - {}", model)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(Kind::from_name("sda"), Some(Kind::Scsi));
        assert_eq!(Kind::from_name("sdab"), Some(Kind::Scsi));
        assert_eq!(Kind::from_name("vdb"), Some(Kind::Virtio));
        assert_eq!(Kind::from_name("xvda"), Some(Kind::Xen));
        assert_eq!(Kind::from_name("nvme0n1"), Some(Kind::Nvme));
        assert_eq!(Kind::from_name("mmcblk0"), Some(Kind::Mmc));

        // Partitions and pseudo devices
        for name in ["sda1", "nvme0n1p2", "mmcblk0p1", "mmcblk0boot0", "vda3", "xvda1", "xvd", "dm-0", "loop0", "zram0", "sd"] {
            assert_eq!(Kind::from_name(name), None, "{name}");
        }
    }

    #[test]
    fn test_empty_values_are_unset() {
        let disk = Disk::new("sda").with_serial("").with_model("Samsung SSD");
        assert_eq!(disk.serial(), None);
        assert_eq!(disk.model(), Some("Samsung SSD"));
        assert_eq!(Disk::new("").name(), None);
    }

    #[test]
    fn test_display() {
        let disk = Disk::new("sda").with_model("WDC  WDS100T2B0B").with_size(2 * 1_073_741_824);
        assert_eq!(disk.to_string(), "sda (2.00 GiB) - WDC  WDS100T2B0B");
    }

    #[test]
    fn test_kind_is_independent_of_name() {
        let disk = Disk::new("xvdb").with_kind(Kind::Xen);
        assert_eq!(disk.kind(), Some(Kind::Xen));
        assert_eq!(disk.kind().map(|k| k.bus()), Some("xen"));
        assert_eq!(Disk::new("xvdb").kind(), None);
    }
}
