// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Attribute matchers for selecting disks
//!
//! A [`Matcher`] binds one [`Attribute`] of a [`Disk`] to a glob pattern where
//! `*` matches any run of characters and everything else is literal.
//! A set of matchers is evaluated by [`matches`]: matchers on the same
//! attribute are alternatives, matchers on different attributes must all hold.

use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::{Disk, Error};

/// A selectable attribute of a [`Disk`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    Name,
    DeviceName,
    Model,
    SubSystem,
    Serial,
    Wwid,
    Uuid,
    BusPath,
}

impl Attribute {
    /// Every attribute, in display order
    pub const ALL: [Attribute; 8] = [
        Attribute::Name,
        Attribute::DeviceName,
        Attribute::Model,
        Attribute::SubSystem,
        Attribute::Serial,
        Attribute::Wwid,
        Attribute::Uuid,
        Attribute::BusPath,
    ];

    /// Reads this attribute from a disk
    pub fn value<'a>(&self, disk: &'a Disk) -> Option<&'a str> {
        match self {
            Attribute::Name => disk.name(),
            Attribute::DeviceName => disk.device_name(),
            Attribute::Model => disk.model(),
            Attribute::SubSystem => disk.subsystem(),
            Attribute::Serial => disk.serial(),
            Attribute::Wwid => disk.wwid(),
            Attribute::Uuid => disk.uuid(),
            Attribute::BusPath => disk.bus_path(),
        }
    }

    /// The textual key used by [`Matcher::from_str`]
    pub fn key(&self) -> &'static str {
        match self {
            Attribute::Name => "name",
            Attribute::DeviceName => "device",
            Attribute::Model => "model",
            Attribute::SubSystem => "subsystem",
            Attribute::Serial => "serial",
            Attribute::Wwid => "wwid",
            Attribute::Uuid => "uuid",
            Attribute::BusPath => "bus-path",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.key())
    }
}

impl FromStr for Attribute {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Attribute::ALL
            .into_iter()
            .find(|a| a.key() == s)
            .ok_or_else(|| Error::InvalidPattern(format!("unknown attribute '{s}'")))
    }
}

/// A pure predicate over one attribute of a [`Disk`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Matcher {
    attribute: Attribute,
    pattern: String,
}

impl Matcher {
    pub fn new(attribute: Attribute, pattern: impl Into<String>) -> Self {
        Self {
            attribute,
            pattern: pattern.into(),
        }
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Evaluates this matcher alone against a disk.
    ///
    /// An unset attribute never matches, not even the bare `*` pattern.
    pub fn is_match(&self, disk: &Disk) -> bool {
        match self.attribute.value(disk) {
            Some(value) if !value.is_empty() => glob(&self.pattern, value),
            _ => false,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute, self.pattern)
    }
}

/// Parses `attribute=pattern`, e.g. `model=WDC*` or `bus-path=/pci0000:00/*`
impl FromStr for Matcher {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, pattern) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidPattern(format!("expected attribute=pattern, got '{s}'")))?;
        Ok(Matcher::new(key.trim().parse()?, pattern))
    }
}

pub fn with_name(pattern: impl Into<String>) -> Matcher {
    Matcher::new(Attribute::Name, pattern)
}

pub fn with_device_name(pattern: impl Into<String>) -> Matcher {
    Matcher::new(Attribute::DeviceName, pattern)
}

pub fn with_model(pattern: impl Into<String>) -> Matcher {
    Matcher::new(Attribute::Model, pattern)
}

pub fn with_subsystem(pattern: impl Into<String>) -> Matcher {
    Matcher::new(Attribute::SubSystem, pattern)
}

pub fn with_serial(pattern: impl Into<String>) -> Matcher {
    Matcher::new(Attribute::Serial, pattern)
}

pub fn with_wwid(pattern: impl Into<String>) -> Matcher {
    Matcher::new(Attribute::Wwid, pattern)
}

pub fn with_uuid(pattern: impl Into<String>) -> Matcher {
    Matcher::new(Attribute::Uuid, pattern)
}

pub fn with_bus_path(pattern: impl Into<String>) -> Matcher {
    Matcher::new(Attribute::BusPath, pattern)
}

/// Evaluates a disk against a set of matchers.
///
/// Matchers are grouped by attribute. A group holds if any of its matchers
/// holds, and the disk matches if every group holds. An empty set matches
/// every disk.
pub fn matches(disk: &Disk, matchers: &[Matcher]) -> bool {
    let mut groups = BTreeMap::<Attribute, bool>::new();
    for matcher in matchers {
        let hit = groups.entry(matcher.attribute).or_default();
        *hit = *hit || matcher.is_match(disk);
    }
    groups.into_values().all(|hit| hit)
}

/// Renders a matcher set for diagnostics, e.g. `model=WDC*, serial=X`
pub(crate) fn describe(matchers: &[Matcher]) -> String {
    if matchers.is_empty() {
        return "<any>".to_owned();
    }
    matchers.iter().map(Matcher::to_string).collect::<Vec<_>>().join(", ")
}

// Literal segments between `*` must appear in order. The first one is anchored
// to the start and the last to the end unless a `*` sits on that side.
fn glob(pattern: &str, value: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();

    // No wildcard at all
    if segments.len() == 1 {
        return pattern == value;
    }

    let first = segments[0];
    let last = segments[segments.len() - 1];
    let middle = &segments[1..segments.len() - 1];

    let Some(mut remaining) = value.strip_prefix(first) else {
        return false;
    };

    for segment in middle.iter().filter(|s| !s.is_empty()) {
        match remaining.find(segment) {
            Some(at) => remaining = &remaining[at + segment.len()..],
            None => return false,
        }
    }

    remaining.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdd() -> Disk {
        Disk::default()
            .with_model("WDC  WDS100T2B0B")
            .with_size(1_000_000_000)
            .with_wwid("naa.5044cca67bddsd")
            .with_uuid("fake-uuid-string-whatever")
            .with_bus_path("/pci0000:00/0000:00:17.0/ata1/host0/target0:0:0/0:0:0:0")
    }

    fn sd_card() -> Disk {
        Disk::default().with_serial("0xeb791622")
    }

    fn sd_card2() -> Disk {
        Disk::default()
            .with_serial("0xeb791633")
            .with_name("SC32G")
            .with_size(100_000_000)
    }

    #[test]
    fn test_glob() {
        assert!(glob("abc", "abc"));
        assert!(!glob("abc", "abcd"));
        assert!(glob("*", "anything"));
        assert!(glob("a*", "abc"));
        assert!(!glob("a*", "cba"));
        assert!(glob("*c", "abc"));
        assert!(!glob("*c", "cab"));
        assert!(glob("a*c", "ac"));
        assert!(glob("a**c", "abbc"));
        assert!(glob("*b*", "abc"));
        assert!(!glob("*d*", "abc"));
        // Segments may not overlap the anchored prefix
        assert!(!glob("ab*ba", "aba"));
        assert!(glob("a*b*c", "axxbyyc"));
        assert!(!glob("a*c*b", "axxbyyc"));
    }

    #[test]
    fn test_disk_matcher() {
        let hdd = hdd();
        let sd_card = sd_card();
        let sd_card2 = sd_card2();

        let tests = vec![
            (&hdd, vec![with_wwid(hdd.wwid().unwrap())], true),
            (&hdd, vec![with_bus_path("/pci0000:00/*")], true),
            (
                &sd_card2,
                vec![with_wwid(sd_card2.name().unwrap()), with_wwid(sd_card.serial().unwrap())],
                false,
            ),
            (&hdd, vec![with_model("WDC*")], true),
            (&hdd, vec![with_model("WDC*100*")], true),
            (&hdd, vec![with_model("*WDC*")], true),
            (&hdd, vec![with_model("WDC*101*")], false),
            (&hdd, vec![with_uuid(hdd.uuid().unwrap())], true),
        ];

        for (i, (disk, matchers, expected)) in tests.into_iter().enumerate() {
            assert_eq!(matches(disk, &matchers), expected, "test {i}");
        }
    }

    #[test]
    fn test_unset_attribute_never_matches() {
        let disk = sd_card2();
        assert!(!matches(&disk, &[with_wwid("*")]));
        assert!(!matches(&disk, &[with_wwid("")]));
        assert!(!matches(&sd_card(), &[with_name("*")]));
        assert!(matches(&disk, &[with_serial("*")]));
    }

    #[test]
    fn test_same_attribute_is_any() {
        let hdd = hdd();
        assert!(!matches(&hdd, &[with_model("Samsung*"), with_model("*Crucial")]));
        assert!(matches(&hdd, &[with_model("Samsung*"), with_model("WDC*")]));
        assert!(matches(&hdd, &[with_model("WDC*"), with_model("Samsung*")]));
    }

    #[test]
    fn test_different_attributes_are_all() {
        let hdd = hdd();
        assert!(!matches(&hdd, &[with_model("WDC*"), with_uuid("other-uuid")]));
        assert!(matches(&hdd, &[with_model("WDC*"), with_uuid("fake-uuid-*")]));
        assert!(matches(
            &hdd,
            &[
                with_model("Samsung*"),
                with_uuid("fake-uuid-*"),
                with_model("WDC*"),
                with_bus_path("/pci0000:00/*"),
            ]
        ));
        // Missing attribute fails its group
        assert!(!matches(&hdd, &[with_model("WDC*"), with_serial("*")]));
    }

    #[test]
    fn test_empty_set_matches_everything() {
        assert!(matches(&hdd(), &[]));
        assert!(matches(&Disk::default(), &[]));
    }

    #[test]
    fn test_parse_matcher() {
        let m: Matcher = "model=WDC*".parse().unwrap();
        assert_eq!(m, with_model("WDC*"));
        let m: Matcher = "bus-path=/pci0000:00/*".parse().unwrap();
        assert_eq!(m, with_bus_path("/pci0000:00/*"));
        assert_eq!(m.to_string(), "bus-path=/pci0000:00/*");

        assert!(matches!("model".parse::<Matcher>(), Err(Error::InvalidPattern(_))));
        assert!(matches!("colour=red".parse::<Matcher>(), Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&[]), "<any>");
        assert_eq!(
            describe(&[with_model("WDC*"), with_serial("X")]),
            "model=WDC*, serial=X"
        );
    }
}
