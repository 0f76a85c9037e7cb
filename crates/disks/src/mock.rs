// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Mock enumerator for testing.
//!
//! This module provides an enumerator over a fixed set of disk records that can
//! be used for testing disk selection without requiring actual hardware devices.

use std::io;

use crate::{Disk, Enumerator};

/// Yields a fixed list of disks, or a fixed failure.
#[derive(Debug, Default)]
pub struct MockEnumerator {
    disks: Vec<Disk>,
    failure: Option<io::ErrorKind>,
}

impl MockEnumerator {
    /// Creates an enumerator yielding `disks` in the given order
    pub fn new(disks: impl IntoIterator<Item = Disk>) -> Self {
        Self {
            disks: disks.into_iter().collect(),
            failure: None,
        }
    }

    /// Creates an enumerator that always fails with `kind`
    pub fn failing(kind: io::ErrorKind) -> Self {
        Self {
            disks: Vec::new(),
            failure: Some(kind),
        }
    }

    /// Appends a disk to the end of the enumeration order
    pub fn push(&mut self, disk: Disk) {
        self.disks.push(disk);
    }
}

impl Enumerator for MockEnumerator {
    fn enumerate(&self) -> io::Result<Vec<Disk>> {
        match self.failure {
            Some(kind) => Err(io::Error::new(kind, "mock enumeration failure")),
            None => Ok(self.disks.clone()),
        }
    }
}
