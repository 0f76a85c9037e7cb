// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Options controlling how a block device is opened

use nix::{fcntl::OFlag, libc};

use crate::Error;

/// Default open flags: read-write
pub const DEFAULT_MODE: i32 = libc::O_RDWR;

/// Open flags for inspection without write access
pub const READ_ONLY_MODE: i32 = libc::O_RDONLY;

/// A configuration function applied over [`Options`]
pub type OptionFn = Box<dyn Fn(&mut Options) + Send + Sync>;

/// Device-open configuration.
///
/// The three fields are independent. Build one per open call, either from
/// [`OptionFn`]s via [`Options::new_default`] or with the `with_*` methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Initialise an empty GPT if the device carries no partition table
    pub create_gpt: bool,
    /// Take a non-blocking exclusive `flock` for the lifetime of the handle
    pub exclusive_lock: bool,
    /// `open(2)` flags, see [`DEFAULT_MODE`]
    pub mode: i32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_gpt: false,
            exclusive_lock: false,
            mode: DEFAULT_MODE,
        }
    }
}

impl Options {
    /// Applies `setters` in order over the defaults. Later setters win.
    pub fn new_default(setters: impl IntoIterator<Item = OptionFn>) -> Self {
        let mut options = Self::default();
        for setter in setters {
            setter(&mut options);
        }
        options
    }

    pub fn with_new_gpt(self, create_gpt: bool) -> Self {
        Self { create_gpt, ..self }
    }

    pub fn with_exclusive_lock(self, exclusive_lock: bool) -> Self {
        Self { exclusive_lock, ..self }
    }

    pub fn with_mode(self, mode: i32) -> Self {
        Self { mode, ..self }
    }

    /// Validates the mode into open flags.
    ///
    /// Rejects unknown bits, the invalid access mode `O_ACCMODE`, and
    /// `O_CREAT`/`O_TRUNC` which have no business on a device node.
    pub(crate) fn flags(&self) -> Result<OFlag, Error> {
        let flags = OFlag::from_bits(self.mode).ok_or(Error::InvalidMode(self.mode))?;
        if flags & OFlag::O_ACCMODE == OFlag::O_ACCMODE || flags.intersects(OFlag::O_CREAT | OFlag::O_TRUNC) {
            return Err(Error::InvalidMode(self.mode));
        }
        Ok(flags)
    }

    pub(crate) fn readable(flags: OFlag) -> bool {
        flags & OFlag::O_ACCMODE != OFlag::O_WRONLY
    }

    pub(crate) fn writable(flags: OFlag) -> bool {
        flags & OFlag::O_ACCMODE != OFlag::O_RDONLY
    }
}

/// Opens the device with a new GPT when it has no partition table.
pub fn with_new_gpt(create_gpt: bool) -> OptionFn {
    Box::new(move |options| options.create_gpt = create_gpt)
}

/// Locks the device for exclusive access using `flock()`.
pub fn with_exclusive_lock(exclusive_lock: bool) -> OptionFn {
    Box::new(move |options| options.exclusive_lock = exclusive_lock)
}

/// Opens the device with specific `open(2)` flags.
pub fn with_mode(mode: i32) -> OptionFn {
    Box::new(move |options| options.mode = mode)
}
