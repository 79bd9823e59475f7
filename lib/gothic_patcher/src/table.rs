//!
//! @file table.rs
//! @author Gothic Free Aim Developers
//! @brief Maps symbolic names to the absolute addresses of one Gothic build.
//! @bug No known bugs.
//!
//! Tables are authored from disassembly of each supported executable and never change at
//! runtime. Each build has its own table, and the running build is identified with a probe:
//! a short signature at an address which only matches in that build.
//!

use std::collections::HashSet;
use std::fmt;

use gothic_common::GameVersion;

use crate::errors::{PatchError, PatchResult};
use crate::memory::Memory;
use crate::sig::Signature;

/// What lives at a table address.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AddressKind {
    Code,
    Data,
    VtableSlot
}

/// A named address in a Gothic executable.
#[derive(Copy, Clone, Debug)]
pub struct AddressEntry {
    pub name: &'static str,
    pub addr: usize,
    pub kind: AddressKind
}

/// The full set of named addresses of one Gothic build.
#[derive(Debug)]
pub struct AddressTable {
    version: GameVersion,
    entries: &'static [AddressEntry]
}

/// Identifies a build by the code found at a known address.
#[derive(Copy, Clone, Debug)]
pub struct VersionProbe {
    pub version: GameVersion,
    pub addr: usize,
    pub sig: Signature
}

/// Shorthand for declaring a code address.
pub const fn code(
    name: &'static str,
    addr: usize
) -> AddressEntry {
    AddressEntry { name, addr, kind: AddressKind::Code }
}

/// Shorthand for declaring a data address.
pub const fn data(
    name: &'static str,
    addr: usize
) -> AddressEntry {
    AddressEntry { name, addr, kind: AddressKind::Data }
}

/// Shorthand for declaring a virtual table slot.
pub const fn vtable_slot(
    name: &'static str,
    addr: usize
) -> AddressEntry {
    AddressEntry { name, addr, kind: AddressKind::VtableSlot }
}

impl AddressTable {
    /// Creates a new address table for the given version.
    pub const fn new(
        version: GameVersion,
        entries: &'static [AddressEntry]
    ) -> Self {
        Self { version, entries }
    }

    /// Gets the build this table describes.
    pub fn version(
        &self
    ) -> GameVersion {
        self.version
    }

    /// Gets the full entry for the given name.
    pub fn entry(
        &self,
        name: &str
    ) -> PatchResult<&'static AddressEntry> {
        self.entries.iter()
            .find(|e| e.name == name)
            .ok_or_else(|| PatchError::UnknownSymbol(name.to_string(), self.version))
    }

    /// Finds the address of the given name.
    pub fn resolve(
        &self,
        name: &str
    ) -> PatchResult<usize> {
        self.entry(name).map(|e| e.addr)
    }

    ///
    /// Checks the table for authoring mistakes: duplicated names and null addresses.
    ///
    /// This cannot catch a wrong address; only checking against the binary can.
    ///
    pub fn validate(
        &self
    ) -> PatchResult<()> {
        let mut seen = HashSet::new();
        for e in self.entries.iter() {
            if !seen.insert(e.name) {
                return Err(PatchError::InvalidTable(self.version, format!("{} is duplicated", e.name)));
            }

            if e.addr < gothic_common::version::IMAGE_BASE {
                return Err(PatchError::InvalidTable(
                    self.version,
                    format!("{} is outside the image ({:#x})", e.name, e.addr)
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for AddressEntry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
    ) -> Result<(), fmt::Error> {
        write!(f, "{:?} {} [{:#010x}]", self.kind, self.name, self.addr)
    }
}

impl VersionProbe {
    /// Checks if the running executable matches this probe.
    pub fn matches(
        &self,
        mem: &dyn Memory
    ) -> bool {
        self.sig.check(mem, self.addr).is_ok()
    }
}

///
/// Identifies the running executable.
///
/// Exactly one probe must match. Anything else means the executable is one we have no table
/// for (or, worse, one our probes cannot tell apart), and nothing may be patched.
///
pub fn detect(
    mem: &dyn Memory,
    probes: &[VersionProbe]
) -> PatchResult<GameVersion> {
    let mut found = probes.iter().filter(|p| p.matches(mem));
    match (found.next(), found.next()) {
        (Some(p), None) => {
            log::info!("[SUCCESS] Detected {}", p.version);
            Ok(p.version)
        },
        (Some(a), Some(b)) => {
            log::error!("[FAILURE] Executable matches both {} and {}", a.version, b.version);
            Err(PatchError::UnsupportedVersion)
        },
        _ => {
            log::error!("[FAILURE] Executable matches no known Gothic build");
            Err(PatchError::UnsupportedVersion)
        }
    }
}
