//!
//! @file patch.rs
//! @author Gothic Free Aim Developers
//! @brief Reversible byte patches which toggle a single behaviour of the game.
//! @bug No known bugs.
//!
//! A patch is a list of diffs, each of which is an address with the bytes the game ships with
//! and the bytes we replace them with. Both sides are authored from disassembly; neither is ever
//! captured from memory, so toggling a patch any number of times always lands on exactly the
//! authored bytes.
//!
//! A patch with several diffs is a group. Its diffs are always written together, back to back,
//! so the game never runs with some of them applied and some not between two of our calls.
//!

use std::fmt;

use crate::errors::{PatchError, PatchResult};
use crate::memory::Memory;
use crate::sig::BinarySig;
use crate::table::AddressTable;

/// Declares one diff of a patch.
#[derive(Copy, Clone, Debug)]
pub struct DiffDef {
    pub symbol: &'static str,
    pub offset: usize,
    pub original: &'static [u8],
    pub replacement: &'static [u8]
}

/// Declares a patch, which may consist of several diffs toggled together.
#[derive(Copy, Clone, Debug)]
pub struct PatchDef {
    pub name: &'static str,
    pub diffs: &'static [DiffDef]
}

/// A diff whose address has been resolved.
#[derive(Copy, Clone, Debug)]
struct Diff {
    addr: usize,
    original: &'static [u8],
    replacement: &'static [u8]
}

/// A resolved patch, with its current state.
#[derive(Debug)]
pub struct Patch {
    name: &'static str,
    diffs: Vec<Diff>,
    active: bool
}

/// Classifies what the memory covered by a patch currently holds.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RegionState {
    /// Every byte is as the game ships it.
    Original,

    /// Every byte is as the patch writes it.
    Replaced,

    /// Some bytes are original and some are replaced. Never valid outside of a write sequence.
    Mixed,

    /// Some byte is neither; something other than this patch wrote there.
    Foreign
}

/// The full set of patches for one build, with no two patches sharing a byte.
#[derive(Debug, Default)]
pub struct PatchSet(Vec<Patch>);

/// A byte range owned by a patch or hook, used to detect overlaps.
#[derive(Copy, Clone, Debug)]
pub struct Claim {
    pub start: usize,
    pub len: usize,
    pub owner: &'static str
}

impl Diff {
    /// The bytes this diff holds in the given state.
    fn bytes(
        &self,
        on: bool
    ) -> &'static [u8] {
        if on { self.replacement } else { self.original }
    }
}

impl Patch {
    ///
    /// Resolves the given definition against the given table.
    ///
    /// The patch starts out inactive, since the game always starts out unpatched.
    ///
    pub fn resolve(
        def: &PatchDef,
        table: &AddressTable
    ) -> PatchResult<Self> {
        let mut diffs = Vec::with_capacity(def.diffs.len());
        for d in def.diffs.iter() {
            if d.original.len() != d.replacement.len() || d.original.is_empty() {
                return Err(PatchError::LengthMismatch(def.name));
            }

            diffs.push(Diff {
                addr: table.resolve(d.symbol)? + d.offset,
                original: d.original,
                replacement: d.replacement
            });
        }

        if diffs.is_empty() {
            return Err(PatchError::LengthMismatch(def.name));
        }

        Ok(Self { name: def.name, diffs, active: false })
    }

    /// Gets the name of the patch.
    pub fn name(
        &self
    ) -> &'static str {
        self.name
    }

    /// Checks if the patch is currently applied.
    pub fn is_active(
        &self
    ) -> bool {
        self.active
    }

    /// Gets the addresses of each diff, in write order.
    pub fn addrs(
        &self
    ) -> impl Iterator<Item = usize> + '_ {
        self.diffs.iter().map(|d| d.addr)
    }

    /// Gets the byte ranges this patch writes to.
    pub fn claims(
        &self
    ) -> impl Iterator<Item = Claim> + '_ {
        self.diffs.iter().map(|d| Claim { start: d.addr, len: d.original.len(), owner: self.name })
    }

    /// Applies the patch. Does nothing if it is already applied.
    pub fn activate(
        &mut self,
        mem: &mut dyn Memory
    ) -> PatchResult<bool> {
        self.set(mem, true)
    }

    /// Removes the patch. Does nothing if it is not applied.
    pub fn deactivate(
        &mut self,
        mem: &mut dyn Memory
    ) -> PatchResult<bool> {
        self.set(mem, false)
    }

    ///
    /// Moves the patch into the requested state, returning whether memory was written.
    ///
    /// Before writing, the memory must hold the bytes of the recorded state. If it does not,
    /// something else has written there (or our state is wrong) and nothing is written; the
    /// region is left as we found it.
    ///
    pub fn set(
        &mut self,
        mem: &mut dyn Memory,
        on: bool
    ) -> PatchResult<bool> {
        if self.active == on {
            return Ok(false);
        }

        if let Some(d) = self.diffs.iter().find(|d| !mem.matches(d.addr, d.bytes(self.active))) {
            let expected = if self.active { "replacement" } else { "original" };
            log::error!(
                "[FAILURE] Patch {} at {:#x} does not hold its {} bytes!",
                self.name,
                d.addr,
                expected
            );
            log::error!("\\------> [EXPECTED] {}", BinarySig(d.bytes(self.active).to_vec()));
            log::error!(" \\-----> [FOUND...] {}", BinarySig::read(mem, d.addr, d.original.len()));
            return Err(PatchError::InvalidPatchState { patch: self.name, addr: d.addr, expected });
        }

        // Nothing between these writes; see the module comment.
        for d in self.diffs.iter() {
            mem.write_bytes(d.addr, d.bytes(on));
        }
        self.active = on;

        log::debug!("Patch {} is now {}", self.name, if on { "on" } else { "off" });
        Ok(true)
    }

    /// Classifies the current contents of the memory this patch covers.
    pub fn region_state(
        &self,
        mem: &dyn Memory
    ) -> RegionState {
        let (mut original, mut replaced) = (false, false);
        for d in self.diffs.iter() {
            let found = BinarySig::read(mem, d.addr, d.original.len()).0;
            for ((b, o), r) in found.iter().zip(d.original.iter()).zip(d.replacement.iter()) {
                match (b == o, b == r) {
                    (true, true) => (),
                    (true, false) => original = true,
                    (false, true) => replaced = true,
                    (false, false) => return RegionState::Foreign
                }
            }
        }

        match (original, replaced) {
            (true, true) => RegionState::Mixed,
            (false, true) => RegionState::Replaced,
            _ => RegionState::Original
        }
    }

    /// The region state this patch should currently observe.
    pub fn expected_state(
        &self
    ) -> RegionState {
        if self.active { RegionState::Replaced } else { RegionState::Original }
    }
}

impl fmt::Display for Patch {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
    ) -> Result<(), fmt::Error> {
        write!(f, "Patch {}", self.name)?;
        for d in self.diffs.iter() {
            write!(f, " [{:#010x}; {}]", d.addr, d.original.len())?;
        }
        Ok(())
    }
}

impl PatchSet {
    /// Resolves every definition against the table, rejecting overlapping patches.
    pub fn resolve(
        defs: &[PatchDef],
        table: &AddressTable
    ) -> PatchResult<Self> {
        let mut patches = Vec::with_capacity(defs.len());
        for def in defs.iter() {
            match Patch::resolve(def, table) {
                Ok(p) => {
                    log::info!("[SUCCESS] {}", p);
                    patches.push(p);
                },
                Err(e) => {
                    log::error!("[FAILURE] Patch {}: {}", def.name, e);
                    return Err(e);
                }
            }
        }

        let set = Self(patches);
        check_overlaps(set.claims().collect())?;
        Ok(set)
    }

    /// Finds the patch with the given name.
    pub fn get(
        &self,
        name: &str
    ) -> Option<&Patch> {
        self.0.iter().find(|p| p.name == name)
    }

    /// Finds the patch with the given name.
    pub fn get_mut(
        &mut self,
        name: &str
    ) -> Option<&mut Patch> {
        self.0.iter_mut().find(|p| p.name == name)
    }

    /// Iterates over the patches in the set.
    pub fn iter(
        &self
    ) -> impl Iterator<Item = &Patch> {
        self.0.iter()
    }

    /// Gets every byte range claimed by the set.
    pub fn claims(
        &self
    ) -> impl Iterator<Item = Claim> + '_ {
        self.0.iter().flat_map(|p| p.claims())
    }

    /// Gets the number of patches in the set.
    pub fn len(
        &self
    ) -> usize {
        self.0.len()
    }

    /// Checks if the set has no patches.
    pub fn is_empty(
        &self
    ) -> bool {
        self.0.is_empty()
    }

    ///
    /// Verifies that every patch region holds what its recorded state says it should.
    ///
    /// Returns the number of patches which have been clobbered.
    ///
    pub fn verify(
        &self,
        mem: &dyn Memory
    ) -> usize {
        let mut fails = 0;
        for p in self.0.iter() {
            let state = p.region_state(mem);
            if state != p.expected_state() {
                log::error!(
                    "[ERROR] Patch {} has been clobbered! Expected {:?}, found {:?}.",
                    p.name,
                    p.expected_state(),
                    state
                );
                fails += 1;
            }
        }
        fails
    }
}

///
/// Checks that no two of the given claims share a byte.
///
/// Overlapping writes cannot be undone independently, so they are rejected up front.
///
pub fn check_overlaps(
    mut claims: Vec<Claim>
) -> PatchResult<()> {
    claims.sort_by_key(|c| c.start);
    for pair in claims.windows(2) {
        if pair[0].start + pair[0].len > pair[1].start {
            log::error!("[FAILURE] {} overlaps {}", pair[0].owner, pair[1].owner);
            return Err(PatchError::Overlap(pair[0].owner, pair[1].owner));
        }
    }
    Ok(())
}
