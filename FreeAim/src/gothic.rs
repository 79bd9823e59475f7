//!
//! @file gothic.rs
//! @author Gothic Free Aim Developers
//! @brief Everything we know about the two supported Gothic executables.
//! @bug No known bugs.
//!
//! Each build has its own address table, and its patches and hook sites are declared right next
//! to it, in terms of its own symbols. A build is only ever paired with its own definitions, so
//! there is no way to apply a Gothic 1 patch to Gothic 2.
//!

mod g1;
mod g2;
pub mod signals;

use once_cell::sync::OnceCell;

use gothic_common::GameVersion;
use gothic_patcher::patch::check_overlaps;
use gothic_patcher::{AddressTable, Claim, HookSite, PatchDef, PatchError, PatchResult};
use gothic_patcher::{PatchSet, VersionProbe};

////////////////////////////////////////////////////////////////////////////////////////////////////
// Patch and hook names
////////////////////////////////////////////////////////////////////////////////////////////////////

pub const AUTO_TURNING: &str = "disable_auto_turning";
pub const SCHEME_RANGED: &str = "control_scheme_ranged";
pub const SCHEME_SPELLS: &str = "control_scheme_spells";
pub const FOCUS_RANGED: &str = "disable_focus_ranged";
pub const FOCUS_SPELLS: &str = "disable_focus_spells";
pub const STRAFING: &str = "strafing";
pub const CAMERA_MODE: &str = "camera_mode";

pub const HOOK_FRAME: &str = "frame";
pub const HOOK_MENU_LEAVE: &str = "menu_leave";
pub const HOOK_TURN: &str = "turn_player";
pub const HOOK_AUTO_TARGET: &str = "auto_target";

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Offsets of the engine fields we read, which differ between builds.
#[derive(Copy, Clone, Debug)]
pub struct Layout {
    /// oCNpc::fmode, the drawn weapon type.
    pub npc_fmode: usize
}

/// Everything needed to patch one build.
#[derive(Debug)]
pub struct VersionTables {
    pub table: AddressTable,
    pub patches: &'static [PatchDef],
    pub hooks: &'static [HookSite],
    pub probe: VersionProbe,
    pub layout: Layout
}

/// Holds the build selected for this process. Can be set once.
pub struct Selection(OnceCell<&'static VersionTables>);

/// The tables of the running executable.
pub static SELECTED: Selection = Selection::new();

impl VersionTables {
    /// Gets the hook site with the given name.
    pub fn hook(
        &self,
        name: &str
    ) -> Option<&'static HookSite> {
        self.hooks.iter().find(|h| h.name == name)
    }

    ///
    /// Resolves every patch and hook site of this build.
    ///
    /// This is the full offline check of the definitions: the table must be valid, every symbol
    /// must resolve, every diff must be length-preserving, every hook site must fit a jump, and
    /// no two definitions may write to the same byte.
    ///
    pub fn resolve(
        &self
    ) -> PatchResult<PatchSet> {
        self.table.validate()?;
        let patches = PatchSet::resolve(self.patches, &self.table)?;

        let mut claims: Vec<Claim> = patches.claims().collect();
        for site in self.hooks.iter() {
            if site.original.len() < gothic_patcher::asm::MIN_HOOK_SIZE {
                return Err(PatchError::LengthMismatch(site.name));
            }

            claims.push(Claim {
                start: self.table.resolve(site.symbol)?,
                len: site.original.len(),
                owner: site.name
            });
        }

        check_overlaps(claims)?;
        Ok(patches)
    }
}

/// Gets the tables of the given build.
pub fn tables_for(
    version: GameVersion
) -> &'static VersionTables {
    match version {
        GameVersion::Gothic1 => &g1::TABLES,
        GameVersion::Gothic2 => &g2::TABLES
    }
}

/// Gets the identity probe of every supported build.
pub fn probes() -> [VersionProbe; 2] {
    [g1::TABLES.probe, g2::TABLES.probe]
}

impl Selection {
    /// Creates an empty selection.
    pub const fn new() -> Self {
        Self(OnceCell::new())
    }

    ///
    /// Selects the tables of the given build.
    ///
    /// The selection is permanent. Selecting again, even the same build, is an error.
    ///
    pub fn select(
        &self,
        version: GameVersion
    ) -> PatchResult<&'static VersionTables> {
        let tables = tables_for(version);
        self.0.set(tables).map_err(|_| {
            let old = self.0.get().map_or(version, |t| t.table.version());
            PatchError::AlreadySelected(old)
        })?;
        Ok(tables)
    }

    /// Gets the selected tables, if any.
    pub fn get(
        &self
    ) -> Option<&'static VersionTables> {
        self.0.get().copied()
    }
}

/// Builds fake game memory holding the code every definition expects.
#[cfg(test)]
pub mod testing {
    use gothic_patcher::mock::MockMemory;
    use gothic_patcher::{Opcode, Signature};

    use super::VersionTables;

    /// Gets bytes which satisfy the signature, with zeros for wildcards.
    pub fn sig_bytes(
        sig: &Signature
    ) -> Vec<u8> {
        sig.ops().iter().map(|op| match op {
            Opcode::Code(b) => *b,
            Opcode::Any => 0
        }).collect()
    }

    /// Loads the unpatched code of every patch and hook site, and the identity probe.
    pub fn load_game(
        tables: &VersionTables,
        mem: &mut MockMemory
    ) {
        for def in tables.patches.iter() {
            for d in def.diffs.iter() {
                let addr = tables.table.resolve(d.symbol).unwrap() + d.offset;
                mem.load(addr, d.original);
            }
        }

        for site in tables.hooks.iter() {
            mem.load(tables.table.resolve(site.symbol).unwrap(), &sig_bytes(&site.original));
        }

        mem.load(tables.probe.addr, &sig_bytes(&tables.probe.sig));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::RULES;

    #[test]
    fn both_builds_resolve_completely() {
        for v in GameVersion::ALL {
            let tables = tables_for(v);
            assert_eq!(tables.table.version(), v);
            assert_eq!(tables.probe.version, v);
            let patches = tables.resolve().unwrap_or_else(|e| panic!("{}: {}", v, e));
            assert_eq!(patches.len(), tables.patches.len());
        }
    }

    #[test]
    fn every_rule_has_a_patch_in_both_builds() {
        for v in GameVersion::ALL {
            let patches = tables_for(v).resolve().unwrap();
            for rule in RULES.iter() {
                assert!(patches.get(rule.patch).is_some(), "{} has no {}", v, rule.patch);
            }
        }
    }

    #[test]
    fn control_schemes_are_five_diff_groups_in_gothic_2_only() {
        let g2 = tables_for(GameVersion::Gothic2).resolve().unwrap();
        assert_eq!(g2.get(SCHEME_RANGED).unwrap().addrs().count(), 5);
        assert_eq!(g2.get(SCHEME_SPELLS).unwrap().addrs().count(), 5);

        let g1 = tables_for(GameVersion::Gothic1).resolve().unwrap();
        assert!(g1.get(SCHEME_RANGED).is_none());
        assert!(g1.get(SCHEME_SPELLS).is_none());
    }

    #[test]
    fn every_hook_exists_in_both_builds() {
        for v in GameVersion::ALL {
            for name in [HOOK_FRAME, HOOK_MENU_LEAVE, HOOK_TURN, HOOK_AUTO_TARGET] {
                assert!(tables_for(v).hook(name).is_some(), "{} has no {}", v, name);
            }
        }
    }

    #[test]
    fn probes_tell_the_builds_apart() {
        use gothic_patcher::mock::MockMemory;
        use gothic_patcher::detect;

        for v in GameVersion::ALL {
            let mut mem = MockMemory::new();
            testing::load_game(tables_for(v), &mut mem);
            assert_eq!(detect(&mem, &probes()), Ok(v));
        }
    }

    #[test]
    fn selection_is_permanent() {
        let sel = Selection::new();
        assert!(sel.get().is_none());
        let t = sel.select(GameVersion::Gothic2).unwrap();
        assert_eq!(t.table.version(), GameVersion::Gothic2);
        assert_eq!(
            sel.select(GameVersion::Gothic1).unwrap_err(),
            PatchError::AlreadySelected(GameVersion::Gothic2)
        );
        assert_eq!(sel.get().unwrap().table.version(), GameVersion::Gothic2);
    }
}
