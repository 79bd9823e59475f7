//!
//! @file signals.rs
//! @author Gothic Free Aim Developers
//! @brief Reads the live game state the coordinator decides on.
//! @bug No known bugs.
//!

use gothic_patcher::{Memory, PatchResult};

use super::VersionTables;

/// oCNpc::fmode of a drawn bow.
pub const FMODE_BOW: i32 = 5;

/// oCNpc::fmode of a drawn crossbow.
pub const FMODE_CBOW: i32 = 6;

/// oCNpc::fmode of a readied spell.
pub const FMODE_MAGIC: i32 = 7;

/// Length of zCInput_Win32::keyevent. Key codes from here on are mouse buttons.
pub const KEY_EVENTS: u16 = 0x100;

/// A snapshot of the inputs the coordinator reacts to.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct Signals {
    /// The fight mode of the player, or zero if there is no player.
    pub fight_mode: i32,
    pub action_held: bool,
    pub in_menu: bool,
    pub mouse_dx: f32
}

/// The resolved addresses signals are read from.
#[derive(Copy, Clone, Debug)]
pub struct SignalSources {
    player: usize,
    keys: usize,
    mouse_dx: usize,
    menu: usize,
    npc_fmode: usize
}

impl SignalSources {
    /// Resolves every signal address of the given build.
    pub fn resolve(
        tables: &VersionTables
    ) -> PatchResult<Self> {
        Ok(Self {
            player: tables.table.resolve("oCNpc__player")?,
            keys: tables.table.resolve("zCInput_Win32__keyevent")?,
            mouse_dx: tables.table.resolve("zCInput_Win32__mouseDeltaX")?,
            menu: tables.table.resolve("zCMenu__inGameMenu")?,
            npc_fmode: tables.layout.npc_fmode
        })
    }

    ///
    /// Reads the current signals. The key is a Gothic key code, which indexes the key event
    /// array of the input manager directly. Mouse codes have no key event and never read as held.
    ///
    pub fn read(
        &self,
        mem: &dyn Memory,
        key: u16
    ) -> Signals {
        let player = mem.read_u32(self.player) as usize;
        let fight_mode = if player == 0 { 0 } else { mem.read_i32(player + self.npc_fmode) };

        Signals {
            fight_mode,
            action_held: key < KEY_EVENTS && mem.read_u8(self.keys + key as usize) != 0,
            in_menu: mem.read_u32(self.menu) != 0,
            mouse_dx: self.mouse_dx(mem)
        }
    }

    /// Reads the horizontal mouse movement of this frame.
    pub fn mouse_dx(
        &self,
        mem: &dyn Memory
    ) -> f32 {
        mem.read_i32(self.mouse_dx) as f32
    }
}
