//!
//! @file g1.rs
//! @author Gothic Free Aim Developers
//! @brief Addresses, patches and hook sites of GOTHIC.EXE 1.08k_mod.
//! @bug No known bugs.
//!

use gothic_common::GameVersion;
use gothic_patcher::table::{code, data};
use gothic_patcher::{AddressEntry, AddressTable, DiffDef, HookSite, PatchDef, VersionProbe};

use super::{Layout, VersionTables};
use super::{AUTO_TURNING, CAMERA_MODE, FOCUS_RANGED, FOCUS_SPELLS};
use super::{HOOK_AUTO_TARGET, HOOK_FRAME, HOOK_MENU_LEAVE, HOOK_TURN, STRAFING};

static ENTRIES: [AddressEntry; 12] = [
    code("oCGame__Render", 0x0063_dbe0),
    code("zCMenu__Leave", 0x004c_faf0),
    code("oCAIHuman__PC_Turnings_turn", 0x0061_2f45),
    code("oCAIHuman__BowMode", 0x0061_3c80),
    code("oCAIHuman__BowMode_focus", 0x0061_3d3e),
    code("oCAIHuman__MagicMode", 0x0061_4a20),
    code("oCAIHuman__PC_Strafe", 0x0061_2a10),
    data("oCAIHuman__camModRanged", 0x0082_f2e4),
    data("oCNpc__player", 0x008d_bbb0),
    data("zCInput_Win32__keyevent", 0x0086_ccc8),
    data("zCInput_Win32__mouseDeltaX", 0x0086_cca8),
    data("zCMenu__inGameMenu", 0x0086_f4c0)
];

static PATCHES: [PatchDef; 5] = [
    PatchDef {
        name: AUTO_TURNING,
        diffs: &[
            DiffDef { symbol: "oCAIHuman__BowMode", offset: 0x3f6, original: &[0x74], replacement: &[0xeb] }
        ]
    },
    PatchDef {
        name: FOCUS_RANGED,
        diffs: &[
            DiffDef { symbol: "oCAIHuman__BowMode", offset: 0x0e4, original: &[0x74, 0x2e], replacement: &[0xeb, 0x2e] }
        ]
    },
    PatchDef {
        name: FOCUS_SPELLS,
        diffs: &[
            DiffDef { symbol: "oCAIHuman__MagicMode", offset: 0x12a, original: &[0x75, 0x1f], replacement: &[0xeb, 0x1f] }
        ]
    },
    PatchDef {
        name: STRAFING,
        diffs: &[
            DiffDef { symbol: "oCAIHuman__PC_Strafe", offset: 0x016, original: &[0x75, 0x0c], replacement: &[0x90, 0x90] }
        ]
    },
    PatchDef {
        name: CAMERA_MODE,
        diffs: &[
            DiffDef {
                symbol: "oCAIHuman__camModRanged",
                offset: 0,
                original: b"CAMMODRANGED\0",
                replacement: b"CAMMODGFA\0\0\0\0"
            }
        ]
    }
];

static HOOKS: [HookSite; 4] = [
    HookSite {
        name: HOOK_FRAME,
        symbol: "oCGame__Render",
        original: gothic_patcher::signature![0x6a, 0xff, 0x68, ?, ?, ?, ?; 7],
        relocations: &[],
        stack_cleanup: 0
    },
    HookSite {
        name: HOOK_MENU_LEAVE,
        symbol: "zCMenu__Leave",
        original: gothic_patcher::signature![0x6a, 0xff, 0x68, ?, ?, ?, ?; 7],
        relocations: &[],
        stack_cleanup: 0
    },
    // call oCAniCtrl_Human::Turn(float, int)
    HookSite {
        name: HOOK_TURN,
        symbol: "oCAIHuman__PC_Turnings_turn",
        original: gothic_patcher::signature![0xe8, ?, ?, ?, ?; 5],
        relocations: &[1],
        stack_cleanup: 0
    },
    // call oCNpc::GetNearestValidVobInFront(int)
    HookSite {
        name: HOOK_AUTO_TARGET,
        symbol: "oCAIHuman__BowMode_focus",
        original: gothic_patcher::signature![0xe8, ?, ?, ?, ?; 5],
        relocations: &[1],
        stack_cleanup: 4
    }
];

pub static TABLES: VersionTables = VersionTables {
    table: AddressTable::new(GameVersion::Gothic1, &ENTRIES),
    patches: &PATCHES,
    hooks: &HOOKS,
    probe: VersionProbe {
        version: GameVersion::Gothic1,
        addr: 0x0063_dbe0,
        sig: gothic_patcher::signature![0x6a, 0xff, 0x68, 0x3b, 0x9a, 0x7d, 0x00; 7]
    },
    layout: Layout {
        npc_fmode: 0x1c8
    }
};
