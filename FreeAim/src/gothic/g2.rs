//!
//! @file g2.rs
//! @author Gothic Free Aim Developers
//! @brief Addresses, patches and hook sites of Gothic2.exe 2.6 (fix).
//! @bug No known bugs.
//!

use gothic_common::GameVersion;
use gothic_patcher::table::{code, data};
use gothic_patcher::{AddressEntry, AddressTable, DiffDef, HookSite, PatchDef, VersionProbe};

use super::{Layout, VersionTables};
use super::{AUTO_TURNING, CAMERA_MODE, FOCUS_RANGED, FOCUS_SPELLS, SCHEME_RANGED, SCHEME_SPELLS};
use super::{HOOK_AUTO_TARGET, HOOK_FRAME, HOOK_MENU_LEAVE, HOOK_TURN, STRAFING};

static ENTRIES: [AddressEntry; 12] = [
    code("oCGame__Render", 0x006c_86a0),
    code("zCMenu__Leave", 0x004d_c1c0),
    code("oCAIHuman__PC_Turnings_turn", 0x0069_a4d3),
    code("oCAIHuman__BowMode", 0x0069_5f00),
    code("oCAIHuman__BowMode_focus", 0x0069_5fc9),
    code("oCAIHuman__MagicMode", 0x0047_2410),
    code("oCAIHuman__PC_Strafe", 0x0069_9f60),
    data("oCAIHuman__camModRanged", 0x0089_a5e8),
    data("oCNpc__player", 0x00ab_2684),
    data("zCInput_Win32__keyevent", 0x008d_1678),
    data("zCInput_Win32__mouseDeltaX", 0x008d_165c),
    data("zCMenu__inGameMenu", 0x008d_1e68)
];

static PATCHES: [PatchDef; 7] = [
    PatchDef {
        name: AUTO_TURNING,
        diffs: &[
            DiffDef { symbol: "oCAIHuman__BowMode", offset: 0x47b, original: &[0x74], replacement: &[0xeb] }
        ]
    },
    PatchDef {
        name: SCHEME_RANGED,
        diffs: &[
            DiffDef { symbol: "oCAIHuman__BowMode", offset: 0x03c, original: &[0x75], replacement: &[0xeb] },
            DiffDef { symbol: "oCAIHuman__BowMode", offset: 0x08a, original: &[0x74], replacement: &[0xeb] },
            DiffDef { symbol: "oCAIHuman__BowMode", offset: 0x1c3, original: &[0x75], replacement: &[0x74] },
            DiffDef { symbol: "oCAIHuman__BowMode", offset: 0x2d5, original: &[0x0f, 0x84], replacement: &[0x90, 0xe9] },
            DiffDef { symbol: "oCAIHuman__BowMode", offset: 0x3a1, original: &[0x7d], replacement: &[0xeb] }
        ]
    },
    PatchDef {
        name: SCHEME_SPELLS,
        diffs: &[
            DiffDef { symbol: "oCAIHuman__MagicMode", offset: 0x02e, original: &[0x75], replacement: &[0xeb] },
            DiffDef { symbol: "oCAIHuman__MagicMode", offset: 0x077, original: &[0x74], replacement: &[0xeb] },
            DiffDef { symbol: "oCAIHuman__MagicMode", offset: 0x10d, original: &[0x0f, 0x85], replacement: &[0x90, 0xe9] },
            DiffDef { symbol: "oCAIHuman__MagicMode", offset: 0x1f4, original: &[0x75], replacement: &[0x74] },
            DiffDef { symbol: "oCAIHuman__MagicMode", offset: 0x26b, original: &[0x7e], replacement: &[0xeb] }
        ]
    },
    PatchDef {
        name: FOCUS_RANGED,
        diffs: &[
            DiffDef { symbol: "oCAIHuman__BowMode", offset: 0x102, original: &[0x74, 0x2e], replacement: &[0xeb, 0x2e] }
        ]
    },
    PatchDef {
        name: FOCUS_SPELLS,
        diffs: &[
            DiffDef { symbol: "oCAIHuman__MagicMode", offset: 0x140, original: &[0x75, 0x1f], replacement: &[0xeb, 0x1f] }
        ]
    },
    PatchDef {
        name: STRAFING,
        diffs: &[
            DiffDef { symbol: "oCAIHuman__PC_Strafe", offset: 0x01a, original: &[0x75, 0x0c], replacement: &[0x90, 0x90] }
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
    table: AddressTable::new(GameVersion::Gothic2, &ENTRIES),
    patches: &PATCHES,
    hooks: &HOOKS,
    probe: VersionProbe {
        version: GameVersion::Gothic2,
        addr: 0x006c_86a0,
        sig: gothic_patcher::signature![0x6a, 0xff, 0x68, 0x5b, 0x34, 0x82, 0x00; 7]
    },
    layout: Layout {
        npc_fmode: 0x1d8
    }
};
