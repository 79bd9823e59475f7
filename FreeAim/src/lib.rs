//!
//! @file lib.rs
//! @author Gothic Free Aim Developers
//! @brief Top level library configuration and initialization.
//! @bug No known bugs.
//!
//! The plugin is loaded into the game as a DLL. On attach it identifies the game, loads the
//! settings, checks every patch and installs the hooks. From then on everything happens inside
//! the hooks, on the games main thread.
//!

#![allow(non_snake_case)]

mod settings;
mod gothic;
mod coordinator;
mod hooks;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use once_cell::sync::OnceCell;

use gothic_common::{GameVersion, RacyCell};
use gothic_patcher::{CallContext, CodeArena, HookEngine, Memory, PatchSet, ProcessMemory};

use crate::coordinator::Coordinator;
use crate::gothic::signals::SignalSources;
use crate::gothic::VersionTables;
use crate::hooks::Session;
use crate::settings::Settings;

/// The log file, in the games system folder.
const LOG_FILE: &str = "GFA.log";

/// Bytes available to hook stubs, skip tails and trampolines.
const ARENA_SIZE: usize = 1024;

/// Executable memory for the code generated by the hook engine.
#[repr(C, align(16))]
struct ArenaBuf([u8; ARENA_SIZE]);

static ARENA: RacyCell<ArenaBuf> = RacyCell::new(ArenaBuf([0xcc; ARENA_SIZE]));

/// Everything the hooks need, once attach has finished.
struct Plugin {
    mem: ProcessMemory,
    engine: HookEngine<Session>,
    session: Session
}

static PLUGIN: OnceCell<RacyCell<Plugin>> = OnceCell::new();

///
/// Called by every hook stub, with the index of its hook and the registers it saved.
///
/// Until attach has finished the slot of every hook still holds its trampoline, so returning
/// without dispatching leaves the game running its own code.
///
#[cfg_attr(not(windows), allow(dead_code))]
extern "C" fn hook_entry(
    index: u32,
    ctx: *mut CallContext
) {
    let Some(cell) = PLUGIN.get() else { return; };

    // SAFETY: Hooks only run on the games main thread, one at a time, and the stub passes a
    //         pointer to the registers it just pushed.
    let (plugin, ctx) = unsafe { (&mut *cell.get(), &mut *ctx) };
    if let Err(e) = plugin.engine.dispatch(index, &mut plugin.session, &mut plugin.mem, ctx) {
        log::error!("[ERROR] Could not dispatch hook {}: {}", index, e);
    }
}

/// Checks if the host executable is one of the supported games.
fn host_version(
    exe: &Path
) -> Option<GameVersion> {
    let name = exe.file_name()?.to_str()?;
    GameVersion::ALL.into_iter().find(|v| v.executable().eq_ignore_ascii_case(name))
}

///
/// Checks the game code against every patch and hook site of the build, then installs the
/// hooks.
///
/// Nothing in the game is written unless every patch region holds its original bytes and every
/// hook site matches its signature.
///
fn prepare(
    mem: &mut dyn Memory,
    tables: &VersionTables,
    arena: &mut CodeArena,
    dispatcher: usize
) -> anyhow::Result<(PatchSet, HookEngine<Session>)> {
    let patches = tables.resolve().context("The game does not match its patch definitions")?;

    let mut fails = patches.verify(&*mem);
    for site in tables.hooks.iter() {
        let addr = tables.table.resolve(site.symbol)?;
        if site.original.check(&*mem, addr).is_err() {
            log::error!("[FAILURE] Hook {} does not match the game code!", site.name);
            fails += 1;
        }
    }
    if fails > 0 {
        bail!("{} patches and hooks do not match the game code", fails);
    }

    let mut engine = HookEngine::new();
    hooks::install_all(&mut engine, mem, arena, dispatcher, tables)
        .context("Could not install hooks")?;
    if engine.verify(&*mem) > 0 {
        bail!("The game code changed while the hooks were installed");
    }

    log::info!("[SUCCESS] Installed {} hooks ({} arena bytes)", engine.len(), arena.used());
    Ok((patches, engine))
}

///
/// Initializes the plugin.
///
/// Runs inside DllMain, so under the loader lock. Only file I/O and our own memory are touched
/// here; nothing loads a library or waits on another thread.
///
#[cfg_attr(not(windows), allow(dead_code))]
fn attach() -> anyhow::Result<()> {
    let exe = std::env::current_exe().context("Could not locate the game executable")?;
    let system_dir = exe.parent().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);

    gothic_common::log::open(&system_dir.join(LOG_FILE))
        .with_context(|| format!("Could not create {}", LOG_FILE))?;
    log::info!("Gothic Free Aim {}", env!("CARGO_PKG_VERSION"));

    // The probes read game code, which is only mapped if this is one of our games.
    let Some(expected) = host_version(&exe) else {
        bail!("{} is not a supported game", exe.display());
    };

    // SAFETY: Every address used from here on comes from the tables of the detected build.
    let mut mem = unsafe { ProcessMemory::new() };

    let version = gothic_patcher::detect(&mem, &gothic::probes())
        .context("Could not identify the game version")?;
    if version != expected {
        bail!("{} does not look like {}", exe.display(), expected);
    }

    let tables = gothic::SELECTED.select(version)?;
    let ini_path = system_dir.join(settings::INI_FILE);
    let settings = settings::load(&ini_path).unwrap_or_else(|e| {
        log::error!("[FAILURE] {}, using default settings", e);
        Settings::default()
    });

    let sources = SignalSources::resolve(tables)?;

    let arena_base = ARENA.get() as usize;
    // SAFETY: The arena is a static of this module.
    if !unsafe { gothic_patcher::memory::make_executable(arena_base, ARENA_SIZE) } {
        bail!("Could not make the hook arena executable");
    }

    let mut arena = CodeArena::new(arena_base, ARENA_SIZE);
    let (patches, engine) = prepare(&mut mem, tables, &mut arena, hook_entry as usize)?;

    let session = Session {
        coordinator: Coordinator::new(version, patches, settings),
        sources,
        ini_path
    };

    if PLUGIN.set(RacyCell::new(Plugin { mem, engine, session })).is_err() {
        bail!("The plugin was already initialized");
    }

    log::info!("Initialization complete!");
    Ok(())
}

///
/// DLL entrypoint.
///
/// Initializes the plugin on process attach. A plugin which fails to initialize leaves the game
/// untouched, or with passthrough hooks only, and tells the user why.
///
#[cfg(windows)]
#[no_mangle]
pub unsafe extern "system" fn DllMain(
    module: windows_sys::Win32::Foundation::HINSTANCE,
    call_reason: u32,
    _reserved: *mut std::ffi::c_void
) -> windows_sys::Win32::Foundation::BOOL {
    use std::sync::atomic::{AtomicBool, Ordering};
    use windows_sys::Win32::Foundation::TRUE;
    use windows_sys::Win32::System::LibraryLoader::DisableThreadLibraryCalls;
    use windows_sys::Win32::System::SystemServices::DLL_PROCESS_ATTACH;

    if call_reason != DLL_PROCESS_ATTACH {
        return TRUE;
    }

    // Prevent reinit.
    static IS_INIT: AtomicBool = AtomicBool::new(false);
    if IS_INIT.swap(true, Ordering::Relaxed) {
        log::error!("Cannot reinitialize library!");
        return TRUE;
    }

    DisableThreadLibraryCalls(module);

    if let Err(e) = attach() {
        // A message box pumps messages, which must not happen under the loader lock. The
        // thread only starts running once DllMain has returned.
        let msg = format!("Gothic Free Aim is disabled.\n\n{:#}", e);
        gothic_common::gfa_fatal!("{}", msg => log);
        std::thread::spawn(move || gothic_common::gfa_fatal!("{}", msg => window));
    }

    // Failing to load would leave the game running without telling anyone.
    TRUE
}
