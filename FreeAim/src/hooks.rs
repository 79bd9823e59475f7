//!
//! @file hooks.rs
//! @author Gothic Free Aim Developers
//! @brief Handlers for each hook site, and the state they share.
//! @bug No known bugs.
//!
//! Every handler runs on the games main thread, stopped at its hook. The frame and menu hooks
//! only observe; the turning and targeting hooks change what the game does, and only while the
//! player is aiming.
//!

use std::path::PathBuf;

use gothic_patcher::{CodeArena, Flow, Handler, HookCall, HookEngine, Memory, PatchError, PatchResult};

use crate::coordinator::{AimState, Coordinator};
use crate::gothic::signals::SignalSources;
use crate::gothic::{VersionTables, HOOK_AUTO_TARGET, HOOK_FRAME, HOOK_MENU_LEAVE, HOOK_TURN};
use crate::settings;

/// Degrees the player turns per unit of mouse movement, before sensitivity.
const TURN_SCALE: f32 = 0.1;

/// The state every handler shares.
pub struct Session {
    pub coordinator: Coordinator,
    pub sources: SignalSources,
    pub ini_path: PathBuf
}

/// Gets the handler of the named hook site.
pub fn handler_for(
    name: &str
) -> Option<Handler<Session>> {
    match name {
        HOOK_FRAME => Some(frame),
        HOOK_MENU_LEAVE => Some(menu_leave),
        HOOK_TURN => Some(turn_player),
        HOOK_AUTO_TARGET => Some(auto_target),
        _ => None
    }
}

///
/// Installs every hook site of the given build.
///
/// Stops at the first failure. Hooks installed before it stay in place; they are passthrough
/// until the coordinator is running.
///
pub fn install_all(
    engine: &mut HookEngine<Session>,
    mem: &mut dyn Memory,
    arena: &mut CodeArena,
    dispatcher: usize,
    tables: &VersionTables
) -> PatchResult<()> {
    for site in tables.hooks.iter() {
        let handler = handler_for(site.name).ok_or_else(|| {
            PatchError::UnknownSymbol(site.name.to_string(), tables.table.version())
        })?;
        engine.install(mem, arena, dispatcher, site, &tables.table, handler)?;
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Handlers
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Start of oCGame::Render. Reloads stale settings, then runs the coordinator.
fn frame(
    call: &mut HookCall<'_, Session>
) -> Flow {
    let session = &mut *call.state;

    if session.coordinator.take_settings_stale() {
        match settings::load(&session.ini_path) {
            Ok(s) => session.coordinator.apply_settings(s),
            Err(e) => log::error!("[FAILURE] Could not reload settings: {}", e)
        }
    }

    let key = session.coordinator.settings().key_action;
    let signals = session.sources.read(&*call.mem, key);
    session.coordinator.tick(&mut *call.mem, &signals);
    Flow::Continue
}

/// Start of zCMenu::Leave. The menu may have changed our settings.
fn menu_leave(
    call: &mut HookCall<'_, Session>
) -> Flow {
    call.state.coordinator.mark_settings_stale();
    Flow::Continue
}

///
/// The call to oCAniCtrl_Human::Turn(float angle, int playAni) in the players turning code.
///
/// While aiming, the angle comes from the mouse instead of the keys.
///
fn turn_player(
    call: &mut HookCall<'_, Session>
) -> Flow {
    let session = &*call.state;
    if session.coordinator.aim() >= AimState::AimingRanged {
        let dx = session.sources.mouse_dx(&*call.mem);
        let angle = dx * session.coordinator.settings().sensitivity * TURN_SCALE;
        call.ctx.set_arg_f32(&mut *call.mem, 0, angle);
    }
    Flow::Continue
}

///
/// The call to the focus search of the bow mode. While aiming there is no auto target; the
/// call is skipped and reports that nothing was found.
///
fn auto_target(
    call: &mut HookCall<'_, Session>
) -> Flow {
    if call.state.coordinator.aim() >= AimState::AimingRanged {
        call.ctx.set_return(0);
        Flow::Skip
    } else {
        Flow::Continue
    }
}
