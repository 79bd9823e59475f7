//!
//! @file coordinator.rs
//! @author Gothic Free Aim Developers
//! @brief Decides, once per frame, which patches should be applied, and applies them.
//! @bug No known bugs.
//!
//! The coordinator is level triggered. Every tick recomputes the aim state from the live signals
//! and the settings, and then moves every patch into the state its rule asks for. Nothing is
//! derived from the previous tick, so a missed tick is corrected by the next one, and a tick
//! with nothing new to do writes nothing.
//!

use gothic_common::GameVersion;
use gothic_patcher::{Memory, PatchError, PatchResult, PatchSet};

use crate::gothic::signals::{Signals, FMODE_BOW, FMODE_CBOW, FMODE_MAGIC};
use crate::gothic::{AUTO_TURNING, CAMERA_MODE, FOCUS_RANGED, FOCUS_SPELLS, STRAFING};
use crate::gothic::{SCHEME_RANGED, SCHEME_SPELLS};
use crate::settings::Settings;

/// What the player is doing with their weapon, from least to most involved.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub enum AimState {
    #[default]
    Inactive,

    /// A free aim weapon is drawn, but the player is not aiming with it.
    Ready,

    AimingRanged,
    AimingMagic
}

///
/// Ties a patch to the conditions under which it should be applied.
///
/// The precondition depends only on the settings; a patch whose feature is turned off is never
/// applied, whatever the aim state.
///
pub struct Rule {
    pub patch: &'static str,
    pub precondition: fn(&Settings) -> bool,
    pub wanted: fn(&Settings, AimState) -> bool
}

/// The rules for every patch which follows the aim state.
pub static RULES: [Rule; 5] = [
    Rule {
        patch: AUTO_TURNING,
        precondition: |s| s.enabled && (s.ranged || s.spells),
        wanted: |_, aim| aim >= AimState::AimingRanged
    },
    Rule {
        patch: FOCUS_RANGED,
        precondition: |s| s.enabled && s.ranged,
        wanted: |_, aim| aim == AimState::AimingRanged
    },
    Rule {
        patch: FOCUS_SPELLS,
        precondition: |s| s.enabled && s.spells,
        wanted: |_, aim| aim == AimState::AimingMagic
    },
    Rule {
        patch: STRAFING,
        precondition: |s| s.enabled && s.strafing,
        wanted: |_, aim| aim >= AimState::AimingRanged
    },
    Rule {
        patch: CAMERA_MODE,
        precondition: |s| s.enabled && s.ranged,
        wanted: |_, _| true
    }
];

/// Everything the coordinator remembers between ticks.
#[derive(Clone, Debug)]
pub struct CoordinatorState {
    pub aim: AimState,
    pub scheme_ranged: u8,
    pub scheme_spells: u8,
    pub settings_stale: bool,

    /// Toggles which have failed since the last settings change.
    pub failures: usize,

    /// Patches which failed to toggle, and are left alone until the settings change.
    pub faulted: Vec<&'static str>
}

/// Owns the patches of the running build and keeps them in line with the game.
pub struct Coordinator {
    version: GameVersion,
    patches: PatchSet,
    rules: &'static [Rule],
    settings: Settings,
    state: CoordinatorState
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self {
            aim: AimState::Inactive,
            scheme_ranged: 1,
            scheme_spells: 1,
            settings_stale: false,
            failures: 0,
            faulted: Vec::new()
        }
    }
}

///
/// Computes the aim state from the settings, the current control schemes and the signals.
///
/// With control scheme 2 the player only aims while holding the action key; otherwise drawing
/// the weapon is enough.
///
pub fn aim_state(
    settings: &Settings,
    state: &CoordinatorState,
    signals: &Signals
) -> AimState {
    if !settings.enabled || signals.in_menu {
        return AimState::Inactive;
    }

    let (allowed, scheme, aiming) = match signals.fight_mode {
        FMODE_BOW | FMODE_CBOW => (settings.ranged, state.scheme_ranged, AimState::AimingRanged),
        FMODE_MAGIC => (settings.spells, state.scheme_spells, AimState::AimingMagic),
        _ => return AimState::Inactive
    };

    if !allowed {
        AimState::Inactive
    } else if scheme == 2 && !signals.action_held {
        AimState::Ready
    } else {
        aiming
    }
}

impl Coordinator {
    /// Creates a coordinator for the given build. Every patch starts out inactive.
    pub fn new(
        version: GameVersion,
        patches: PatchSet,
        settings: Settings
    ) -> Self {
        Self {
            version,
            patches,
            rules: &RULES,
            settings,
            state: CoordinatorState::default()
        }
    }

    ///
    /// Brings every patch in line with the current signals and settings.
    ///
    /// Returns the number of patches which were written. Failures are logged and counted, and
    /// the failed patch is left alone; they never stop the rest of the tick.
    ///
    pub fn tick(
        &mut self,
        mem: &mut dyn Memory,
        signals: &Signals
    ) -> usize {
        let mut changed = 0;

        let (ranged, spells) = self.desired_schemes();
        if !self.is_faulted(SCHEME_RANGED) {
            let res = self.set_control_scheme_ranged(mem, ranged);
            changed += self.record(SCHEME_RANGED, res);
        }
        if !self.is_faulted(SCHEME_SPELLS) {
            let res = self.set_control_scheme_spells(mem, spells);
            changed += self.record(SCHEME_SPELLS, res);
        }

        let aim = aim_state(&self.settings, &self.state, signals);
        if aim != self.state.aim {
            log::debug!("Aim state {:?} -> {:?}", self.state.aim, aim);
            self.state.aim = aim;
        }

        let rules = self.rules;
        for rule in rules.iter() {
            if self.is_faulted(rule.patch) {
                continue;
            }

            let desired = (rule.precondition)(&self.settings) && (rule.wanted)(&self.settings, aim);
            let res = match self.patches.get_mut(rule.patch) {
                Some(p) => p.set(mem, desired),
                None => Err(PatchError::UnknownSymbol(rule.patch.to_string(), self.version))
            };
            changed += self.record(rule.patch, res);
        }

        changed
    }

    /// Switches the control scheme of ranged weapons. Does nothing in Gothic 1.
    pub fn set_control_scheme_ranged(
        &mut self,
        mem: &mut dyn Memory,
        scheme: u8
    ) -> PatchResult<bool> {
        let changed = self.set_scheme(mem, SCHEME_RANGED, scheme)?;
        if self.version.has_control_schemes() {
            self.state.scheme_ranged = scheme;
        }
        Ok(changed)
    }

    /// Switches the control scheme of spells. Does nothing in Gothic 1.
    pub fn set_control_scheme_spells(
        &mut self,
        mem: &mut dyn Memory,
        scheme: u8
    ) -> PatchResult<bool> {
        let changed = self.set_scheme(mem, SCHEME_SPELLS, scheme)?;
        if self.version.has_control_schemes() {
            self.state.scheme_spells = scheme;
        }
        Ok(changed)
    }

    fn set_scheme(
        &mut self,
        mem: &mut dyn Memory,
        name: &'static str,
        scheme: u8
    ) -> PatchResult<bool> {
        if !self.version.has_control_schemes() {
            return Ok(false);
        }

        self.patches.get_mut(name)
            .ok_or_else(|| PatchError::UnknownSymbol(name.to_string(), self.version))?
            .set(mem, scheme == 2)
    }

    /// The control schemes the settings ask for. Scheme 1 is the games own behaviour.
    fn desired_schemes(
        &self
    ) -> (u8, u8) {
        let s = &self.settings;
        (
            if s.enabled && s.ranged { s.scheme_ranged } else { 1 },
            if s.enabled && s.spells { s.scheme_spells } else { 1 }
        )
    }

    fn is_faulted(
        &self,
        name: &str
    ) -> bool {
        self.state.faulted.iter().any(|f| *f == name)
    }

    /// Counts a write, or logs and quarantines a failed patch.
    fn record(
        &mut self,
        name: &'static str,
        res: PatchResult<bool>
    ) -> usize {
        match res {
            Ok(changed) => changed as usize,
            Err(e) => {
                log::error!("[FAILURE] {}: {}. Leaving it alone until the settings change.", name, e);
                self.state.failures += 1;
                self.state.faulted.push(name);
                0
            }
        }
    }

    ///
    /// Replaces the settings. The next tick converges to them.
    ///
    /// Faulted patches get another chance, since the user may have fixed the conflict.
    ///
    pub fn apply_settings(
        &mut self,
        settings: Settings
    ) {
        if settings != self.settings {
            log::info!("Settings changed: {:?}", settings);
        }
        self.settings = settings;
        self.state.faulted.clear();
    }

    /// Notes that the settings may have changed on disk.
    pub fn mark_settings_stale(
        &mut self
    ) {
        self.state.settings_stale = true;
    }

    /// Checks and clears the stale settings flag.
    pub fn take_settings_stale(
        &mut self
    ) -> bool {
        std::mem::take(&mut self.state.settings_stale)
    }

    pub fn aim(&self) -> AimState { self.state.aim }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn state(&self) -> &CoordinatorState { &self.state }

    pub fn patches(&self) -> &PatchSet { &self.patches }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gothic::{self, tables_for};
    use gothic_patcher::mock::MockMemory;
    use gothic_patcher::RegionState;

    fn setup(
        version: GameVersion,
        settings: Settings
    ) -> (Coordinator, MockMemory) {
        let tables = tables_for(version);
        let mut mem = MockMemory::new();
        gothic::testing::load_game(tables, &mut mem);
        let patches = tables.resolve().unwrap();
        (Coordinator::new(version, patches, settings), mem)
    }

    fn aiming_bow() -> Signals {
        Signals { fight_mode: FMODE_BOW, ..Default::default() }
    }

    fn actives(
        c: &Coordinator
    ) -> Vec<(&'static str, bool)> {
        c.patches().iter().map(|p| (p.name(), p.is_active())).collect()
    }

    #[test]
    fn second_tick_without_changes_writes_nothing() {
        let (mut c, mut mem) = setup(GameVersion::Gothic2, Settings::default());
        assert!(c.tick(&mut mem, &aiming_bow()) > 0);
        mem.clear_log();
        assert_eq!(c.tick(&mut mem, &aiming_bow()), 0);
        assert_eq!(mem.writes(), 0);
    }

    #[test]
    fn converges_after_a_skipped_tick() {
        let a = Signals::default();
        let b = Signals { fight_mode: FMODE_MAGIC, ..Default::default() };

        let (mut every, mut mem_every) = setup(GameVersion::Gothic2, Settings::default());
        every.tick(&mut mem_every, &a);
        every.tick(&mut mem_every, &b);
        every.tick(&mut mem_every, &b);

        let (mut skipped, mut mem_skipped) = setup(GameVersion::Gothic2, Settings::default());
        skipped.tick(&mut mem_skipped, &a);
        skipped.tick(&mut mem_skipped, &b);

        assert_eq!(actives(&every), actives(&skipped));
        assert_eq!(every.aim(), AimState::AimingMagic);
        for p in every.patches().iter() {
            for addr in p.addrs() {
                assert_eq!(mem_every.snapshot(addr, 16), mem_skipped.snapshot(addr, 16), "{}", p.name());
            }
        }
    }

    #[test]
    fn aiming_applies_and_holstering_restores() {
        let (mut c, mut mem) = setup(GameVersion::Gothic1, Settings::default());
        let tables = tables_for(GameVersion::Gothic1);
        let mut pristine = MockMemory::new();
        gothic::testing::load_game(tables, &mut pristine);

        c.tick(&mut mem, &aiming_bow());
        assert_eq!(c.aim(), AimState::AimingRanged);
        assert!(c.patches().get(AUTO_TURNING).unwrap().is_active());
        assert!(c.patches().get(FOCUS_RANGED).unwrap().is_active());
        assert!(!c.patches().get(FOCUS_SPELLS).unwrap().is_active());

        c.tick(&mut mem, &Signals::default());
        assert_eq!(c.aim(), AimState::Inactive);
        for p in c.patches().iter() {
            let expected = p.name() == CAMERA_MODE;
            assert_eq!(p.is_active(), expected, "{}", p.name());
            if !expected {
                for addr in p.addrs() {
                    assert_eq!(mem.snapshot(addr, 2), pristine.snapshot(addr, 2));
                }
            }
        }
    }

    #[test]
    fn disabled_features_are_never_applied() {
        let settings = Settings { ranged: false, strafing: false, ..Default::default() };
        let (mut c, mut mem) = setup(GameVersion::Gothic2, settings);
        c.tick(&mut mem, &aiming_bow());
        assert_eq!(c.aim(), AimState::Inactive);
        assert!(c.patches().iter().all(|p| !p.is_active()));
        assert_eq!(mem.writes(), 0);

        // Turning everything off converges back as well.
        c.apply_settings(Settings::default());
        c.tick(&mut mem, &aiming_bow());
        c.apply_settings(Settings { enabled: false, ..Default::default() });
        c.tick(&mut mem, &aiming_bow());
        assert!(c.patches().iter().all(|p| !p.is_active()));
    }

    #[test]
    fn control_scheme_switch_writes_its_five_addresses_once() {
        let (mut c, mut mem) = setup(GameVersion::Gothic2, Settings::default());
        assert_eq!(c.state().scheme_ranged, 1);

        assert_eq!(c.set_control_scheme_ranged(&mut mem, 2), Ok(true));
        let group: Vec<usize> = c.patches().get(SCHEME_RANGED).unwrap().addrs().collect();
        assert_eq!(group.len(), 5);
        assert_eq!(mem.written_addrs(), group);
        assert_eq!(c.state().scheme_ranged, 2);
        assert_eq!(c.patches().get(SCHEME_RANGED).unwrap().region_state(&mem), RegionState::Replaced);

        mem.clear_log();
        assert_eq!(c.set_control_scheme_ranged(&mut mem, 2), Ok(false));
        assert_eq!(mem.writes(), 0);
        assert_eq!(c.state().scheme_ranged, 2);
    }

    #[test]
    fn gothic_1_has_no_control_schemes() {
        let (mut c, mut mem) = setup(GameVersion::Gothic1, Settings::default());
        assert_eq!(c.set_control_scheme_spells(&mut mem, 2), Ok(false));
        assert_eq!(c.state().scheme_spells, 1);
        assert_eq!(mem.writes(), 0);
    }

    #[test]
    fn scheme_2_aims_only_while_the_action_key_is_held() {
        let settings = Settings { scheme_ranged: 2, ..Default::default() };
        let (mut c, mut mem) = setup(GameVersion::Gothic2, settings);

        c.tick(&mut mem, &aiming_bow());
        assert_eq!(c.aim(), AimState::Ready);
        assert!(c.patches().get(SCHEME_RANGED).unwrap().is_active());
        assert!(!c.patches().get(FOCUS_RANGED).unwrap().is_active());

        c.tick(&mut mem, &Signals { action_held: true, ..aiming_bow() });
        assert_eq!(c.aim(), AimState::AimingRanged);
        assert!(c.patches().get(FOCUS_RANGED).unwrap().is_active());
    }

    #[test]
    fn menus_stop_aiming() {
        let (mut c, mut mem) = setup(GameVersion::Gothic2, Settings::default());
        c.tick(&mut mem, &Signals { in_menu: true, ..aiming_bow() });
        assert_eq!(c.aim(), AimState::Inactive);
    }

    #[test]
    fn clobbered_patches_are_quarantined_until_settings_change() {
        let (mut c, mut mem) = setup(GameVersion::Gothic2, Settings::default());
        let addr = c.patches().get(STRAFING).unwrap().addrs().next().unwrap();
        mem.load(addr, &[0xcc, 0xcc]);

        c.tick(&mut mem, &aiming_bow());
        assert_eq!(c.state().failures, 1);
        assert_eq!(c.state().faulted, vec![STRAFING]);
        assert!(!c.patches().get(STRAFING).unwrap().is_active());
        assert_eq!(mem.snapshot(addr, 2), vec![0xcc, 0xcc]);

        // Every other patch still follows the aim state.
        assert!(c.patches().get(FOCUS_RANGED).unwrap().is_active());

        c.tick(&mut mem, &aiming_bow());
        assert_eq!(c.state().failures, 1);

        c.apply_settings(Settings::default());
        assert!(c.state().faulted.is_empty());
    }

    #[test]
    fn stale_flag_is_taken_once() {
        let (mut c, _) = setup(GameVersion::Gothic2, Settings::default());
        assert!(!c.take_settings_stale());
        c.mark_settings_stale();
        assert!(c.take_settings_stale());
        assert!(!c.take_settings_stale());
    }

    #[test]
    fn aim_states_are_ordered() {
        assert!(AimState::Inactive < AimState::Ready);
        assert!(AimState::Ready < AimState::AimingRanged);
        assert!(AimState::AimingRanged < AimState::AimingMagic);
    }
}
