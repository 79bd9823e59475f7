//!
//! @file settings.rs
//! @author Gothic Free Aim Developers
//! @brief Loads the free aim settings from the games INI file.
//! @bug No known bugs.
//!
//! The settings live in Gothic.ini, next to the games own options, so the in-game menus can
//! change them. They are read once at attach and again whenever a menu is left.
//!

mod config;
mod field;

use std::io;
use std::path::Path;

use ini::{Ini, ParseOption};
use thiserror::Error;

use field::{GothicBool, IniField, KeyBinding};
use config::{DefaultIniField, IniDefaultReadable};

/// The name of the INI file the settings are read from.
pub const INI_FILE: &str = "Gothic.ini";

const GFA_SEC: &str = "GFA";
const GAME_SEC: &str = "GAME";
const KEYS_SEC: &str = "KEYS";

/// Describes why the settings file could not be read.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not read Gothic.ini: {0}")]
    Read(#[from] io::Error),

    #[error("could not parse Gothic.ini: {0}")]
    Parse(#[from] ini::ParseError)
}

/// The settings the coordinator and the hooks act on.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Settings {
    pub enabled: bool,
    pub ranged: bool,
    pub spells: bool,
    pub scheme_ranged: u8,
    pub scheme_spells: u8,
    pub strafing: bool,
    pub sensitivity: f32,
    pub key_action: u16
}

/// The INI fields each setting is read from.
struct IniSettings {
    enabled: DefaultIniField<IniField<GothicBool>>,
    ranged: DefaultIniField<IniField<GothicBool>>,
    spells: DefaultIniField<IniField<GothicBool>>,
    scheme_ranged: DefaultIniField<IniField<u8>>,
    scheme_spells: DefaultIniField<IniField<u8>>,
    strafing: DefaultIniField<IniField<GothicBool>>,
    sensitivity: DefaultIniField<IniField<f32>>,
    key_action: DefaultIniField<IniField<KeyBinding>>
}

impl IniSettings {
    /// Creates the field set, with default values for missing fields.
    fn new() -> Self {
        Self {
            enabled: DefaultIniField::new(GFA_SEC, "freeAimingEnabled", GothicBool(true)),
            ranged: DefaultIniField::new(GFA_SEC, "freeAimingRanged", GothicBool(true)),
            spells: DefaultIniField::new(GFA_SEC, "freeAimingSpells", GothicBool(true)),
            scheme_ranged: DefaultIniField::new(GFA_SEC, "ctrlSchemeRanged", 1),
            scheme_spells: DefaultIniField::new(GFA_SEC, "ctrlSchemeSpells", 1),
            strafing: DefaultIniField::new(GFA_SEC, "strafing", GothicBool(true)),
            sensitivity: DefaultIniField::new(GAME_SEC, "mouseSensitivity", 0.5),
            key_action: DefaultIniField::new(KEYS_SEC, "keyAction", KeyBinding(0x1d))
        }
    }

    /// Reads in the settings from the given INI file.
    fn read_ini(
        &mut self,
        ini: &Ini
    ) {
        self.enabled.read_ini_default(ini);
        self.ranged.read_ini_default(ini);
        self.spells.read_ini_default(ini);
        self.scheme_ranged.read_ini_default(ini);
        self.scheme_spells.read_ini_default(ini);
        self.strafing.read_ini_default(ini);
        self.sensitivity.read_ini_default(ini);
        self.key_action.read_ini_default(ini);
    }

    /// Flattens the fields, clamping anything out of range.
    fn get(
        &self
    ) -> Settings {
        Settings {
            enabled: self.enabled.get().0,
            ranged: self.ranged.get().0,
            spells: self.spells.get().0,
            scheme_ranged: clamp_scheme("ctrlSchemeRanged", self.scheme_ranged.get()),
            scheme_spells: clamp_scheme("ctrlSchemeSpells", self.scheme_spells.get()),
            strafing: self.strafing.get().0,
            sensitivity: clamp_sensitivity(self.sensitivity.get(), self.sensitivity.default_value()),
            key_action: self.key_action.get().0
        }
    }
}

impl Settings {
    /// Reads the settings from a parsed INI.
    pub fn from_ini(
        ini: &Ini
    ) -> Self {
        for sec in [GFA_SEC, GAME_SEC, KEYS_SEC] {
            if ini.section(Some(sec)).is_none() {
                log::warn!("[{}] is missing from {}, using defaults", sec, INI_FILE);
            }
        }

        Self::read(ini)
    }

    fn read(
        ini: &Ini
    ) -> Self {
        let mut fields = IniSettings::new();
        fields.read_ini(ini);
        fields.get()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::read(&Ini::new())
    }
}

/// Only schemes 1 and 2 exist.
fn clamp_scheme(
    name: &str,
    scheme: u8
) -> u8 {
    if (1..=2).contains(&scheme) {
        scheme
    } else {
        log::warn!("{}={} does not exist, using 1", name, scheme);
        1
    }
}

fn clamp_sensitivity(
    value: f32,
    default: f32
) -> f32 {
    if value.is_finite() && value > 0.0 { value } else { default }
}

///
/// Attempts to load the settings from the given INI file.
///
/// A missing file is not an error; the game creates it on first exit, so defaults are used.
/// The file is written by the game in its own code page, so it is decoded lossily.
///
pub fn load(
    path: &Path
) -> Result<Settings, SettingsError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("{} does not exist, using default settings", path.display());
            return Ok(Settings::default());
        },
        Err(e) => return Err(e.into())
    };

    let text = String::from_utf8_lossy(&bytes);
    let ini = Ini::load_from_str_opt(&text, ParseOption { enabled_quote: false, enabled_escape: false })?;
    let settings = Settings::from_ini(&ini);
    log::info!("Loaded settings: {:?}", settings);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(
        text: &str
    ) -> Settings {
        Settings::from_ini(&Ini::load_from_str(text).unwrap())
    }

    #[test]
    fn missing_sections_use_defaults() {
        let s = parse("[PERFORMANCE]\nsightValue=4\n");
        assert!(s.enabled && s.ranged && s.spells && s.strafing);
        assert_eq!(s.scheme_ranged, 1);
        assert_eq!(s.scheme_spells, 1);
        assert_eq!(s.sensitivity, 0.5);
        assert_eq!(s.key_action, 0x1d);
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn reads_every_field() {
        let s = parse(concat!(
            "[GAME]\nmouseSensitivity=0.75\n",
            "[KEYS]\nkeyAction=2a000000\n",
            "[GFA]\nfreeAimingEnabled=1\nfreeAimingRanged=true\nfreeAimingSpells=0\n",
            "ctrlSchemeRanged=2\nctrlSchemeSpells=2\nstrafing=false\n"
        ));
        assert!(s.enabled && s.ranged);
        assert!(!s.spells && !s.strafing);
        assert_eq!((s.scheme_ranged, s.scheme_spells), (2, 2));
        assert_eq!(s.sensitivity, 0.75);
        assert_eq!(s.key_action, 0x2a);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let s = parse("[GFA]\nctrlSchemeRanged=3\nctrlSchemeSpells=0\n[GAME]\nmouseSensitivity=-1\n");
        assert_eq!((s.scheme_ranged, s.scheme_spells), (1, 1));
        assert_eq!(s.sensitivity, 0.5);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("gfa-settings-test-does-not-exist.ini");
        assert_eq!(load(&path).unwrap(), Settings::default());
    }

    #[test]
    fn files_in_the_games_code_page_still_load() {
        let path = std::env::temp_dir().join(format!("gfa-settings-test-{}.ini", std::process::id()));
        let mut bytes = b"[GAME]\nplayerName=J\xe4ger\n[GFA]\nstrafing=0\n".to_vec();
        bytes.extend_from_slice(b"ctrlSchemeRanged=2\n");
        std::fs::write(&path, bytes).unwrap();

        let s = load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(!s.strafing);
        assert_eq!(s.scheme_ranged, 2);
    }
}
