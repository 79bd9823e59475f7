//!
//! @file version.rs
//! @author Gothic Free Aim Developers
//! @brief Identifies the supported host executables.
//! @bug No known bugs.
//!
//! Both supported games are 32-bit MSVC builds loaded at their preferred image base, so every
//! address the patcher uses is absolute. The two builds share no addresses at all.
//!

use std::fmt;

/// The preferred (and, for both games, actual) image base of the host executable.
pub const IMAGE_BASE: usize = 0x0040_0000;

/// One of the supported host executables.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum GameVersion {
    /// Gothic 1, GOTHIC.EXE 1.08k_mod.
    Gothic1,

    /// Gothic 2: Night of the Raven, Gothic2.exe 2.6 (fix).
    Gothic2
}

impl GameVersion {
    /// Every version the patcher knows about, in detection order.
    pub const ALL: [GameVersion; 2] = [GameVersion::Gothic1, GameVersion::Gothic2];

    /// Gets the file name of the host executable.
    pub const fn executable(
        self
    ) -> &'static str {
        match self {
            Self::Gothic1 => "GOTHIC.EXE",
            Self::Gothic2 => "Gothic2.exe"
        }
    }

    /// Checks if this build has the configurable control schemes (Gothic 2 only).
    pub const fn has_control_schemes(
        self
    ) -> bool {
        matches!(self, Self::Gothic2)
    }
}

impl fmt::Display for GameVersion {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
    ) -> Result<(), fmt::Error> {
        match self {
            Self::Gothic1 => write!(f, "Gothic 1 (1.08k_mod)"),
            Self::Gothic2 => write!(f, "Gothic 2 NotR (2.6 fix)")
        }
    }
}
