//!
//! @file lib.rs
//! @author Gothic Free Aim Developers
//! @brief Top level module file for code shared by the Gothic patcher and plugins.
//! @bug No known bugs.
//!

pub mod cell;
pub mod log;
pub mod version;

pub use cell::RacyCell;
pub use version::GameVersion;
