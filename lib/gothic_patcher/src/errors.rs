//!
//! @file errors.rs
//! @author Gothic Free Aim Developers
//! @brief Error reasons reported by the patcher.
//! @bug No known bugs.
//!
//! None of these are transient. An error here means the tables or the host do not match what
//! was authored, so callers log it and leave the game unpatched rather than retry.
//!

use gothic_common::GameVersion;
use thiserror::Error;

/// Describes why a patcher operation could not be completed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("symbol {0} is not in the {1} address table")]
    UnknownSymbol(String, GameVersion),

    #[error("patch {patch} at {addr:#x} does not hold its recorded {expected} bytes")]
    InvalidPatchState {
        patch: &'static str,
        addr: usize,
        expected: &'static str
    },

    #[error("patch {0} has differently sized original and replacement bytes")]
    LengthMismatch(&'static str),

    #[error("patches {0} and {1} write to overlapping memory")]
    Overlap(&'static str, &'static str),

    #[error("{name} at {addr:#x} did not match the expected code signature")]
    SignatureMismatch {
        name: &'static str,
        addr: usize
    },

    #[error("relative branch from {from:#x} to {to:#x} cannot be encoded")]
    OutOfRange {
        from: usize,
        to: usize
    },

    #[error("code arena is exhausted ({needed} bytes needed, {left} left)")]
    ArenaExhausted {
        needed: usize,
        left: usize
    },

    #[error("hook index {0} was never installed")]
    UnknownHook(u32),

    #[error("the running executable is not a supported Gothic build")]
    UnsupportedVersion,

    #[error("the address table was already selected for {0}")]
    AlreadySelected(GameVersion),

    #[error("address table for {0} is invalid: {1}")]
    InvalidTable(GameVersion, String)
}

/// The result of a patcher operation.
pub type PatchResult<T> = Result<T, PatchError>;
