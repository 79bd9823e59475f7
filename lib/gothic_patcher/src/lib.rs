//!
//! @file lib.rs
//! @author Gothic Free Aim Developers
//! @brief Library for applying patches and hooks to the Gothic binaries.
//! @bug no known bugs.
//!
//! The library is layered: the address table names the locations, the memory writer is the
//! only code which touches them, patches toggle byte diffs through the writer, and hooks
//! redirect control flow into handlers which may use all of the above.
//!

mod errors;
pub mod memory;
pub mod table;
mod sig;
pub mod patch;
pub mod asm;
pub mod hook;
#[cfg(any(test, feature = "mock"))] pub mod mock;

pub use errors::{PatchError, PatchResult};
pub use memory::{Memory, ProcessMemory};
pub use table::{detect, AddressEntry, AddressKind, AddressTable, VersionProbe};
pub use sig::{Opcode, Signature};
pub use patch::{Claim, DiffDef, Patch, PatchDef, PatchSet, RegionState};
pub use hook::{CallContext, CodeArena, Flow, Handler, Hook, HookCall, HookEngine, HookSite};
