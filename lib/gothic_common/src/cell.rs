//!
//! @file cell.rs
//! @author Gothic Free Aim Developers
//! @brief Thin wrapper around unsafe cell to mark it as sync. Allows one to avoid static mut.
//! @bug No known bugs.
//!
//! The plugin state is only ever touched from the game's main thread (attach, frame hook and
//! intercepted calls), which is the only reason this is sound.
//!

use std::cell::UnsafeCell;

#[repr(transparent)]
pub struct RacyCell<T>(UnsafeCell<T>);

impl<T> RacyCell<T> {
    /// Creates a new racy cell.
    pub const fn new(
        pl: T
    ) -> Self {
        Self(UnsafeCell::new(pl))
    }

    /// Gets a pointer to the cells data.
    pub fn get(
        &self
    ) -> *mut T {
        self.0.get()
    }
}

unsafe impl<T> Sync for RacyCell<T> {}
