//!
//! @file memory.rs
//! @author Gothic Free Aim Developers
//! @brief Provides functions for reading from/writing to the game code.
//! @bug No known bugs.
//!
//! The Memory trait is the only way the rest of the library touches the host. Nothing here
//! validates an address: the tables are verified offline, and a wrong address simply corrupts
//! the game. ProcessMemory is the one implementation which dereferences raw addresses.
//!

use std::mem::size_of;

/// The size of an x86 rel32 branch (opcode + operand).
pub const BRANCH_SIZE: usize = 5;

///
/// Raw access to the host's address space.
///
/// Every provided write method performs exactly one call to write_bytes(), so that the number
/// of writes performed by an operation is observable.
///
pub trait Memory {
    /// Copies buf.len() bytes starting at addr into buf.
    fn read_bytes(&self, addr: usize, buf: &mut [u8]);

    /// Copies bytes to addr. The write is visible to the host immediately.
    fn write_bytes(&mut self, addr: usize, bytes: &[u8]);

    /// Reads a single byte.
    fn read_u8(
        &self,
        addr: usize
    ) -> u8 {
        let mut b = [0; 1];
        self.read_bytes(addr, &mut b);
        b[0]
    }

    /// Reads a little-endian 32-bit word.
    fn read_u32(
        &self,
        addr: usize
    ) -> u32 {
        let mut b = [0; size_of::<u32>()];
        self.read_bytes(addr, &mut b);
        u32::from_le_bytes(b)
    }

    /// Reads a little-endian signed 32-bit integer.
    fn read_i32(
        &self,
        addr: usize
    ) -> i32 {
        self.read_u32(addr) as i32
    }

    /// Reads a 32-bit float.
    fn read_f32(
        &self,
        addr: usize
    ) -> f32 {
        f32::from_bits(self.read_u32(addr))
    }

    /// Writes a single byte.
    fn write_u8(
        &mut self,
        addr: usize,
        value: u8
    ) {
        self.write_bytes(addr, &[value]);
    }

    /// Writes a little-endian 32-bit word.
    fn write_u32(
        &mut self,
        addr: usize,
        value: u32
    ) {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    /// Writes a little-endian signed 32-bit integer.
    fn write_i32(
        &mut self,
        addr: usize,
        value: i32
    ) {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    /// Writes a 32-bit float.
    fn write_f32(
        &mut self,
        addr: usize,
        value: f32
    ) {
        self.write_u32(addr, value.to_bits());
    }

    ///
    /// Writes the given text followed by a nul terminator.
    ///
    /// The caller must know that the destination has room for text.len() + 1 bytes.
    ///
    fn write_string(
        &mut self,
        addr: usize,
        text: &str
    ) {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        self.write_bytes(addr, &bytes);
    }

    /// Gets the destination of the rel32 call/jump instruction at addr.
    fn read_call_target(
        &self,
        addr: usize
    ) -> usize {
        let rel = self.read_i32(addr + 1) as isize;
        (addr + BRANCH_SIZE).wrapping_add_signed(rel)
    }

    ///
    /// Rewrites the operand of the rel32 call/jump instruction at addr to reach target.
    ///
    /// Only the four operand bytes are written; the opcode is left alone. Targets further than
    /// 2GiB away are truncated, which cannot happen in a 32-bit host.
    ///
    fn write_call_target(
        &mut self,
        addr: usize,
        target: usize
    ) {
        let rel = target.wrapping_sub(addr + BRANCH_SIZE) as u32;
        self.write_u32(addr + 1, rel);
    }

    /// Checks whether the memory at addr currently holds exactly the given bytes.
    fn matches(
        &self,
        addr: usize,
        expected: &[u8]
    ) -> bool {
        let mut found = vec![0; expected.len()];
        self.read_bytes(addr, &mut found);
        found == expected
    }
}

/// The address space of the current process, accessed through raw pointers.
#[derive(Debug)]
pub struct ProcessMemory(());

impl ProcessMemory {
    ///
    /// Creates a handle to the address space of the current process.
    ///
    /// In order to use this function safely, every address later given to the returned object
    /// must be valid for the requested access. Nothing is checked at runtime.
    ///
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

impl Memory for ProcessMemory {
    fn read_bytes(
        &self,
        addr: usize,
        buf: &mut [u8]
    ) {
        unsafe {
            // SAFETY: The creator of this object vouched for every address.
            std::ptr::copy_nonoverlapping(addr as *const u8, buf.as_mut_ptr(), buf.len());
        }
    }

    fn write_bytes(
        &mut self,
        addr: usize,
        bytes: &[u8]
    ) {
        if bytes.is_empty() { return; }

        unsafe {
            // SAFETY: The creator of this object vouched for every address.
            use_region(addr, bytes.len(), || {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), addr as *mut u8, bytes.len());
            });
        }
    }
}

/// Temporarily marks the given memory region for read/write, then calls the given fn.
#[cfg(windows)]
unsafe fn use_region(
    addr: usize,
    size: usize,
    func: impl FnOnce()
) {
    use std::ffi::c_void;
    use windows_sys::Win32::System::Memory::{VirtualProtect, PAGE_EXECUTE_READWRITE};
    use windows_sys::Win32::System::Diagnostics::Debug::FlushInstructionCache;
    use windows_sys::Win32::System::Threading::GetCurrentProcess;

    let mut old_prot: u32 = 0;
    VirtualProtect(addr as *const c_void, size, PAGE_EXECUTE_READWRITE, &mut old_prot);
    func();
    VirtualProtect(addr as *const c_void, size, old_prot, &mut old_prot);
    FlushInstructionCache(GetCurrentProcess(), addr as *const c_void, size);
}

/// Outside of the game, the only memory we write is our own data, which is already writable.
#[cfg(not(windows))]
unsafe fn use_region(
    _addr: usize,
    _size: usize,
    func: impl FnOnce()
) {
    func();
}

///
/// Permanently marks the given region as executable, readable and writable.
///
/// Used once on the hook arena, which lives in the plugin's data section.
///
/// In order to use this function safely, the region must belong to this process.
///
#[cfg(windows)]
pub unsafe fn make_executable(
    addr: usize,
    size: usize
) -> bool {
    use std::ffi::c_void;
    use windows_sys::Win32::System::Memory::{VirtualProtect, PAGE_EXECUTE_READWRITE};

    let mut old_prot: u32 = 0;
    VirtualProtect(addr as *const c_void, size, PAGE_EXECUTE_READWRITE, &mut old_prot) != 0
}

/// Nothing outside of the game ever executes the arena.
#[cfg(not(windows))]
pub unsafe fn make_executable(
    _addr: usize,
    _size: usize
) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_memory_round_trips_words_and_strings() {
        let mut buf = [0u8; 32];
        let base = buf.as_mut_ptr() as usize;
        let mut mem = unsafe { ProcessMemory::new() };

        mem.write_u32(base, 0xdead_beef);
        mem.write_i32(base + 4, -2);
        mem.write_string(base + 8, "CAMMODGFA");

        assert_eq!(mem.read_u32(base), 0xdead_beef);
        assert_eq!(mem.read_i32(base + 4), -2);
        assert_eq!(mem.read_u8(base + 8), b'C');
        assert!(mem.matches(base + 8, b"CAMMODGFA\0"));
        assert_eq!(&buf[0..4], &[0xef, 0xbe, 0xad, 0xde]);
    }

    #[test]
    fn call_operands_are_relative_to_the_next_instruction() {
        let mut mem = crate::mock::MockMemory::new();
        mem.load(0x0050_0000, &[0xe8, 0, 0, 0, 0]);

        mem.write_call_target(0x0050_0000, 0x0060_0000);
        assert_eq!(mem.read_call_target(0x0050_0000), 0x0060_0000);
        assert_eq!(mem.read_u32(0x0050_0001), 0x0060_0000 - 0x0050_0005);

        mem.write_call_target(0x0050_0000, 0x0040_0000);
        assert_eq!(mem.read_call_target(0x0050_0000), 0x0040_0000);
        assert_eq!(mem.read_u8(0x0050_0000), 0xe8);
    }

    #[test]
    fn every_provided_write_is_one_write() {
        let mut mem = crate::mock::MockMemory::new();
        mem.write_u8(0x100, 1);
        mem.write_u32(0x104, 2);
        mem.write_f32(0x108, 1.5);
        mem.write_string(0x110, "abc");
        assert_eq!(mem.writes(), 4);
        assert_eq!(mem.read_f32(0x108), 1.5);
    }
}
