//!
//! @file asm.rs
//! @author Gothic Free Aim Developers
//! @brief A tiny x86 assembler for the few instructions our hooks are built from.
//! @bug No known bugs.
//!
//! Only fixed-length instructions are supported. Anything else is copied verbatim from the game,
//! and is never decoded.
//!

use crate::errors::{PatchError, PatchResult};
use crate::memory::{Memory, BRANCH_SIZE};

/// Encodes a x86 +rd register index.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Register {
    Eax = 0,
    Ecx = 1,
    Edx = 2,
    Ebx = 3,
    Esp = 4,
    Ebp = 5,
    Esi = 6,
    Edi = 7
}

/// Encodes the addressing mode of an instruction, or its opcode.
#[derive(Copy, Clone, Debug)]
pub enum Encoding<'a> {
    PushFlags,
    PopFlags,
    PushAll,
    PopAll,
    Push(Register),
    PushImmD,
    CallRelative,
    JumpRelative,
    JumpIndirect,
    AddEspImmSH,
    LeaEspDispSH,
    Nop,
    RelativeD(usize),
    AbsoluteSH(i8),
    AbsoluteD(u32),
    Verbatim(&'a [u8])
}

/// Represents an assembled sequence of instructions to be written at a fixed address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assembly {
    addr: usize,
    buf: Vec<u8>
}

impl Assembly {
    /// Assembles the given encoding for the given address.
    pub fn new(
        addr: usize,
        chunks: &[Encoding<'_>]
    ) -> PatchResult<Self> {
        let mut this = Self { addr, buf: Vec::new() };

        for chunk in chunks.iter() {
            match chunk {
                Encoding::PushFlags => this.append(&[0x9c]),
                Encoding::PopFlags => this.append(&[0x9d]),
                Encoding::PushAll => this.append(&[0x60]),
                Encoding::PopAll => this.append(&[0x61]),
                Encoding::Push(reg) => this.append(&[0x50 + (*reg as u8)]),
                Encoding::PushImmD => this.append(&[0x68]),
                Encoding::CallRelative => this.append(&[0xe8]),
                Encoding::JumpRelative => this.append(&[0xe9]),
                Encoding::JumpIndirect => this.append(&[0xff, 0x25]),
                Encoding::AddEspImmSH => this.append(&[0x83, 0xc4]),
                Encoding::LeaEspDispSH => this.append(&[0x8d, 0x64, 0x24]),
                Encoding::Nop => this.append(&[0x90]),
                Encoding::RelativeD(target) => {
                    let next = this.addr + this.buf.len() + std::mem::size_of::<i32>();
                    let rel = relative(next, *target)?;
                    this.append(&rel.to_le_bytes());
                },
                Encoding::AbsoluteSH(h) => this.append(&[*h as u8]),
                Encoding::AbsoluteD(d) => this.append(&d.to_le_bytes()),
                Encoding::Verbatim(s) => this.append(s)
            }
        }

        Ok(this)
    }

    ///
    /// Assembles a jump from addr to target, padded with NOPs to exactly len bytes.
    ///
    /// The padding is never executed; it only keeps the overwritten region disassemblable.
    ///
    pub fn jump(
        addr: usize,
        target: usize,
        len: usize
    ) -> PatchResult<Self> {
        let mut this = Self::new(addr, &[Encoding::JumpRelative, Encoding::RelativeD(target)])?;
        while this.buf.len() < len {
            this.append(&[0x90]);
        }
        Ok(this)
    }

    /// Appends the given bytes to the buffer.
    fn append(
        &mut self,
        s: &[u8]
    ) {
        self.buf.extend_from_slice(s);
    }

    /// Gets the assembled bytes.
    pub fn bytes(
        &self
    ) -> &[u8] {
        &self.buf
    }

    /// Gets the number of assembled bytes.
    pub fn len(
        &self
    ) -> usize {
        self.buf.len()
    }

    /// Checks if nothing was assembled.
    pub fn is_empty(
        &self
    ) -> bool {
        self.buf.is_empty()
    }

    /// Writes the code to its address, in a single write.
    pub fn apply(
        &self,
        mem: &mut dyn Memory
    ) {
        mem.write_bytes(self.addr, &self.buf);
    }

    /// Verifies that the code at its address is this code.
    pub fn verify(
        &self,
        mem: &dyn Memory
    ) -> bool {
        mem.matches(self.addr, &self.buf)
    }
}

/// Computes the rel32 operand which reaches target from an instruction ending at next.
pub fn relative(
    next: usize,
    target: usize
) -> PatchResult<i32> {
    (target as i64 - next as i64).try_into().map_err(|_| PatchError::OutOfRange { from: next, to: target })
}

///
/// Rewrites the rel32 operand at offset in code, which was copied from src, so that the copy at
/// dst branches to the same place.
///
pub fn relocate(
    code: &mut [u8],
    offset: usize,
    src: usize,
    dst: usize
) -> PatchResult<()> {
    let field = offset..offset + std::mem::size_of::<i32>();
    let mut rel = [0; 4];
    rel.copy_from_slice(&code[field.clone()]);

    let next = offset + std::mem::size_of::<i32>();
    let target = (src + next).wrapping_add_signed(i32::from_le_bytes(rel) as isize);
    code[field].copy_from_slice(&relative(dst + next, target)?.to_le_bytes());
    Ok(())
}

/// The length of a rel32 jump, which is the smallest region a hook can redirect.
pub const MIN_HOOK_SIZE: usize = BRANCH_SIZE;
