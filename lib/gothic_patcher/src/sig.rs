//!
//! @file sig.rs
//! @author Gothic Free Aim Developers
//! @brief Provides functions for defining and checking game code signatures.
//! @bug No known bugs.
//!

use std::fmt;

use crate::memory::Memory;

///
/// @brief Used to match code to pre-defined signatures.
///
/// Wildcards cover bytes which legitimately differ, such as relocated operands.
///
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Code(u8),
    Any
}

/// Identifies a distinct string of binary code within a Gothic binary.
#[derive(Copy, Clone, Debug)]
pub struct Signature(&'static [Opcode]);

/// Helper to print the bytes found in the games code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinarySig(pub Vec<u8>);

/// @brief Generates a new signature out of hex digits and question marks.
#[macro_export]
macro_rules! signature {
    ( $($sig:tt),+; $size:literal ) => {{
        let psize = [ $($crate::signature!(@munch $sig)),* ].len();
        if $size != psize {
            ::std::panic!("Signature size is incorrect.");
        }
        $crate::Signature::new(&[ $($crate::signature!(@munch $sig)),* ])
    }};

    ( @munch $op:literal ) => {
        $crate::Opcode::Code($op)
    };

    ( @munch ? ) => {
        $crate::Opcode::Any
    };
}

impl Signature {
    /// Creates a new signature structure.
    pub const fn new(
        sig: &'static [Opcode]
    ) -> Self {
        Self(sig)
    }

    /// Checks the given signature against the given memory location.
    pub fn check(
        &self,
        mem: &dyn Memory,
        addr: usize
    ) -> Result<(), BinarySig> {
        if self.0.is_empty() { return Ok(()); }

        let found = BinarySig::read(mem, addr, self.0.len());
        let diff = self.0.iter().zip(found.0.iter()).filter(|(op, b)| match op {
            Opcode::Code(c) => c != *b,
            Opcode::Any => false
        }).count();

        if diff > 0 { Err(found) } else { Ok(()) }
    }

    /// Gets the opcodes of the signature.
    pub fn ops(
        &self
    ) -> &'static [Opcode] {
        self.0
    }

    /// Checks how long the signature is.
    pub fn len(
        &self
    ) -> usize {
        self.0.len()
    }

    /// Checks if the signature matches nothing.
    pub fn is_empty(
        &self
    ) -> bool {
        self.0.is_empty()
    }
}

impl BinarySig {
    /// Copies len bytes of game code at addr.
    pub fn read(
        mem: &dyn Memory,
        addr: usize,
        len: usize
    ) -> Self {
        let mut buf = vec![0; len];
        mem.read_bytes(addr, &mut buf);
        Self(buf)
    }
}

impl fmt::Display for Signature {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
    ) -> Result<(), fmt::Error> {
        write!(f, "{{ ")?;
        for op in self.0.iter() {
            if let Opcode::Code(b) = op {
                write!(f, "{:02x} ", b)?;
            } else {
                write!(f, "?? ")?;
            }
        }
        write!(f, "}}")
    }
}

impl fmt::Display for BinarySig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
    ) -> Result<(), fmt::Error> {
        write!(f, "{{ ")?;
        for b in self.0.iter() {
            write!(f, "{:02x} ", b)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMemory;

    static SIG: Signature = crate::signature![0x8b, ?, 0x24, 0x04; 4];

    #[test]
    fn wildcards_match_anything() {
        let mut mem = MockMemory::new();
        mem.load(0x1000, &[0x8b, 0x4c, 0x24, 0x04]);
        assert!(SIG.check(&mem, 0x1000).is_ok());

        mem.load(0x1001, &[0x44]);
        assert!(SIG.check(&mem, 0x1000).is_ok());
    }

    #[test]
    fn mismatch_reports_found_bytes() {
        let mut mem = MockMemory::new();
        mem.load(0x1000, &[0x8b, 0x4c, 0x25, 0x04]);
        let found = SIG.check(&mem, 0x1000).unwrap_err();
        assert_eq!(found.to_string(), "{ 8b 4c 25 04 }");
        assert_eq!(SIG.to_string(), "{ 8b ?? 24 04 }");
    }
}
