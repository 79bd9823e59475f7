//!
//! @file mock.rs
//! @author Gothic Free Aim Developers
//! @brief An in-memory stand-in for the host address space.
//! @bug No known bugs.
//!
//! Memory is sparse; bytes which were never loaded or written read as zero. Writes are counted
//! and logged, and a write budget can be set to emulate the plugin dying part way through a
//! sequence of writes.
//!

use std::collections::BTreeMap;

use crate::memory::Memory;

/// Sparse fake memory with write accounting and fault injection.
#[derive(Default, Debug, Clone)]
pub struct MockMemory {
    bytes: BTreeMap<usize, u8>,
    log: Vec<(usize, Vec<u8>)>,
    budget: Option<usize>,
    dropped: usize
}

impl MockMemory {
    /// Creates an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds memory with the given bytes. Not counted as a write.
    pub fn load(
        &mut self,
        addr: usize,
        data: &[u8]
    ) {
        for (i, b) in data.iter().enumerate() {
            self.bytes.insert(addr + i, *b);
        }
    }

    /// Copies out the given range.
    pub fn snapshot(
        &self,
        addr: usize,
        len: usize
    ) -> Vec<u8> {
        let mut out = vec![0; len];
        self.read_bytes(addr, &mut out);
        out
    }

    /// The number of writes which reached memory.
    pub fn writes(
        &self
    ) -> usize {
        self.log.len()
    }

    /// The writes which reached memory, in order.
    pub fn write_log(
        &self
    ) -> &[(usize, Vec<u8>)] {
        &self.log
    }

    /// The start addresses of every write which reached memory, in order.
    pub fn written_addrs(
        &self
    ) -> Vec<usize> {
        self.log.iter().map(|(a, _)| *a).collect()
    }

    /// Forgets all recorded writes without touching memory.
    pub fn clear_log(
        &mut self
    ) {
        self.log.clear();
        self.dropped = 0;
    }

    ///
    /// Lets only the next n writes through. Every later write is silently dropped, as if the
    /// writer had been torn down between two writes.
    ///
    pub fn fail_after(
        &mut self,
        n: usize
    ) {
        self.budget = Some(n);
    }

    /// The number of writes dropped by fault injection.
    pub fn dropped(
        &self
    ) -> usize {
        self.dropped
    }
}

impl Memory for MockMemory {
    fn read_bytes(
        &self,
        addr: usize,
        buf: &mut [u8]
    ) {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.bytes.get(&(addr + i)).copied().unwrap_or(0);
        }
    }

    fn write_bytes(
        &mut self,
        addr: usize,
        data: &[u8]
    ) {
        if let Some(budget) = self.budget.as_mut() {
            if *budget == 0 {
                self.dropped += 1;
                return;
            }
            *budget -= 1;
        }

        self.load(addr, data);
        self.log.push((addr, data.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_injection_drops_later_writes() {
        let mut mem = MockMemory::new();
        mem.fail_after(1);
        mem.write_u8(0x10, 1);
        mem.write_u8(0x11, 2);
        assert_eq!(mem.snapshot(0x10, 2), vec![1, 0]);
        assert_eq!(mem.writes(), 1);
        assert_eq!(mem.dropped(), 1);
    }
}
