//! Kernel stack allocation
//!
//! Each TCB owns its kernel stack. Allocation goes through `try_reserve` so
//! exhaustion surfaces as an error instead of an allocator abort, and the
//! backing memory is freed with the TCB, so the rollback path never leaks
//! a stack.

use crate::memory::{MemoryError, MemoryResult, VirtualAddress};
use alloc::vec::Vec;

/// A thread's kernel stack
#[derive(Debug)]
pub struct KernelStack {
    buf: Vec<u8>,
}

impl KernelStack {
    /// Allocate a zeroed stack of `size` bytes.
    pub fn new(size: usize) -> MemoryResult<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| MemoryError::OutOfMemory { requested: size })?;
        buf.resize(size, 0);
        Ok(Self { buf })
    }

    /// Lowest address of the stack
    pub fn base(&self) -> VirtualAddress {
        VirtualAddress::new(self.buf.as_ptr() as usize)
    }

    /// One past the highest address (initial RSP)
    pub fn top(&self) -> VirtualAddress {
        self.base().add(self.buf.len())
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Check if an address lies within this stack
    pub fn contains(&self, addr: VirtualAddress) -> bool {
        addr >= self.base() && addr < self.top()
    }
}
