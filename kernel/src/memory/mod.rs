//! Memory subsystem seams used by the scheduler
//!
//! The scheduler core does not implement paging: it owns address-space
//! descriptors and talks to the VM layer through the traits in
//! [`address_space`].

pub mod address;
pub mod address_space;

pub use address::{PhysicalAddress, VirtualAddress};
pub use address_space::{NullPagingObserver, PagingObserver, VmBackend, VmControlBlock};

use core::fmt;

/// Memory error types for the scheduler-facing seams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// Backing storage could not be allocated
    OutOfMemory { requested: usize },

    /// No page directory could be carved out for a new address space
    AddressSpaceExhausted,

    /// The VM layer failed to duplicate a source address space
    DuplicationFailed { reason: &'static str },

    /// An address handed across the seam was not valid
    InvalidAddress,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: requested {} bytes", requested)
            }
            Self::AddressSpaceExhausted => write!(f, "no free address space slot"),
            Self::DuplicationFailed { reason } => {
                write!(f, "address-space duplication failed: {}", reason)
            }
            Self::InvalidAddress => write!(f, "invalid address"),
        }
    }
}

/// Result type for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;
