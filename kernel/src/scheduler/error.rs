//! Scheduler Error Handling
//!
//! Typed errors for the process/thread lifecycle core. Every failure of the
//! fork protocol is fully unwound before one of these is returned; the
//! syscall boundary collapses them to `-1`, the kinds exist for diagnostics
//! and tests.

use crate::memory::MemoryError;
use crate::scheduler::Tid;
use core::fmt;

/// Scheduler error types with diagnostic context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// Fork was invoked by a process with more than one live thread
    MultiThreadedForkDenied { threads: u32 },

    /// Raw storage for a control block could not be allocated
    OutOfMemory { requested: usize },

    /// PCB sub-resource initialization failed (address-space descriptor)
    PcbInitFailed { source: MemoryError },

    /// TCB sub-resource initialization failed (kernel stack)
    TcbInitFailed { tid: Tid, source: MemoryError },

    /// The TID table could not take the new entry
    RegistrationFailed { tid: Tid },

    /// The VM collaborator failed to duplicate the parent's address space
    VmDuplicationFailed { tid: Tid, source: MemoryError },

    /// Fork was invoked before a current thread was installed
    NoCurrentThread,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultiThreadedForkDenied { threads } => {
                write!(f, "fork denied: process has {} live threads", threads)
            }
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: requested {} bytes", requested)
            }
            Self::PcbInitFailed { source } => write!(f, "pcb init failed: {}", source),
            Self::TcbInitFailed { tid, source } => {
                write!(f, "tcb init failed for tid {}: {}", tid, source)
            }
            Self::RegistrationFailed { tid } => {
                write!(f, "tid table could not register tid {}", tid)
            }
            Self::VmDuplicationFailed { tid, source } => {
                write!(f, "address-space duplication failed for tid {}: {}", tid, source)
            }
            Self::NoCurrentThread => write!(f, "no current thread installed"),
        }
    }
}

impl SchedError {
    /// Should this error be logged?
    pub fn should_log(&self) -> bool {
        // An oversized process asking to fork is a caller mistake, not a
        // scheduler event worth a log line.
        !matches!(self, Self::MultiThreadedForkDenied { .. })
    }
}

/// Result type for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;
