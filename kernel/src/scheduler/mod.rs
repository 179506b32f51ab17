//! Ordonnanceur: process and thread lifecycle
//!
//! Process control blocks, thread control blocks, the TID table and the
//! runnable queue, plus the fork protocol built on top of them. The
//! kernel-wide instance lives behind [`init`]; everything else takes an
//! explicit `&Scheduler` so it stays testable.

pub mod config;
pub mod core;
pub mod error;
mod fork;
pub mod process;
pub mod stack;
pub mod thread;

#[cfg(test)]
pub(crate) mod testutil;

pub use self::config::SchedConfig;
pub use self::core::Scheduler;
pub use self::error::{SchedError, SchedResult};
pub use self::process::Pcb;
pub use self::stack::KernelStack;
pub use self::thread::{RegisterContext, RunQueueAdapter, Tcb, ThreadState};

use crate::memory::{PagingObserver, VmBackend};
use alloc::boxed::Box;
use spin::Once;

/// Thread identifier, unique per boot (modulo `u32` wraparound).
pub type Tid = u32;

static SCHEDULER: Once<Scheduler> = Once::new();

/// Install the kernel-wide scheduler. The first call wins; later calls
/// return the already-installed instance.
pub fn init(vm: Box<dyn VmBackend>, paging: Box<dyn PagingObserver>) -> &'static Scheduler {
    SCHEDULER.call_once(|| {
        log::info!("scheduler initialized");
        Scheduler::new(vm, paging)
    })
}

/// The kernel-wide scheduler, or `None` before [`init`].
pub fn try_scheduler() -> Option<&'static Scheduler> {
    SCHEDULER.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NullPagingObserver;
    use crate::scheduler::testutil::MockVm;

    #[test]
    fn test_global_init_is_idempotent() {
        let first = init(Box::new(MockVm::new()), Box::new(NullPagingObserver));
        let second = init(Box::new(MockVm::new()), Box::new(NullPagingObserver));
        assert!(std::ptr::eq(first, second));
        assert!(try_scheduler().is_some());
    }
}
