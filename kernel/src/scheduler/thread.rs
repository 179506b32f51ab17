//! Thread Control Block (TCB)
//!
//! A TCB owns its register snapshot and kernel stack and belongs to exactly
//! one PCB. The embedded `run_link` is the single linkage the scheduler
//! threads through both of its structures: the TID table keeps an
//! `Arc<Tcb>` clone, the runnable queue links the same allocation
//! intrusively, so there is never a second copy to drift out of sync.

use crate::memory::MemoryResult;
use crate::scheduler::process::Pcb;
use crate::scheduler::stack::KernelStack;
use crate::scheduler::Tid;
use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use intrusive_collections::{intrusive_adapter, LinkedListAtomicLink};

/// Thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Eligible for dispatch
    Runnable = 0,

    /// Currently on a CPU
    Running = 1,

    /// Waiting on an event
    Blocked = 2,

    /// Exited, awaiting reap
    Zombie = 3,
}

impl ThreadState {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Runnable),
            1 => Some(Self::Running),
            2 => Some(Self::Blocked),
            3 => Some(Self::Zombie),
            _ => None,
        }
    }

    pub fn is_schedulable(self) -> bool {
        matches!(self, Self::Runnable)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runnable => write!(f, "Runnable"),
            Self::Running => write!(f, "Running"),
            Self::Blocked => write!(f, "Blocked"),
            Self::Zombie => write!(f, "Zombie"),
        }
    }
}

/// Atomic thread state cell
pub struct AtomicThreadState {
    state: AtomicU8,
}

impl AtomicThreadState {
    pub const fn new(state: ThreadState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    pub fn load(&self) -> ThreadState {
        let value = self.state.load(Ordering::Acquire);
        ThreadState::from_u8(value).unwrap_or(ThreadState::Runnable)
    }

    pub fn store(&self, state: ThreadState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Saved register context (x86_64)
///
/// Snapshot of the invoking thread's registers taken at the syscall
/// boundary; seeds the child's execution state on fork.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterContext {
    pub rsp: u64,
    pub rip: u64,
    pub rflags: u64,

    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,

    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

impl RegisterContext {
    pub const fn zeroed() -> Self {
        Self {
            rsp: 0,
            rip: 0,
            rflags: 0,
            rax: 0,
            rbx: 0,
            rcx: 0,
            rdx: 0,
            rbp: 0,
            rdi: 0,
            rsi: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }

    /// Context for a forked child: identical to the parent snapshot except
    /// RAX, so the child resumes from the same fork call with return value 0.
    pub fn forked_child(&self) -> Self {
        Self { rax: 0, ..*self }
    }
}

/// Thread Control Block
pub struct Tcb {
    /// Unique thread ID
    tid: Tid,

    /// Owning process
    pcb: Arc<Pcb>,

    /// Current state
    state: AtomicThreadState,

    /// Saved context (seeds the first dispatch)
    context: RegisterContext,

    /// Kernel stack, freed with the TCB
    kernel_stack: KernelStack,

    /// Runnable-queue linkage (see module docs)
    run_link: LinkedListAtomicLink,
}

intrusive_adapter!(pub RunQueueAdapter = Arc<Tcb>: Tcb { run_link: LinkedListAtomicLink });

impl Tcb {
    /// Initialize a TCB bound to `pcb`.
    ///
    /// Fully succeeds or fully fails: the kernel stack is the only fallible
    /// sub-resource and is acquired before the thread is attached to the
    /// PCB, so a failure return leaves the PCB count untouched.
    pub fn init(
        pcb: &Arc<Pcb>,
        tid: Tid,
        state: ThreadState,
        context: RegisterContext,
        stack_size: usize,
    ) -> MemoryResult<Self> {
        let kernel_stack = KernelStack::new(stack_size)?;
        pcb.attach_thread();
        Ok(Self {
            tid,
            pcb: Arc::clone(pcb),
            state: AtomicThreadState::new(state),
            context,
            kernel_stack,
            run_link: LinkedListAtomicLink::new(),
        })
    }

    /// Release TCB-owned bookkeeping; storage is freed by the last `Arc`
    /// drop. Rollback path only: a TCB handed to the scheduler belongs to
    /// the scheduler.
    pub fn teardown(&self) {
        self.pcb.detach_thread();
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn pcb(&self) -> &Arc<Pcb> {
        &self.pcb
    }

    pub fn state(&self) -> ThreadState {
        self.state.load()
    }

    pub fn set_state(&self, state: ThreadState) {
        self.state.store(state);
    }

    pub fn context(&self) -> &RegisterContext {
        &self.context
    }

    pub fn kernel_stack(&self) -> &KernelStack {
        &self.kernel_stack
    }

    /// Whether this TCB currently sits on the runnable queue.
    pub fn is_queued(&self) -> bool {
        self.run_link.is_linked()
    }
}

impl fmt::Debug for Tcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tcb")
            .field("tid", &self.tid)
            .field("state", &self.state.load())
            .field("queued", &self.is_queued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryError;
    use crate::scheduler::testutil::MockVm;

    fn sample_context() -> RegisterContext {
        RegisterContext {
            rsp: 0x7fff_f000,
            rip: 0x40_1000,
            rflags: 0x202,
            rax: 99,
            rdi: 5,
            ..RegisterContext::zeroed()
        }
    }

    #[test]
    fn test_forked_child_context() {
        let parent = sample_context();
        let child = parent.forked_child();
        assert_eq!(child.rax, 0);
        assert_eq!(child.rsp, parent.rsp);
        assert_eq!(child.rip, parent.rip);
        assert_eq!(child.rdi, parent.rdi);
    }

    #[test]
    fn test_init_attaches_thread() {
        let vm = MockVm::new();
        let pcb = Arc::new(Pcb::init(&vm).unwrap());
        assert_eq!(pcb.thread_count(), 0);

        let tcb = Tcb::init(&pcb, 1, ThreadState::Runnable, sample_context(), 4096).unwrap();
        assert_eq!(pcb.thread_count(), 1);
        assert_eq!(tcb.tid(), 1);
        assert!(tcb.state().is_schedulable());
        assert!(!tcb.is_queued());

        tcb.teardown();
        assert_eq!(pcb.thread_count(), 0);
    }

    #[test]
    fn test_failed_init_leaves_pcb_untouched() {
        let vm = MockVm::new();
        let pcb = Arc::new(Pcb::init(&vm).unwrap());

        let err =
            Tcb::init(&pcb, 2, ThreadState::Runnable, sample_context(), usize::MAX / 2).unwrap_err();
        assert!(matches!(err, MemoryError::OutOfMemory { .. }));
        assert_eq!(pcb.thread_count(), 0);
    }
}
