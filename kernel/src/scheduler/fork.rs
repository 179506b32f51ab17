//! Fork protocol
//!
//! Forks the current single-threaded process into a new child process with
//! one thread: a fixed sequence of acquisitions whose partial results must
//! never leak. Each acquisition arms a compensation guard; guards are
//! declared in acquisition order, so an early return drops them in reverse
//! and unwinds exactly the steps already taken. Once the child is enqueued
//! every guard is disarmed and nothing past that point can fail.
//!
//! Pipeline:
//!   eligibility → child PCB → TID → child TCB → table registration →
//!   address-space duplication → paging notification → parent link →
//!   enqueue.
//!
//! Between registration and enqueue the child is visible to TID lookups but
//! not yet runnable. Duplication, the long step, deliberately runs inside
//! that window with no scheduler lock held.

use crate::memory::VmBackend;
use crate::scheduler::core::Scheduler;
use crate::scheduler::error::{SchedError, SchedResult};
use crate::scheduler::process::Pcb;
use crate::scheduler::thread::{RegisterContext, Tcb, ThreadState};
use crate::scheduler::Tid;
use alloc::sync::Arc;

/// Undoes a child PCB init: releases its fresh address space.
struct PcbRollback<'a> {
    vm: &'a dyn VmBackend,
    pcb: &'a Arc<Pcb>,
    armed: bool,
}

impl<'a> PcbRollback<'a> {
    fn arm(vm: &'a dyn VmBackend, pcb: &'a Arc<Pcb>) -> Self {
        Self { vm, pcb, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PcbRollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pcb.teardown(self.vm);
        }
    }
}

/// Undoes a child TCB init: detaches it from its PCB.
struct TcbRollback<'a> {
    tcb: &'a Arc<Tcb>,
    armed: bool,
}

impl<'a> TcbRollback<'a> {
    fn arm(tcb: &'a Arc<Tcb>) -> Self {
        Self { tcb, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TcbRollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.tcb.teardown();
        }
    }
}

/// Undoes a TID-table registration.
struct TableRollback<'a> {
    sched: &'a Scheduler,
    tid: Tid,
    armed: bool,
}

impl<'a> TableRollback<'a> {
    fn arm(sched: &'a Scheduler, tid: Tid) -> Self {
        Self { sched, tid, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TableRollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.sched.unregister_tid(self.tid);
        }
    }
}

impl Scheduler {
    /// Fork the current process.
    ///
    /// `regs` is the caller's register snapshot from the syscall boundary;
    /// the child starts from the same point with `rax = 0`. Returns the
    /// child's TID. Only single-threaded processes may fork.
    ///
    /// Any failure fully unwinds: no table entry, no queue entry, no child
    /// PCB, no retained address space. The consumed TID is not returned to
    /// the allocator; reissuing it could collide with stale references
    /// still naming it.
    pub fn fork_process(&self, regs: &RegisterContext) -> SchedResult<Tid> {
        let parent_tcb = self.current_thread().ok_or(SchedError::NoCurrentThread)?;
        let parent_pcb = Arc::clone(parent_tcb.pcb());
        log::debug!("fork requested by tid {}", parent_tcb.tid());

        // Eligibility: only a single-threaded process may fork. Snapshot
        // taken under pcb_lock; a quiet denial, not a scheduler event.
        let threads = self.thread_count_snapshot(&parent_pcb);
        if threads > 1 {
            return Err(SchedError::MultiThreadedForkDenied { threads });
        }

        // Child PCB with its own fresh address space, parented to the
        // caller's process.
        let child_pcb = Arc::new(Pcb::init(self.vm()).map_err(|source| {
            log::warn!("fork: child pcb init failed: {}", source);
            SchedError::PcbInitFailed { source }
        })?);
        child_pcb.set_parent(&parent_pcb);
        let pcb_guard = PcbRollback::arm(self.vm(), &child_pcb);

        let tid = self.allocate_tid();

        // Child thread: parent's snapshot with rax cleared, fresh kernel
        // stack, runnable but not yet queued.
        let child_tcb = match Tcb::init(
            &child_pcb,
            tid,
            ThreadState::Runnable,
            regs.forked_child(),
            self.config().kernel_stack_size(),
        ) {
            Ok(tcb) => Arc::new(tcb),
            Err(source) => {
                log::warn!("fork: tcb init failed for tid {}: {}", tid, source);
                return Err(SchedError::TcbInitFailed { tid, source });
            }
        };
        let tcb_guard = TcbRollback::arm(&child_tcb);

        // From here the child answers TID lookups, though it is not yet
        // runnable.
        self.register_tid(tid, Arc::clone(&child_tcb))?;
        let table_guard = TableRollback::arm(self, tid);

        // Copy the parent's address space into the child's. Longest step of
        // the protocol; no scheduler lock is held across it.
        let dup = parent_pcb.with_vm(|src| {
            child_pcb.with_vm_mut(|dst| self.vm().duplicate_address_space(src, dst))
        });
        if let Err(source) = dup {
            log::warn!(
                "fork: address-space duplication failed for tid {}: {}",
                tid,
                source
            );
            return Err(SchedError::VmDuplicationFailed { tid, source });
        }

        // Tell the paging layer about the new child space. Fire-and-forget.
        let child_pd = child_pcb.with_vm(|vm| vm.page_directory_base());
        let parent_pd = parent_pcb.with_vm(|vm| vm.page_directory_base());
        self.paging().register_child(child_pd, parent_pd);

        parent_pcb.add_running_child(tid, Arc::clone(&child_pcb));

        self.enqueue_runnable(Arc::clone(&child_tcb));

        // Committed. Nothing past the enqueue can fail.
        table_guard.disarm();
        tcb_guard.disarm();
        pcb_guard.disarm();

        log::info!(
            "fork complete: tid {} forked from tid {}",
            tid,
            parent_tcb.tid()
        );
        Ok(tid)
    }
}
