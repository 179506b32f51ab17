//! Scheduler state container
//!
//! The process-wide scheduler context: TID allocator, TID→TCB table,
//! runnable queue and the locks guarding each. This type only exposes
//! primitive, individually-guarded operations; multi-step protocols such
//! as fork are built on top of it (see `fork.rs`) and no other component
//! reaches into the table or queue directly.
//!
//! Locking discipline:
//! - the table mutex stands in for the allocation-class lock: inserting an
//!   entry may grow the backing storage, and allocation in this kernel is
//!   serialized;
//! - the runnable queue additionally requires a non-preemptible section,
//!   because the timer path mutates it from interrupt context;
//! - `pcb_lock` is a narrow lock over thread-count snapshots;
//! - no lock is ever held across address-space duplication.

use crate::memory::{PagingObserver, VmBackend};
use crate::scheduler::config::SchedConfig;
use crate::scheduler::error::{SchedError, SchedResult};
use crate::scheduler::process::Pcb;
use crate::scheduler::thread::{RegisterContext, RunQueueAdapter, Tcb, ThreadState};
use crate::scheduler::Tid;
use crate::sync::IrqGuard;
use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};
use hashbrown::HashMap;
use intrusive_collections::LinkedList;
use spin::Mutex;

/// Scheduler-wide state
pub struct Scheduler {
    /// Sole source of TID uniqueness. `allocate_tid` hands out the
    /// pre-increment value; wraparound reuse is an accepted design limit.
    next_tid: AtomicU32,

    /// TID → TCB map. Every entry is a live TCB; a queued TCB is always
    /// also present here while it stays runnable.
    tid_table: Mutex<HashMap<Tid, Arc<Tcb>>>,

    /// Runnable TCBs in dispatch order, linked intrusively through
    /// `Tcb::run_link`.
    run_queue: Mutex<LinkedList<RunQueueAdapter>>,

    /// Guards thread-count snapshots for the fork eligibility check
    pcb_lock: Mutex<()>,

    /// Thread currently on the CPU (single logical CPU slot)
    current: Mutex<Option<Arc<Tcb>>>,

    /// Runtime limits
    config: SchedConfig,

    /// Address-space collaborator
    vm: Box<dyn VmBackend>,

    /// Paging observer, told about each duplicated address space
    paging: Box<dyn PagingObserver>,
}

impl Scheduler {
    pub fn new(vm: Box<dyn VmBackend>, paging: Box<dyn PagingObserver>) -> Self {
        Self {
            next_tid: AtomicU32::new(0),
            tid_table: Mutex::new(HashMap::new()),
            run_queue: Mutex::new(LinkedList::new(RunQueueAdapter::new())),
            pcb_lock: Mutex::new(()),
            current: Mutex::new(None),
            config: SchedConfig::new(),
            vm,
            paging,
        }
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    pub(crate) fn vm(&self) -> &dyn VmBackend {
        self.vm.as_ref()
    }

    pub(crate) fn paging(&self) -> &dyn PagingObserver {
        self.paging.as_ref()
    }

    // ── TID allocator ───────────────────────────────────────────────────

    /// Hand out the next TID. Lock-free, always succeeds, linearizable
    /// across cores; returns the counter value before the increment.
    pub fn allocate_tid(&self) -> Tid {
        self.next_tid.fetch_add(1, Ordering::Relaxed)
    }

    // ── TID table ───────────────────────────────────────────────────────

    /// Insert a TCB under its TID, making it visible to concurrent
    /// lookups. Fails (propagated, never retried) when the table cannot
    /// take another entry.
    pub fn register_tid(&self, tid: Tid, tcb: Arc<Tcb>) -> SchedResult<()> {
        let mut table = self.tid_table.lock();
        if table.len() >= self.config.max_threads() {
            log::warn!(
                "tid table refused tid {}: {} live threads at limit",
                tid,
                table.len()
            );
            return Err(SchedError::RegistrationFailed { tid });
        }
        if table.try_reserve(1).is_err() {
            log::warn!("tid table could not grow for tid {}", tid);
            return Err(SchedError::RegistrationFailed { tid });
        }
        let prev = table.insert(tid, tcb);
        debug_assert!(prev.is_none(), "tid {} registered twice", tid);
        Ok(())
    }

    /// Remove a previously registered entry. Rollback path only: the
    /// caller must know the TID is registered.
    pub fn unregister_tid(&self, tid: Tid) {
        let removed = self.tid_table.lock().remove(&tid);
        debug_assert!(removed.is_some(), "unregister of unknown tid {}", tid);
    }

    /// Look up a live TCB by TID.
    ///
    /// A hit may be in the registered-but-not-yet-runnable window of an
    /// in-flight fork: present here, not yet on the runnable queue.
    /// Callers must tolerate that state.
    pub fn lookup(&self, tid: Tid) -> Option<Arc<Tcb>> {
        self.tid_table.lock().get(&tid).cloned()
    }

    /// Number of registered threads.
    pub fn thread_count(&self) -> usize {
        self.tid_table.lock().len()
    }

    // ── Runnable queue ──────────────────────────────────────────────────

    /// Append a TCB to the runnable queue.
    ///
    /// Runs inside a non-preemptible section composed with the queue lock:
    /// the timer path also mutates this queue on the local core.
    pub fn enqueue_runnable(&self, tcb: Arc<Tcb>) {
        let _irq = IrqGuard::new();
        self.run_queue.lock().push_back(tcb);
    }

    /// Pop the next runnable TCB for dispatch (FIFO).
    pub fn take_next_runnable(&self) -> Option<Arc<Tcb>> {
        let _irq = IrqGuard::new();
        self.run_queue.lock().pop_front()
    }

    /// Number of queued runnable threads.
    pub fn runnable_count(&self) -> usize {
        let _irq = IrqGuard::new();
        self.run_queue.lock().iter().count()
    }

    // ── PCB snapshots ───────────────────────────────────────────────────

    /// Read a PCB's live thread count under `pcb_lock`.
    pub fn thread_count_snapshot(&self, pcb: &Pcb) -> u32 {
        let _guard = self.pcb_lock.lock();
        pcb.thread_count()
    }

    // ── Current thread ──────────────────────────────────────────────────

    pub fn current_thread(&self) -> Option<Arc<Tcb>> {
        self.current.lock().clone()
    }

    pub fn set_current(&self, tcb: Arc<Tcb>) {
        *self.current.lock() = Some(tcb);
    }

    // ── Bootstrap ───────────────────────────────────────────────────────

    /// Create and install the root process: no parent, its first thread
    /// becomes the current thread. Same construction pipeline as fork,
    /// minus eligibility, duplication and enqueue: the root is already
    /// running, not waiting for dispatch.
    pub fn init_root_process(&self, regs: &RegisterContext) -> SchedResult<Tid> {
        let pcb = Arc::new(
            Pcb::init(self.vm())
                .map_err(|source| SchedError::PcbInitFailed { source })?,
        );

        let tid = self.allocate_tid();
        let tcb = match Tcb::init(
            &pcb,
            tid,
            ThreadState::Running,
            *regs,
            self.config.kernel_stack_size(),
        ) {
            Ok(tcb) => Arc::new(tcb),
            Err(source) => {
                pcb.teardown(self.vm());
                return Err(SchedError::TcbInitFailed { tid, source });
            }
        };

        if let Err(err) = self.register_tid(tid, Arc::clone(&tcb)) {
            tcb.teardown();
            pcb.teardown(self.vm());
            return Err(err);
        }

        self.set_current(Arc::clone(&tcb));
        log::info!("root process ready, tid {}", tid);
        Ok(tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::testutil::{MockVm, RecordingObserver};
    use static_assertions::assert_impl_all;

    assert_impl_all!(Scheduler: Send, Sync);

    fn scheduler() -> Scheduler {
        Scheduler::new(
            Box::new(MockVm::new()),
            Box::new(RecordingObserver::new()),
        )
    }

    fn make_tcb(sched: &Scheduler, tid: Tid) -> Arc<Tcb> {
        let pcb = Arc::new(Pcb::init(sched.vm()).unwrap());
        Arc::new(
            Tcb::init(
                &pcb,
                tid,
                ThreadState::Runnable,
                RegisterContext::zeroed(),
                4096,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_tid_allocation_is_monotonic() {
        let sched = scheduler();
        let a = sched.allocate_tid();
        let b = sched.allocate_tid();
        let c = sched.allocate_tid();
        assert_eq!((a, b, c), (0, 1, 2));
    }

    #[test]
    fn test_concurrent_tid_allocation_is_unique() {
        let sched = std::sync::Arc::new(scheduler());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let sched = std::sync::Arc::clone(&sched);
            handles.push(std::thread::spawn(move || {
                (0..200).map(|_| sched.allocate_tid()).collect::<Vec<_>>()
            }));
        }

        let mut all: Vec<Tid> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 8 * 200);
    }

    #[test]
    fn test_register_lookup_unregister() {
        let sched = scheduler();
        let tcb = make_tcb(&sched, 5);

        sched.register_tid(5, Arc::clone(&tcb)).unwrap();
        assert_eq!(sched.thread_count(), 1);
        assert!(Arc::ptr_eq(&sched.lookup(5).unwrap(), &tcb));

        sched.unregister_tid(5);
        assert_eq!(sched.thread_count(), 0);
        assert!(sched.lookup(5).is_none());
    }

    #[test]
    fn test_registration_respects_thread_limit() {
        let sched = scheduler();
        sched.config().set_max_threads(1);

        sched.register_tid(0, make_tcb(&sched, 0)).unwrap();
        let err = sched.register_tid(1, make_tcb(&sched, 1)).unwrap_err();
        assert_eq!(err, SchedError::RegistrationFailed { tid: 1 });
        assert_eq!(sched.thread_count(), 1);
    }

    #[test]
    fn test_runnable_queue_is_fifo() {
        let sched = scheduler();
        let first = make_tcb(&sched, 1);
        let second = make_tcb(&sched, 2);

        sched.enqueue_runnable(Arc::clone(&first));
        sched.enqueue_runnable(Arc::clone(&second));
        assert_eq!(sched.runnable_count(), 2);
        assert!(first.is_queued());

        let popped = sched.take_next_runnable().unwrap();
        assert_eq!(popped.tid(), 1);
        assert!(!popped.is_queued());
        assert_eq!(sched.take_next_runnable().unwrap().tid(), 2);
        assert!(sched.take_next_runnable().is_none());
    }

    #[test]
    fn test_root_bootstrap() {
        let sched = scheduler();
        let tid = sched.init_root_process(&RegisterContext::zeroed()).unwrap();

        assert_eq!(tid, 0);
        assert_eq!(sched.thread_count(), 1);
        assert_eq!(sched.runnable_count(), 0); // running, not queued
        let current = sched.current_thread().unwrap();
        assert_eq!(current.tid(), tid);
        assert_eq!(current.state(), ThreadState::Running);
    }
}
