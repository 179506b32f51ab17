//! Process Control Block (PCB)
//!
//! Per-process metadata: the owned address-space descriptor, the live
//! thread count, a navigational link to the forking parent and the set of
//! running children recorded at fork time (consumed later by wait/exit).

use crate::memory::{MemoryResult, VmBackend, VmControlBlock};
use crate::scheduler::Tid;
use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicU32, Ordering};
use spin::Mutex;

/// Process control block
pub struct Pcb {
    /// Forking parent. Navigational only: a `Weak` link never keeps the
    /// parent alive, and the root process has none.
    parent: Mutex<Option<Weak<Pcb>>>,

    /// Live threads belonging to this process. Snapshots for the fork
    /// eligibility check are taken under the scheduler's `pcb_lock`.
    num_threads: AtomicU32,

    /// Owned address-space descriptor. Behind a lock so duplication can
    /// write the child descriptor while the parent side is read.
    vm: Mutex<VmControlBlock>,

    /// Running children, keyed by the child's TID at link time
    children: Mutex<BTreeMap<Tid, Arc<Pcb>>>,
}

impl Pcb {
    /// Initialize a PCB with a fresh address space.
    ///
    /// Fully succeeds or fully fails: if the VM layer cannot carve out an
    /// address space, nothing was committed and the value can simply be
    /// dropped.
    pub fn init(vm_backend: &dyn VmBackend) -> MemoryResult<Self> {
        let vm = vm_backend.create_address_space()?;
        Ok(Self {
            parent: Mutex::new(None),
            num_threads: AtomicU32::new(0),
            vm: Mutex::new(vm),
            children: Mutex::new(BTreeMap::new()),
        })
    }

    /// Release PCB-owned resources: the address space goes back to the VM
    /// layer, the child list is dropped. Storage itself is freed by the
    /// last `Arc` drop.
    pub fn teardown(&self, vm_backend: &dyn VmBackend) {
        vm_backend.release_address_space(&mut self.vm.lock());
        self.children.lock().clear();
    }

    /// Record the forking parent. Called once, right after `init`.
    pub fn set_parent(&self, parent: &Arc<Pcb>) {
        *self.parent.lock() = Some(Arc::downgrade(parent));
    }

    /// The forking parent, if it is still alive.
    pub fn parent(&self) -> Option<Arc<Pcb>> {
        self.parent.lock().as_ref().and_then(Weak::upgrade)
    }

    pub fn thread_count(&self) -> u32 {
        self.num_threads.load(Ordering::Acquire)
    }

    /// A thread now belongs to this process.
    pub fn attach_thread(&self) {
        self.num_threads.fetch_add(1, Ordering::AcqRel);
    }

    /// A thread no longer belongs to this process.
    pub fn detach_thread(&self) {
        let prev = self.num_threads.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "thread count underflow");
    }

    /// Append a forked child, keyed by its first thread's TID.
    pub fn add_running_child(&self, tid: Tid, child: Arc<Pcb>) {
        self.children.lock().insert(tid, child);
    }

    pub fn running_child(&self, tid: Tid) -> Option<Arc<Pcb>> {
        self.children.lock().get(&tid).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.children.lock().len()
    }

    /// Run `f` against the address-space descriptor.
    pub fn with_vm<R>(&self, f: impl FnOnce(&VmControlBlock) -> R) -> R {
        f(&self.vm.lock())
    }

    /// Run `f` against the address-space descriptor, mutably.
    pub fn with_vm_mut<R>(&self, f: impl FnOnce(&mut VmControlBlock) -> R) -> R {
        f(&mut self.vm.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::testutil::MockVm;

    #[test]
    fn test_init_creates_address_space() {
        let vm = MockVm::new();
        let pcb = Pcb::init(&vm).unwrap();

        assert_eq!(vm.state.created(), 1);
        assert!(pcb.with_vm(|vm| !vm.page_directory_base().is_null()));
        assert_eq!(pcb.thread_count(), 0);
        assert!(pcb.parent().is_none());
    }

    #[test]
    fn test_init_failure_commits_nothing() {
        let vm = MockVm::new();
        vm.state.fail_next_create();

        assert!(Pcb::init(&vm).is_err());
        assert_eq!(vm.state.created(), 0);
        assert_eq!(vm.state.released(), 0);
    }

    #[test]
    fn test_teardown_releases_address_space() {
        let vm = MockVm::new();
        let pcb = Pcb::init(&vm).unwrap();
        pcb.teardown(&vm);
        assert_eq!(vm.state.released(), 1);
    }

    #[test]
    fn test_parent_link_is_navigational() {
        let vm = MockVm::new();
        let parent = Arc::new(Pcb::init(&vm).unwrap());
        let child = Pcb::init(&vm).unwrap();
        child.set_parent(&parent);

        assert!(child.parent().is_some());
        drop(parent);
        // the child's back-reference must not have kept the parent alive
        assert!(child.parent().is_none());
    }

    #[test]
    fn test_running_children_keyed_by_tid() {
        let vm = MockVm::new();
        let parent = Pcb::init(&vm).unwrap();
        let child = Arc::new(Pcb::init(&vm).unwrap());

        parent.add_running_child(7, Arc::clone(&child));
        assert_eq!(parent.child_count(), 1);
        assert!(parent.running_child(7).is_some());
        assert!(parent.running_child(8).is_none());
    }
}
