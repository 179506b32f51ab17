//! Shared test doubles for the scheduler suite

use crate::memory::{
    MemoryError, MemoryResult, PagingObserver, PhysicalAddress, VmBackend, VmControlBlock,
};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use spin::Mutex;

/// Observable state of a [`MockVm`], shared with the test body.
#[derive(Default)]
pub struct MockVmState {
    created: AtomicUsize,
    released: AtomicUsize,
    duplicated: AtomicUsize,
    fail_next_create: AtomicBool,
    fail_duplicate: AtomicBool,
    next_pd: AtomicUsize,
}

impl MockVmState {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn duplicated(&self) -> usize {
        self.duplicated.load(Ordering::SeqCst)
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_duplicate(&self) {
        self.fail_duplicate.store(true, Ordering::SeqCst);
    }
}

/// VM backend double: hands out fake page directories and fails on demand.
pub struct MockVm {
    pub state: Arc<MockVmState>,
}

impl MockVm {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockVmState::default()),
        }
    }

    pub fn with_state(state: Arc<MockVmState>) -> Self {
        Self { state }
    }
}

impl VmBackend for MockVm {
    fn create_address_space(&self) -> MemoryResult<VmControlBlock> {
        if self.state.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(MemoryError::AddressSpaceExhausted);
        }
        let pd = 0x1000 + 0x1000 * self.state.next_pd.fetch_add(1, Ordering::SeqCst);
        self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(VmControlBlock::new(PhysicalAddress::new(pd)))
    }

    fn duplicate_address_space(
        &self,
        src: &VmControlBlock,
        dst: &mut VmControlBlock,
    ) -> MemoryResult<()> {
        if self.state.fail_duplicate.load(Ordering::SeqCst) {
            return Err(MemoryError::DuplicationFailed { reason: "injected" });
        }
        dst.set_mapped_bytes(src.mapped_bytes());
        self.state.duplicated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release_address_space(&self, _vm: &mut VmControlBlock) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Paging observer double recording every child registration. The `seen`
/// handle is cloned out before the observer is boxed into a scheduler.
#[derive(Default)]
pub struct RecordingObserver {
    pub seen: Arc<Mutex<Vec<(PhysicalAddress, PhysicalAddress)>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PagingObserver for RecordingObserver {
    fn register_child(&self, child: PhysicalAddress, parent: PhysicalAddress) {
        self.seen.lock().push((child, parent));
    }
}
