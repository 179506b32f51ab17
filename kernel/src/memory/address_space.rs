//! # Espaces d'Adressage par Processus
//!
//! Descripteur d'espace d'adressage possédé par chaque PCB, plus les deux
//! collaborateurs externes consommés par le protocole de fork : le backend
//! VM (création / duplication / libération) et l'observateur de pagination
//! informé de chaque nouvel espace fils.
//!
//! Les algorithmes de copie de tables de pages et de COW vivent derrière
//! [`VmBackend`] ; ce module ne définit que le contrat.

use super::address::PhysicalAddress;
use super::MemoryResult;

/// Per-process address-space descriptor, owned by its PCB.
///
/// Holds the page-directory handle the dispatch layer loads on a context
/// switch, plus whatever bookkeeping the VM layer needs to tear the space
/// down again.
#[derive(Debug)]
pub struct VmControlBlock {
    /// Base of the top-level page directory for this address space
    page_directory_base: PhysicalAddress,

    /// Bytes currently mapped (maintained by the VM layer)
    mapped_bytes: usize,
}

impl VmControlBlock {
    pub const fn new(page_directory_base: PhysicalAddress) -> Self {
        Self {
            page_directory_base,
            mapped_bytes: 0,
        }
    }

    pub fn page_directory_base(&self) -> PhysicalAddress {
        self.page_directory_base
    }

    pub fn mapped_bytes(&self) -> usize {
        self.mapped_bytes
    }

    /// Called by the VM backend as it maps pages into this space.
    pub fn set_mapped_bytes(&mut self, bytes: usize) {
        self.mapped_bytes = bytes;
    }
}

/// The external VM collaborator.
///
/// `duplicate_address_space` may be long-running (page-table walk, COW
/// marking); the scheduler guarantees it is never invoked while holding a
/// scheduler lock. On failure the destination must be left untouched or
/// safely releasable.
pub trait VmBackend: Send + Sync {
    /// Carve out a fresh, empty address space.
    fn create_address_space(&self) -> MemoryResult<VmControlBlock>;

    /// Populate `dst` with a copy (or COW alias) of `src`.
    fn duplicate_address_space(
        &self,
        src: &VmControlBlock,
        dst: &mut VmControlBlock,
    ) -> MemoryResult<()>;

    /// Return all resources of an address space to the VM layer.
    fn release_address_space(&self, vm: &mut VmControlBlock);
}

/// External paging observer, told about every successfully duplicated
/// address space. Fire-and-forget: no failure path is defined, so an
/// implementation that can fail must not be plugged in here.
pub trait PagingObserver: Send + Sync {
    /// A child address space `child` was cloned from `parent`.
    fn register_child(&self, child: PhysicalAddress, parent: PhysicalAddress);
}

/// Observer that ignores all notifications (bring-up, tests).
pub struct NullPagingObserver;

impl PagingObserver for NullPagingObserver {
    fn register_child(&self, _child: PhysicalAddress, _parent: PhysicalAddress) {}
}
