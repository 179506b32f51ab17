//! Scheduler Runtime Configuration
//!
//! Tunable limits read at use time, so a running system (or a test) can
//! adjust them without rebuilding scheduler state.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Default kernel stack size (16KB)
pub const DEFAULT_KERNEL_STACK_SIZE: usize = 16 * 1024;

/// Default cap on simultaneously registered threads
pub const DEFAULT_MAX_THREADS: usize = 4096;

/// Runtime configuration for the scheduler core
pub struct SchedConfig {
    /// Kernel stack size for newly created threads (bytes)
    kernel_stack_size: AtomicUsize,

    /// Maximum number of TIDs the table will register
    max_threads: AtomicUsize,
}

impl SchedConfig {
    pub const fn new() -> Self {
        Self {
            kernel_stack_size: AtomicUsize::new(DEFAULT_KERNEL_STACK_SIZE),
            max_threads: AtomicUsize::new(DEFAULT_MAX_THREADS),
        }
    }

    pub fn kernel_stack_size(&self) -> usize {
        self.kernel_stack_size.load(Ordering::Relaxed)
    }

    pub fn set_kernel_stack_size(&self, bytes: usize) {
        self.kernel_stack_size.store(bytes, Ordering::Relaxed);
        log::info!("kernel stack size set to {} bytes", bytes);
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads.load(Ordering::Relaxed)
    }

    pub fn set_max_threads(&self, max: usize) {
        self.max_threads.store(max, Ordering::Relaxed);
        log::info!("thread limit set to {}", max);
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::new()
    }
}
