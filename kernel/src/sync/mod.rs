//! Synchronization discipline of the scheduler core
//!
//! Two independent mechanisms compose here:
//!
//! - `spin` locks serialize cross-core contention on shared structures;
//! - the interrupt mask ([`irq`]) makes a short region atomic with respect
//!   to the local timer/preemption path, which can reenter scheduler code.
//!
//! A structure touched by the interrupt handler (the runnable queue) takes
//! both: enter the non-preemptible section, then acquire the lock. Guards
//! drop in reverse order, so the lock is released before interrupts are
//! unmasked and the lock is never held while the core is preemptible.

pub mod irq;

pub use irq::{without_interrupts, IrqGuard};
