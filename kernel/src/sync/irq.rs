//! Interrupt masking
//!
//! RAII guard over the local core's interrupt flag. On bare metal this is
//! `cli`/`sti` plus an RFLAGS.IF read; on hosted builds (tests) the flag is
//! simulated with an atomic so the masking discipline stays observable.

#[cfg(all(target_arch = "x86_64", target_os = "none", not(test)))]
mod arch {
    /// Désactive les interruptions
    #[inline(always)]
    pub fn disable_interrupts() {
        unsafe {
            core::arch::asm!("cli", options(nomem, nostack, preserves_flags));
        }
    }

    /// Active les interruptions
    #[inline(always)]
    pub fn enable_interrupts() {
        unsafe {
            core::arch::asm!("sti", options(nomem, nostack, preserves_flags));
        }
    }

    /// Vérifie si les interruptions sont activées
    #[inline(always)]
    pub fn interrupts_enabled() -> bool {
        let flags: u64;
        unsafe {
            core::arch::asm!("pushfq; pop {}", out(reg) flags, options(nomem, preserves_flags));
        }
        (flags & (1 << 9)) != 0 // IF flag (bit 9)
    }
}

#[cfg(all(not(all(target_arch = "x86_64", target_os = "none")), not(test)))]
mod arch {
    use core::sync::atomic::{AtomicBool, Ordering};

    static IF_SIMULATED: AtomicBool = AtomicBool::new(true);

    #[inline(always)]
    pub fn disable_interrupts() {
        IF_SIMULATED.store(false, Ordering::SeqCst);
    }

    #[inline(always)]
    pub fn enable_interrupts() {
        IF_SIMULATED.store(true, Ordering::SeqCst);
    }

    #[inline(always)]
    pub fn interrupts_enabled() -> bool {
        IF_SIMULATED.load(Ordering::SeqCst)
    }
}


pub use arch::interrupts_enabled;

/// Non-preemptible section guard.
///
/// Masks interrupts on the current core for its lifetime and restores the
/// previous state on drop, so nested guards compose: the mask is only
/// lifted when the outermost guard goes away.
pub struct IrqGuard {
    was_enabled: bool,
}

impl IrqGuard {
    #[inline]
    pub fn new() -> Self {
        let was_enabled = arch::interrupts_enabled();
        if was_enabled {
            arch::disable_interrupts();
        }
        Self { was_enabled }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    #[inline]
    fn drop(&mut self) {
        if self.was_enabled {
            arch::enable_interrupts();
        }
    }
}

/// Exécute une closure avec les interruptions désactivées
#[inline]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = IrqGuard::new();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_state() {
        assert!(interrupts_enabled());
        {
            let _g = IrqGuard::new();
            assert!(!interrupts_enabled());
        }
        assert!(interrupts_enabled());
    }

    #[test]
    fn test_guards_nest() {
        let outer = IrqGuard::new();
        {
            let _inner = IrqGuard::new();
            assert!(!interrupts_enabled());
        }
        // inner drop must not unmask while the outer guard lives
        assert!(!interrupts_enabled());
        drop(outer);
        assert!(interrupts_enabled());
    }

    #[test]
    fn test_without_interrupts() {
        let masked = without_interrupts(|| !interrupts_enabled());
        assert!(masked);
        assert!(interrupts_enabled());
    }
}
