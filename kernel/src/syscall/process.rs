//! Process management system call handlers

use crate::scheduler::{self, RegisterContext};

/// POSIX failure value at the syscall boundary.
pub const SYSCALL_ERROR: i64 = -1;

/// Fork the calling process.
///
/// `regs` is the caller's register snapshot captured at syscall entry.
/// Returns the child TID in the parent and `-1` on failure; the child
/// resumes from the same call with `0` in `rax`. The typed failure kind is
/// logged before it is collapsed.
pub fn sys_fork(regs: &RegisterContext) -> i64 {
    log::debug!("sys_fork");

    let sched = match scheduler::try_scheduler() {
        Some(sched) => sched,
        None => {
            log::warn!("sys_fork before scheduler init");
            return SYSCALL_ERROR;
        }
    };

    match sched.fork_process(regs) {
        Ok(tid) => i64::from(tid),
        Err(err) => {
            if err.should_log() {
                log::warn!("sys_fork failed: {}", err);
            }
            SYSCALL_ERROR
        }
    }
}
