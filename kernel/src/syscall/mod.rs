//! System call boundary
//!
//! Thin handlers translating between the userland calling convention and
//! the kernel's typed results. All diagnostic context is logged here, then
//! erased: userland sees POSIX-shaped return values only.

pub mod process;

pub use process::sys_fork;
