//! # Interface des Appels Système
//!
//! Numbered kernel-call entry points. Handlers return a non-negative value
//! on success and a negated errno on failure.

pub mod handlers;

use crate::Kernel;
use handlers::process::Process;

pub use handlers::{sys_shm_close, sys_shm_open};

/// Numéros des appels système
pub const SYS_SHM_OPEN: usize = 22;
pub const SYS_SHM_CLOSE: usize = 23;

pub const ENOSYS: i32 = 38;

/// Argument registers of one kernel call. `SYS_SHM_OPEN` writes its output
/// pointer back into `args[1]`.
pub type SyscallArgs = [usize; 6];

/// Who is calling, and into which kernel
#[derive(Clone, Copy)]
pub struct SyscallContext<'a> {
    pub kernel: &'a Kernel,
    pub current: &'a Process,
}

impl<'a> SyscallContext<'a> {
    pub fn new(kernel: &'a Kernel, current: &'a Process) -> Self {
        Self { kernel, current }
    }

    pub fn current_process(&self) -> &'a Process {
        self.current
    }
}

/// Dispatch a syscall
pub fn dispatch(ctx: &SyscallContext<'_>, number: usize, args: &mut SyscallArgs) -> isize {
    match number {
        SYS_SHM_OPEN => sys_shm_open(ctx, args[0] as isize, &mut args[1]),
        SYS_SHM_CLOSE => sys_shm_close(ctx, args[0] as isize),
        _ => {
            log::warn!(
                "pid {}: unknown syscall {}",
                ctx.current_process().pid,
                number
            );
            -(ENOSYS as isize)
        }
    }
}
