//! System V-style shared memory syscall handlers
//!
//! Implements shm_open and shm_close on top of the kernel's segment table.

use crate::ipc::shared_memory::ShmId;
use crate::syscall::SyscallContext;

/// Attach segment `id` to the calling process.
///
/// Returns 0 and stores the mapped address in `pointer`, or a negated errno
/// with `pointer` left as it was.
pub fn sys_shm_open(ctx: &SyscallContext<'_>, id: isize, pointer: &mut usize) -> isize {
    let process = ctx.current_process();
    log::debug!("sys_shm_open: pid={}, id={}", process.pid, id);

    let result = ShmId::new(id).and_then(|id| {
        let mut space = process.address_space();
        ctx.kernel.shm.attach(id, &ctx.kernel.ram, &mut *space)
    });

    match result {
        Ok(va) => {
            *pointer = va.value();
            0
        }
        Err(err) => {
            log::warn!("sys_shm_open: pid={}, id={}: {}", process.pid, id, err);
            err.as_isize()
        }
    }
}

/// Detach the calling process from segment `id`. The mapping stays in place.
pub fn sys_shm_close(ctx: &SyscallContext<'_>, id: isize) -> isize {
    let process = ctx.current_process();
    log::debug!("sys_shm_close: pid={}, id={}", process.pid, id);

    match ShmId::new(id).and_then(|id| ctx.kernel.shm.detach(id)) {
        Ok(()) => 0,
        Err(err) => {
            log::warn!("sys_shm_close: pid={}, id={}: {}", process.pid, id, err);
            err.as_isize()
        }
    }
}
