//! System Call Handlers
//!
//! Organized by category:
//! - ipc_sysv: shared memory segments
//! - process: process identity and address spaces

pub mod ipc_sysv;
pub mod process;

pub use ipc_sysv::{sys_shm_close, sys_shm_open};
pub use process::{Pid, Process, ProcessTable};
