//! # Module IPC (Inter-Process Communication)
//!
//! Shared memory segments keyed by small integer ids.

pub mod shared_memory;

pub use shared_memory::{ShmError, ShmId, ShmResult, ShmStats, ShmTable};
