//! Shared Memory Module
//!
//! Id-keyed shared pages: processes that open the same id get the same
//! physical frame mapped into their address space.

pub mod mapping;
pub mod page;
pub mod pool;

pub use mapping::{map_shared_page, SHARED_PAGE_PROTECTION};
pub use page::{SegmentInfo, ShmId, ShmPage, SHM_CAPACITY};
pub use pool::{home_slot, ShmStats, ShmTable};

use core::fmt;

pub const EINVAL: i32 = 22;
pub const ENOMEM: i32 = 12;
pub const EFAULT: i32 = 14;
pub const ENOENT: i32 = 2;

/// Failure of a shared memory kernel call. None of them modify the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmError {
    /// Id outside `1..=SHM_CAPACITY`
    InvalidId,
    /// No frame left to back a new segment
    OutOfMemory,
    /// The caller's page table could not take the mapping
    MappingFailed,
    /// Close without a matching open
    ProtocolViolation,
}

impl ShmError {
    pub const fn errno(self) -> i32 {
        match self {
            ShmError::InvalidId => EINVAL,
            ShmError::OutOfMemory => ENOMEM,
            ShmError::MappingFailed => EFAULT,
            ShmError::ProtocolViolation => ENOENT,
        }
    }

    /// Negative value returned to user space
    pub const fn as_isize(self) -> isize {
        -(self.errno() as isize)
    }
}

impl fmt::Display for ShmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShmError::InvalidId => write!(f, "Invalid segment id"),
            ShmError::OutOfMemory => write!(f, "Out of memory"),
            ShmError::MappingFailed => write!(f, "Mapping failed"),
            ShmError::ProtocolViolation => write!(f, "Close without matching open"),
        }
    }
}

pub type ShmResult<T> = Result<T, ShmError>;
