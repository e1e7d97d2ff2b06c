//! Memory management subsystem
//!
//! Physical frames, per-process address spaces, and the error type both
//! report through.

pub mod address;
pub mod physical;
pub mod protection;
pub mod virtual_mem;

// Re-exports
pub use address::{page_round_up, PhysicalAddress, VirtualAddress, PAGE_SIZE};
pub use physical::{Frame, FrameAllocator, PhysicalMemory};
pub use protection::PageProtection;
pub use virtual_mem::{AddressSpace, UserMapper};

// Error type for memory operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    OutOfMemory,
    InvalidAddress,
    AlreadyMapped,
    NotMapped,
    PermissionDenied,
    AlignmentError,
    InvalidSize,
    InternalError(&'static str),
}

impl core::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            MemoryError::OutOfMemory => write!(f, "Out of memory"),
            MemoryError::InvalidAddress => write!(f, "Invalid address"),
            MemoryError::AlreadyMapped => write!(f, "Already mapped"),
            MemoryError::NotMapped => write!(f, "Not mapped"),
            MemoryError::PermissionDenied => write!(f, "Permission denied"),
            MemoryError::AlignmentError => write!(f, "Alignment error"),
            MemoryError::InvalidSize => write!(f, "Invalid size"),
            MemoryError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

pub type MemoryResult<T> = Result<T, MemoryError>;
