//! Physical memory management

pub mod bitmap_allocator;

pub use bitmap_allocator::PhysicalMemory;

use crate::memory::{MemoryResult, PhysicalAddress};

/// Physical frame size (4KB)
pub const FRAME_SIZE: usize = 4096;

/// A 4KB frame of physical memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frame {
    pub start: PhysicalAddress,
}

impl Frame {
    pub const fn new(addr: PhysicalAddress) -> Self {
        Frame { start: addr }
    }

    pub const fn address(&self) -> PhysicalAddress {
        self.start
    }
}

/// Source of physical frames.
///
/// The shared-memory registry only ever needs one frame at a time, zeroed
/// before first use. `deallocate_frame` exists solely so a failed attach can
/// hand back a frame it never published; live segment frames are never
/// returned through it.
pub trait FrameAllocator {
    fn allocate_frame(&self) -> MemoryResult<Frame>;

    /// Fills the whole frame with zeroes. Fails if `frame` is not one this
    /// allocator handed out.
    fn zero_frame(&self, frame: Frame) -> MemoryResult<()>;

    fn deallocate_frame(&self, frame: Frame) -> MemoryResult<()>;
}
