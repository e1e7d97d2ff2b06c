//! Virtual memory: per-process address spaces

pub mod address_space;

pub use address_space::{AddressSpace, PageTableEntry};

use crate::memory::{Frame, MemoryResult, PageProtection, VirtualAddress};

/// What a kernel service needs from the calling process's address space in
/// order to install a page for it.
pub trait UserMapper {
    /// Virtual-size high-water-mark: every user address below it may be in use
    fn size(&self) -> usize;

    fn set_size(&mut self, size: usize);

    /// Installs one page-table entry mapping `page` to `frame`
    fn map_page(
        &mut self,
        page: VirtualAddress,
        frame: Frame,
        protection: PageProtection,
    ) -> MemoryResult<()>;
}
