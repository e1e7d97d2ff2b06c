//! # Per-process address spaces
//!
//! A software page table (one entry per 4KB page) plus the process's
//! virtual-size high-water-mark. User loads and stores are resolved through
//! the table and land in physical RAM, so two address spaces mapping the same
//! frame observe each other's writes.

use alloc::collections::BTreeMap;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::UserMapper;
use crate::memory::{
    Frame, MemoryError, MemoryResult, PageProtection, PhysicalAddress, PhysicalMemory,
    VirtualAddress, PAGE_SIZE,
};

/// Default number of leaf entries an address space may hold
pub const DEFAULT_PAGE_TABLE_BUDGET: usize = 1024;

/// One installed translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    pub frame: Frame,
    pub protection: PageProtection,
}

/// A virtual address space
#[derive(Debug)]
pub struct AddressSpace {
    id: usize,
    /// Page-aligned virtual address -> entry
    page_table: BTreeMap<VirtualAddress, PageTableEntry>,
    /// Virtual-size high-water-mark
    size: usize,
    /// Exclusive upper bound of user mappings
    user_limit: usize,
    /// Stand-in for the page-table pages the kernel can spend on this space
    page_table_budget: usize,
}

static NEXT_ADDRESS_SPACE_ID: AtomicUsize = AtomicUsize::new(1);

fn generate_address_space_id() -> usize {
    NEXT_ADDRESS_SPACE_ID.fetch_add(1, Ordering::Relaxed)
}

impl AddressSpace {
    /// Creates an empty address space whose first `initial_size` bytes are
    /// considered in use (program image, stack, heap).
    pub fn new(initial_size: usize, user_limit: usize) -> MemoryResult<Self> {
        if initial_size > user_limit {
            return Err(MemoryError::InvalidSize);
        }
        Ok(Self {
            id: generate_address_space_id(),
            page_table: BTreeMap::new(),
            size: initial_size,
            user_limit,
            page_table_budget: DEFAULT_PAGE_TABLE_BUDGET,
        })
    }

    pub fn with_page_table_budget(mut self, budget: usize) -> Self {
        self.page_table_budget = budget;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn mapped_pages(&self) -> usize {
        self.page_table.len()
    }

    pub fn entry(&self, page: VirtualAddress) -> Option<PageTableEntry> {
        self.page_table.get(&page.align_down_to_page()).copied()
    }

    /// Translates `addr` to the physical address it maps to
    pub fn translate(&self, addr: VirtualAddress) -> Option<PhysicalAddress> {
        self.entry(addr)
            .map(|entry| entry.frame.address() + addr.page_offset())
    }

    /// Performs a user-mode byte load at `addr`
    pub fn load_byte(&self, ram: &PhysicalMemory, addr: VirtualAddress) -> MemoryResult<u8> {
        let entry = self.entry(addr).ok_or(MemoryError::NotMapped)?;
        if !entry.protection.is_user() || !entry.protection.is_readable() {
            return Err(MemoryError::PermissionDenied);
        }
        ram.read_byte(entry.frame.address() + addr.page_offset())
    }

    /// Performs a user-mode byte store at `addr`
    pub fn store_byte(
        &self,
        ram: &PhysicalMemory,
        addr: VirtualAddress,
        value: u8,
    ) -> MemoryResult<()> {
        let entry = self.entry(addr).ok_or(MemoryError::NotMapped)?;
        if !entry.protection.is_user() || !entry.protection.can_write() {
            return Err(MemoryError::PermissionDenied);
        }
        ram.write_byte(entry.frame.address() + addr.page_offset(), value)
    }
}

impl UserMapper for AddressSpace {
    fn size(&self) -> usize {
        self.size
    }

    fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    fn map_page(
        &mut self,
        page: VirtualAddress,
        frame: Frame,
        protection: PageProtection,
    ) -> MemoryResult<()> {
        if !page.is_page_aligned() {
            return Err(MemoryError::AlignmentError);
        }
        match page.value().checked_add(PAGE_SIZE) {
            Some(end) if end <= self.user_limit => {}
            _ => return Err(MemoryError::InvalidAddress),
        }
        if self.page_table.contains_key(&page) {
            return Err(MemoryError::AlreadyMapped);
        }
        if self.page_table.len() >= self.page_table_budget {
            return Err(MemoryError::OutOfMemory);
        }

        self.page_table.insert(page, PageTableEntry { frame, protection });
        log::trace!("as{}: mapped {:?} -> {:?}", self.id, page, frame.address());
        Ok(())
    }
}
