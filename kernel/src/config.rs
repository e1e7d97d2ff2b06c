//! Boot-time kernel configuration

use crate::memory::{PhysicalAddress, PAGE_SIZE};

/// Parameters fixed for the lifetime of a `Kernel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Physical address of the first frame of RAM
    pub ram_base: PhysicalAddress,
    /// Number of 4KB frames of RAM
    pub ram_frames: usize,
    /// Exclusive upper bound of user virtual addresses
    pub user_limit: usize,
    /// Virtual size of a freshly spawned process
    pub initial_process_size: usize,
    /// Leaf page-table entries each process may hold
    pub page_table_budget: usize,
}

impl KernelConfig {
    /// Default configuration: 2MB of RAM at 1MB, 2GB of user address space
    pub const fn default_config() -> Self {
        const RAM_BASE: usize = 0x0010_0000;
        const RAM_FRAMES: usize = 512;
        const USER_LIMIT: usize = 0x8000_0000;
        const INITIAL_PROCESS_SIZE: usize = 4 * PAGE_SIZE;

        KernelConfig {
            ram_base: PhysicalAddress::new(RAM_BASE),
            ram_frames: RAM_FRAMES,
            user_limit: USER_LIMIT,
            initial_process_size: INITIAL_PROCESS_SIZE,
            page_table_budget: 1024,
        }
    }

    pub const fn with_ram_frames(mut self, frames: usize) -> Self {
        self.ram_frames = frames;
        self
    }

    pub const fn with_user_limit(mut self, limit: usize) -> Self {
        self.user_limit = limit;
        self
    }

    pub const fn with_page_table_budget(mut self, budget: usize) -> Self {
        self.page_table_budget = budget;
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.ram_base.is_page_aligned() {
            return Err("ram_base must be page aligned");
        }
        if self.ram_frames == 0 {
            return Err("ram_frames must be non-zero");
        }
        if self.user_limit % PAGE_SIZE != 0 {
            return Err("user_limit must be page aligned");
        }
        if self.initial_process_size > self.user_limit {
            return Err("initial_process_size exceeds user_limit");
        }
        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::default_config()
    }
}
