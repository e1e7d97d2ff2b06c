// src/lib.rs
// Point d'entrée de la bibliothèque du noyau
#![cfg_attr(not(test), no_std)]

// Import de alloc pour les allocations dynamiques
extern crate alloc;

// Modules du noyau
pub mod config;
pub mod ipc;
pub mod logger;
pub mod memory;
pub mod syscall;

use alloc::sync::Arc;

use config::KernelConfig;
use ipc::ShmTable;
use memory::{MemoryError, MemoryResult, PhysicalMemory};
use syscall::handlers::process::{Process, ProcessTable};

/// Everything the shared memory kernel calls operate on, built once at boot
pub struct Kernel {
    config: KernelConfig,
    /// Physical RAM and its frame allocator
    pub ram: PhysicalMemory,
    /// Segment registry
    pub shm: ShmTable,
    pub processes: ProcessTable,
}

impl Kernel {
    /// Brings up physical memory and an empty segment table
    pub fn boot(config: KernelConfig) -> MemoryResult<Self> {
        config.validate().map_err(|reason| {
            log::error!("invalid kernel configuration: {}", reason);
            MemoryError::InvalidSize
        })?;

        let ram = PhysicalMemory::new(config.ram_base, config.ram_frames)?;
        log::info!(
            "physical memory: {} frames at {:?}",
            ram.total_frames(),
            ram.base_address()
        );

        let shm = ShmTable::new();
        log::info!("shm table initialized ({} slots)", shm.capacity());

        Ok(Self {
            config,
            ram,
            shm,
            processes: ProcessTable::new(),
        })
    }

    /// Creates a process with a fresh address space
    pub fn spawn(&self, name: &str) -> MemoryResult<Arc<Process>> {
        self.processes.spawn(name, &self.config)
    }
}
