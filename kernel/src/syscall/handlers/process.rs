//! Processes and the process table
//!
//! A process here is an identity plus an address space. Scheduling state is
//! owned elsewhere; kernel calls only need to know who is calling and which
//! page table to install mappings in.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::{Mutex, MutexGuard, RwLock};

use crate::config::KernelConfig;
use crate::memory::{AddressSpace, MemoryResult, PhysicalMemory, UserMapper, VirtualAddress};

/// Process ID
pub type Pid = u64;

/// Process control block
#[derive(Debug)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    /// Only ever locked from this process's own kernel-call context
    address_space: Mutex<AddressSpace>,
}

impl Process {
    pub fn address_space(&self) -> MutexGuard<'_, AddressSpace> {
        self.address_space.lock()
    }

    /// Current virtual-size high-water-mark
    pub fn size(&self) -> usize {
        self.address_space.lock().size()
    }

    /// User-mode byte load, as the process itself would perform it
    pub fn load_byte(&self, ram: &PhysicalMemory, addr: VirtualAddress) -> MemoryResult<u8> {
        self.address_space.lock().load_byte(ram, addr)
    }

    /// User-mode byte store, as the process itself would perform it
    pub fn store_byte(
        &self,
        ram: &PhysicalMemory,
        addr: VirtualAddress,
        value: u8,
    ) -> MemoryResult<()> {
        self.address_space.lock().store_byte(ram, addr, value)
    }
}

/// Table of live processes
pub struct ProcessTable {
    processes: RwLock<BTreeMap<Pid, Arc<Process>>>,
    next_pid: AtomicU64,
}

impl ProcessTable {
    pub const fn new() -> Self {
        Self {
            processes: RwLock::new(BTreeMap::new()),
            next_pid: AtomicU64::new(1),
        }
    }

    /// Creates a process with a fresh address space sized per `config`
    pub fn spawn(&self, name: &str, config: &KernelConfig) -> MemoryResult<Arc<Process>> {
        let space = AddressSpace::new(config.initial_process_size, config.user_limit)?
            .with_page_table_budget(config.page_table_budget);
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);

        let process = Arc::new(Process {
            pid,
            name: String::from(name),
            address_space: Mutex::new(space),
        });
        self.processes.write().insert(pid, process.clone());

        log::debug!("spawned pid {} ({})", pid, name);
        Ok(process)
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        self.processes.read().get(&pid).cloned()
    }

    pub fn len(&self) -> usize {
        self.processes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_assigns_unique_pids() {
        let table = ProcessTable::new();
        let config = KernelConfig::default_config();

        let a = table.spawn("a", &config).unwrap();
        let b = table.spawn("b", &config).unwrap();

        assert_ne!(a.pid, b.pid);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b.pid).map(|p| p.name.clone()), Some(String::from("b")));
        assert!(table.get(999).is_none());
    }

    #[test]
    fn test_spawn_uses_initial_size() {
        let table = ProcessTable::new();
        let config = KernelConfig::default_config();

        let p = table.spawn("init", &config).unwrap();
        assert_eq!(p.size(), config.initial_process_size);
        assert_ne!(
            p.address_space().id(),
            table.spawn("sh", &config).unwrap().address_space().id()
        );
    }
}
