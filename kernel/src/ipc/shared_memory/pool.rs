//! Shared memory segment registry
//!
//! A fixed table of `SHM_CAPACITY` slots behind one spin lock. Every
//! lookup-then-update sequence runs with the lock held, so concurrent first
//! attaches of an id elect exactly one creator and refcounts never lose an
//! update.

use spin::Mutex;

use super::mapping::map_shared_page;
use super::page::{SegmentInfo, ShmId, ShmPage, SHM_CAPACITY};
use super::{ShmError, ShmResult};
use crate::memory::{Frame, FrameAllocator, UserMapper, VirtualAddress};

/// Registry-wide counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmStats {
    /// Slots with a non-zero refcount
    pub live_segments: usize,
    /// Sum of all refcounts
    pub attachments: usize,
    /// Total number of slots
    pub capacity: usize,
}

/// Slot a new segment for `id` is placed in.
///
/// Keys and slots coincide (`id - 1`) for every valid id; this is the single
/// place that relationship is encoded.
pub fn home_slot(raw_id: isize) -> Option<usize> {
    let slot = usize::try_from(raw_id).ok()?.checked_sub(1)?;
    (slot < SHM_CAPACITY).then_some(slot)
}

/// The segment registry
pub struct ShmTable {
    pages: Mutex<[ShmPage; SHM_CAPACITY]>,
}

impl ShmTable {
    /// Builds the table with every slot free
    pub const fn new() -> Self {
        Self {
            pages: Mutex::new([ShmPage::empty(); SHM_CAPACITY]),
        }
    }

    pub const fn capacity(&self) -> usize {
        SHM_CAPACITY
    }

    /// Linear scan for the live slot registered under `id`
    fn find(pages: &[ShmPage; SHM_CAPACITY], id: ShmId) -> Option<(usize, Frame)> {
        pages
            .iter()
            .enumerate()
            .find_map(|(slot, page)| page.frame_for(id).map(|frame| (slot, frame)))
    }

    /// Opens segment `id`, creating it on first use, and maps its frame into
    /// `space`. Returns the virtual address the frame was mapped at.
    ///
    /// On error neither the registry nor `space` is modified.
    pub fn attach<A, M>(&self, id: ShmId, frames: &A, space: &mut M) -> ShmResult<VirtualAddress>
    where
        A: FrameAllocator + ?Sized,
        M: UserMapper + ?Sized,
    {
        let mut pages = self.pages.lock();

        let (slot, frame, created) = match Self::find(&pages, id) {
            Some((slot, frame)) => (slot, frame, false),
            None => {
                let slot = home_slot(id.get() as isize).ok_or(ShmError::InvalidId)?;
                let frame = frames.allocate_frame().map_err(|err| {
                    log::warn!("shm_open({}): frame allocation failed: {}", id, err);
                    ShmError::OutOfMemory
                })?;
                if let Err(err) = frames.zero_frame(frame) {
                    log::warn!("shm_open({}): cannot zero {:?}: {}", id, frame, err);
                    if let Err(err) = frames.deallocate_frame(frame) {
                        log::warn!("shm_open({}): rollback of {:?} failed: {}", id, frame, err);
                    }
                    return Err(ShmError::OutOfMemory);
                }
                (slot, frame, true)
            }
        };

        let va = match map_shared_page(space, frame) {
            Ok(va) => va,
            Err(err) => {
                log::warn!("shm_open({}): mapping failed: {}", id, err);
                if created {
                    if let Err(err) = frames.deallocate_frame(frame) {
                        log::warn!("shm_open({}): rollback of {:?} failed: {}", id, frame, err);
                    }
                }
                return Err(ShmError::MappingFailed);
            }
        };

        let page = &mut pages[slot];
        let refcount = if created {
            if !page.is_free() {
                log::warn!("shm_open({}): slot {} reused while live", id, slot);
            }
            page.install(id, frame);
            1
        } else {
            page.inc_ref()
        };

        log::debug!(
            "shm_open({}): {:?} at {:?}, refcount {}",
            id,
            frame.address(),
            va,
            refcount
        );
        Ok(va)
    }

    /// Drops one attachment of `id`. The caller's mapping stays installed and
    /// the frame stays allocated even when the last attachment goes away.
    pub fn detach(&self, id: ShmId) -> ShmResult<()> {
        let slot = home_slot(id.get() as isize).ok_or(ShmError::InvalidId)?;
        let mut pages = self.pages.lock();
        let page = &mut pages[slot];

        if !page.holds(id) {
            log::warn!("shm_close({}): no matching shm_open", id);
            return Err(ShmError::ProtocolViolation);
        }
        let remaining = page.dec_ref()?;

        log::debug!("shm_close({}): refcount {}", id, remaining);
        Ok(())
    }

    pub fn segment(&self, id: ShmId) -> Option<SegmentInfo> {
        let pages = self.pages.lock();
        Self::find(&pages, id).and_then(|(slot, _)| pages[slot].info())
    }

    pub fn stats(&self) -> ShmStats {
        let pages = self.pages.lock();
        ShmStats {
            live_segments: pages.iter().filter(|page| !page.is_free()).count(),
            attachments: pages.iter().map(|page| page.refcount() as usize).sum(),
            capacity: SHM_CAPACITY,
        }
    }
}

impl Default for ShmTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        AddressSpace, MemoryError, MemoryResult, PageProtection, PhysicalAddress, PhysicalMemory,
        PAGE_SIZE,
    };
    use proptest::prelude::*;

    const LIMIT: usize = 0x1000_0000;

    fn ram(frames: usize) -> PhysicalMemory {
        PhysicalMemory::new(PhysicalAddress::new(0x0010_0000), frames).unwrap()
    }

    fn space() -> AddressSpace {
        AddressSpace::new(0, LIMIT).unwrap()
    }

    fn id(raw: isize) -> ShmId {
        ShmId::new(raw).unwrap()
    }

    /// Page table that refuses every mapping
    struct RefusingMapper {
        size: usize,
    }

    impl UserMapper for RefusingMapper {
        fn size(&self) -> usize {
            self.size
        }

        fn set_size(&mut self, size: usize) {
            self.size = size;
        }

        fn map_page(&mut self, _: VirtualAddress, _: Frame, _: PageProtection) -> MemoryResult<()> {
            Err(MemoryError::OutOfMemory)
        }
    }

    /// Allocator whose frames cannot be zeroed
    struct UnzeroableFrames {
        ram: PhysicalMemory,
    }

    impl FrameAllocator for UnzeroableFrames {
        fn allocate_frame(&self) -> MemoryResult<Frame> {
            self.ram.allocate_frame()
        }

        fn zero_frame(&self, _: Frame) -> MemoryResult<()> {
            Err(MemoryError::InvalidAddress)
        }

        fn deallocate_frame(&self, frame: Frame) -> MemoryResult<()> {
            self.ram.deallocate_frame(frame)
        }
    }

    #[test]
    fn test_home_slot() {
        assert_eq!(home_slot(1), Some(0));
        assert_eq!(home_slot(64), Some(63));
        assert_eq!(home_slot(0), None);
        assert_eq!(home_slot(65), None);
        assert_eq!(home_slot(-3), None);
    }

    #[test]
    fn test_new_table_is_empty() {
        let table = ShmTable::new();
        assert_eq!(
            table.stats(),
            ShmStats {
                live_segments: 0,
                attachments: 0,
                capacity: 64
            }
        );
    }

    #[test]
    fn test_create_then_join() {
        let table = ShmTable::new();
        let ram = ram(8);
        let mut a = space();
        let mut b = space();

        let va_a = table.attach(id(7), &ram, &mut a).unwrap();
        let created = table.segment(id(7)).unwrap();
        assert_eq!(created.refcount, 1);

        let va_b = table.attach(id(7), &ram, &mut b).unwrap();
        let joined = table.segment(id(7)).unwrap();
        assert_eq!(joined.refcount, 2);
        assert_eq!(joined.frame, created.frame);
        assert_eq!(a.translate(va_a), b.translate(va_b));
        assert_eq!(ram.free_frames(), 7);
    }

    #[test]
    fn test_new_segment_is_zeroed() {
        let table = ShmTable::new();
        let ram = ram(1);

        // Dirty the only frame, then give it back to the allocator
        let dirty = ram.allocate().unwrap();
        ram.write_byte(dirty.address() + 100, 0xff).unwrap();
        ram.deallocate(dirty).unwrap();

        let mut a = space();
        let va = table.attach(id(1), &ram, &mut a).unwrap();
        assert_eq!(a.load_byte(&ram, va + 100), Ok(0));
    }

    #[test]
    fn test_same_process_attaches_twice() {
        let table = ShmTable::new();
        let ram = ram(4);
        let mut a = space();

        let first = table.attach(id(3), &ram, &mut a).unwrap();
        let second = table.attach(id(3), &ram, &mut a).unwrap();

        assert_ne!(first, second);
        assert_eq!(a.translate(first), a.translate(second));
        assert_eq!(table.segment(id(3)).map(|s| s.refcount), Some(2));
    }

    #[test]
    fn test_out_of_memory_leaves_state() {
        let table = ShmTable::new();
        let ram = ram(1);
        let mut a = space();
        table.attach(id(1), &ram, &mut a).unwrap();
        let before = a.size();

        assert_eq!(table.attach(id(2), &ram, &mut a), Err(ShmError::OutOfMemory));
        assert_eq!(table.segment(id(2)), None);
        assert_eq!(table.stats().live_segments, 1);
        assert_eq!(a.size(), before);

        // Joining an existing segment needs no frame
        assert!(table.attach(id(1), &ram, &mut a).is_ok());
    }

    #[test]
    fn test_unzeroed_frame_is_never_installed() {
        let table = ShmTable::new();
        let frames = UnzeroableFrames { ram: ram(2) };
        let mut a = space();

        assert_eq!(
            table.attach(id(6), &frames, &mut a),
            Err(ShmError::OutOfMemory)
        );
        assert_eq!(table.segment(id(6)), None);
        assert_eq!(frames.ram.free_frames(), 2);
        assert_eq!(a.mapped_pages(), 0);
        assert_eq!(a.size(), 0);
    }

    #[test]
    fn test_mapping_failure_rolls_back_new_frame() {
        let table = ShmTable::new();
        let ram = ram(2);
        let mut refusing = RefusingMapper { size: 0x1800 };

        assert_eq!(
            table.attach(id(9), &ram, &mut refusing),
            Err(ShmError::MappingFailed)
        );
        assert_eq!(table.segment(id(9)), None);
        assert_eq!(refusing.size, 0x1800);
        assert_eq!(ram.free_frames(), 2);
    }

    #[test]
    fn test_mapping_failure_on_join_keeps_refcount() {
        let table = ShmTable::new();
        let ram = ram(2);
        let mut a = space();
        table.attach(id(9), &ram, &mut a).unwrap();

        let mut refusing = RefusingMapper { size: 0 };
        assert_eq!(
            table.attach(id(9), &ram, &mut refusing),
            Err(ShmError::MappingFailed)
        );
        assert_eq!(table.segment(id(9)).map(|s| s.refcount), Some(1));
        assert_eq!(ram.free_frames(), 1);
    }

    #[test]
    fn test_detach_to_zero_frees_slot_not_frame() {
        let table = ShmTable::new();
        let ram = ram(4);
        let mut a = space();
        let va = table.attach(id(4), &ram, &mut a).unwrap();
        let frame = table.segment(id(4)).unwrap().frame;

        table.detach(id(4)).unwrap();

        assert_eq!(table.segment(id(4)), None);
        assert_eq!(table.stats().live_segments, 0);
        assert!(ram.is_allocated(frame));
        assert_eq!(a.translate(va), Some(frame.address()));
    }

    #[test]
    fn test_reattach_after_free_gets_fresh_frame() {
        let table = ShmTable::new();
        let ram = ram(4);
        let mut a = space();
        let va_old = table.attach(id(4), &ram, &mut a).unwrap();
        a.store_byte(&ram, va_old, 0x11).unwrap();
        let old = table.segment(id(4)).unwrap().frame;
        table.detach(id(4)).unwrap();

        let va_new = table.attach(id(4), &ram, &mut a).unwrap();
        let new = table.segment(id(4)).unwrap();

        assert_ne!(new.frame, old);
        assert_eq!(new.refcount, 1);
        assert_eq!(a.load_byte(&ram, va_new), Ok(0));
        assert_eq!(a.load_byte(&ram, va_old), Ok(0x11));
    }

    #[test]
    fn test_unmatched_detach() {
        let table = ShmTable::new();
        assert_eq!(table.detach(id(12)), Err(ShmError::ProtocolViolation));

        let ram = ram(2);
        let mut a = space();
        table.attach(id(12), &ram, &mut a).unwrap();
        table.detach(id(12)).unwrap();
        assert_eq!(table.detach(id(12)), Err(ShmError::ProtocolViolation));
        assert_eq!(table.stats().attachments, 0);
    }

    #[test]
    fn test_size_advances_one_page_per_attach() {
        let table = ShmTable::new();
        let ram = ram(16);
        let mut a = AddressSpace::new(3 * PAGE_SIZE + 5, LIMIT).unwrap();

        let mut seen = Vec::new();
        for raw in 1..=5 {
            let va = table.attach(id(raw), &ram, &mut a).unwrap();
            assert!(va.is_page_aligned());
            assert!(!seen.contains(&va));
            seen.push(va);
        }

        assert_eq!(seen[0].value(), 4 * PAGE_SIZE);
        assert_eq!(a.size(), seen[0].value() + 5 * PAGE_SIZE);
    }

    proptest! {
        #[test]
        fn prop_refcounts_match_model(ops in proptest::collection::vec((any::<bool>(), 1isize..=8), 1..64)) {
            let table = ShmTable::new();
            let ram = ram(64);
            let mut a = space();
            let mut model = [0u32; 8];

            for (is_attach, raw) in ops {
                let slot = (raw - 1) as usize;
                if is_attach {
                    prop_assert!(table.attach(id(raw), &ram, &mut a).is_ok());
                    model[slot] += 1;
                } else if model[slot] == 0 {
                    prop_assert_eq!(table.detach(id(raw)), Err(ShmError::ProtocolViolation));
                } else {
                    prop_assert_eq!(table.detach(id(raw)), Ok(()));
                    model[slot] -= 1;
                }

                let actual = table.segment(id(raw)).map_or(0, |s| s.refcount);
                prop_assert_eq!(actual, model[slot]);
            }

            let stats = table.stats();
            prop_assert_eq!(stats.attachments, model.iter().map(|&c| c as usize).sum::<usize>());
            prop_assert_eq!(stats.live_segments, model.iter().filter(|&&c| c > 0).count());
        }
    }
}
