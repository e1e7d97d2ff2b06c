//! Bitmap-based physical frame allocator
//!
//! Tracks the state of every frame of RAM (free/used) with one bit per 4KB
//! frame. The RAM itself is owned by the allocator as a byte array, which is
//! what the kernel reaches through its direct map when it zeroes a frame or
//! services a user load/store.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, Ordering};
use spin::Mutex;

use super::{Frame, FrameAllocator, FRAME_SIZE};
use crate::memory::{MemoryError, MemoryResult, PhysicalAddress};

/// Allocation bitmap, guarded by `PhysicalMemory::state`
struct BitmapState {
    /// 1 bit per frame, 0 = free, 1 = used
    bitmap: Vec<u8>,
    /// Next frame index to probe
    next_free_hint: usize,
    free_frames: usize,
}

impl BitmapState {
    fn is_free(&self, frame_index: usize) -> bool {
        let byte_index = frame_index / 8;
        let bit_index = frame_index % 8;

        match self.bitmap.get(byte_index) {
            Some(byte) => byte & (1 << bit_index) == 0,
            None => false,
        }
    }

    fn mark_used(&mut self, frame_index: usize) {
        if let Some(byte) = self.bitmap.get_mut(frame_index / 8) {
            *byte |= 1 << (frame_index % 8);
        }
    }

    fn mark_free(&mut self, frame_index: usize) {
        if let Some(byte) = self.bitmap.get_mut(frame_index / 8) {
            *byte &= !(1 << (frame_index % 8));
        }
    }
}

/// Physical RAM plus its frame allocator
pub struct PhysicalMemory {
    base_address: PhysicalAddress,
    total_frames: usize,
    ram: Box<[AtomicU8]>,
    state: Mutex<BitmapState>,
}

impl PhysicalMemory {
    /// Creates `total_frames` frames of RAM starting at `base_address`, all free
    pub fn new(base_address: PhysicalAddress, total_frames: usize) -> MemoryResult<Self> {
        if !base_address.is_page_aligned() {
            return Err(MemoryError::AlignmentError);
        }
        if total_frames == 0 {
            return Err(MemoryError::InvalidSize);
        }
        let bytes = total_frames
            .checked_mul(FRAME_SIZE)
            .ok_or(MemoryError::InvalidSize)?;
        base_address
            .value()
            .checked_add(bytes)
            .ok_or(MemoryError::InvalidAddress)?;

        let ram = (0..bytes).map(|_| AtomicU8::new(0)).collect::<Vec<_>>();

        Ok(Self {
            base_address,
            total_frames,
            ram: ram.into_boxed_slice(),
            state: Mutex::new(BitmapState {
                bitmap: vec![0; (total_frames + 7) / 8],
                next_free_hint: 0,
                free_frames: total_frames,
            }),
        })
    }

    pub fn base_address(&self) -> PhysicalAddress {
        self.base_address
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn free_frames(&self) -> usize {
        self.state.lock().free_frames
    }

    /// Allocates one frame. Contents are whatever the previous owner left.
    pub fn allocate(&self) -> MemoryResult<Frame> {
        let mut state = self.state.lock();

        let hint = state.next_free_hint;
        let frame_index = (hint..self.total_frames)
            .chain(0..hint)
            .find(|&index| state.is_free(index))
            .ok_or(MemoryError::OutOfMemory)?;

        state.mark_used(frame_index);
        state.next_free_hint = frame_index + 1;
        state.free_frames -= 1;

        let addr = self.base_address.value() + frame_index * FRAME_SIZE;
        Ok(Frame::new(PhysicalAddress::new(addr)))
    }

    /// Releases a frame previously returned by `allocate`
    pub fn deallocate(&self, frame: Frame) -> MemoryResult<()> {
        let frame_index = self.frame_index(frame)?;
        let mut state = self.state.lock();

        if state.is_free(frame_index) {
            return Err(MemoryError::InternalError("Double free detected"));
        }

        state.mark_free(frame_index);
        state.free_frames += 1;
        if frame_index < state.next_free_hint {
            state.next_free_hint = frame_index;
        }
        Ok(())
    }

    pub fn is_allocated(&self, frame: Frame) -> bool {
        match self.frame_index(frame) {
            Ok(index) => !self.state.lock().is_free(index),
            Err(_) => false,
        }
    }

    pub fn read_byte(&self, addr: PhysicalAddress) -> MemoryResult<u8> {
        let offset = self.ram_offset(addr)?;
        Ok(self.ram[offset].load(Ordering::Relaxed))
    }

    pub fn write_byte(&self, addr: PhysicalAddress, value: u8) -> MemoryResult<()> {
        let offset = self.ram_offset(addr)?;
        self.ram[offset].store(value, Ordering::Relaxed);
        Ok(())
    }

    fn frame_index(&self, frame: Frame) -> MemoryResult<usize> {
        let addr = frame.address().value();
        let base = self.base_address.value();

        if addr < base {
            return Err(MemoryError::InvalidAddress);
        }
        let offset = addr - base;
        if offset % FRAME_SIZE != 0 {
            return Err(MemoryError::AlignmentError);
        }
        let frame_index = offset / FRAME_SIZE;
        if frame_index >= self.total_frames {
            return Err(MemoryError::InvalidAddress);
        }
        Ok(frame_index)
    }

    fn ram_offset(&self, addr: PhysicalAddress) -> MemoryResult<usize> {
        addr.value()
            .checked_sub(self.base_address.value())
            .filter(|&offset| offset < self.ram.len())
            .ok_or(MemoryError::InvalidAddress)
    }
}

impl FrameAllocator for PhysicalMemory {
    fn allocate_frame(&self) -> MemoryResult<Frame> {
        self.allocate()
    }

    fn zero_frame(&self, frame: Frame) -> MemoryResult<()> {
        let start = self.frame_index(frame)? * FRAME_SIZE;
        for byte in &self.ram[start..start + FRAME_SIZE] {
            byte.store(0, Ordering::Relaxed);
        }
        Ok(())
    }

    fn deallocate_frame(&self, frame: Frame) -> MemoryResult<()> {
        self.deallocate(frame)
    }
}
