//! Shared memory segment slots
//!
//! One slot of the segment registry: the id it is registered under, the
//! frame backing it and the number of attached processes.

use core::fmt;

use super::{ShmError, ShmResult};
use crate::memory::Frame;

/// Number of slots in the segment registry
pub const SHM_CAPACITY: usize = 64;

/// Segment key supplied by user code, always within `1..=SHM_CAPACITY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShmId(u32);

impl ShmId {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = SHM_CAPACITY as u32;

    /// Validates a raw kernel-call argument
    pub fn new(raw: isize) -> ShmResult<Self> {
        if raw < Self::MIN as isize || raw > Self::MAX as isize {
            return Err(ShmError::InvalidId);
        }
        Ok(Self(raw as u32))
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ShmId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of one live segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    pub id: ShmId,
    pub frame: Frame,
    pub refcount: u32,
}

/// One registry slot. `id == 0` marks the slot free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmPage {
    id: u32,
    frame: Option<Frame>,
    refcount: u32,
}

impl ShmPage {
    pub const fn empty() -> Self {
        Self {
            id: 0,
            frame: None,
            refcount: 0,
        }
    }

    pub const fn is_free(&self) -> bool {
        self.refcount == 0
    }

    /// True if this slot is the live home of `id`
    pub fn holds(&self, id: ShmId) -> bool {
        self.id == id.get() && self.refcount > 0
    }

    /// Backing frame, if this slot is live under `id`
    pub fn frame_for(&self, id: ShmId) -> Option<Frame> {
        if self.holds(id) {
            self.frame
        } else {
            None
        }
    }

    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    /// Registers `id` here with its first attachment
    pub fn install(&mut self, id: ShmId, frame: Frame) {
        self.id = id.get();
        self.frame = Some(frame);
        self.refcount = 1;
    }

    pub fn inc_ref(&mut self) -> u32 {
        self.refcount += 1;
        self.refcount
    }

    /// Drops one attachment. At zero the slot is cleared and the frame
    /// handle forgotten; the frame itself stays allocated.
    pub fn dec_ref(&mut self) -> ShmResult<u32> {
        self.refcount = self
            .refcount
            .checked_sub(1)
            .ok_or(ShmError::ProtocolViolation)?;
        if self.refcount == 0 {
            self.id = 0;
            self.frame = None;
        }
        Ok(self.refcount)
    }

    pub fn info(&self) -> Option<SegmentInfo> {
        match (ShmId::new(self.id as isize), self.frame) {
            (Ok(id), Some(frame)) if self.refcount > 0 => Some(SegmentInfo {
                id,
                frame,
                refcount: self.refcount,
            }),
            _ => None,
        }
    }
}

impl Default for ShmPage {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::PhysicalAddress;

    fn frame() -> Frame {
        Frame::new(PhysicalAddress::new(0x0040_0000))
    }

    #[test]
    fn test_id_bounds() {
        assert_eq!(ShmId::new(0), Err(ShmError::InvalidId));
        assert_eq!(ShmId::new(-1), Err(ShmError::InvalidId));
        assert_eq!(ShmId::new(65), Err(ShmError::InvalidId));
        assert_eq!(ShmId::new(1).map(ShmId::get), Ok(1));
        assert_eq!(ShmId::new(64).map(ShmId::get), Ok(64));
    }

    #[test]
    fn test_slot_lifecycle() {
        let id = ShmId::new(5).unwrap();
        let mut page = ShmPage::empty();
        assert!(page.is_free());
        assert_eq!(page.frame_for(id), None);

        page.install(id, frame());
        assert!(page.holds(id));
        assert_eq!(page.inc_ref(), 2);
        assert_eq!(page.info().map(|i| i.refcount), Some(2));

        assert_eq!(page.dec_ref(), Ok(1));
        assert_eq!(page.frame_for(id), Some(frame()));
        assert_eq!(page.dec_ref(), Ok(0));
        assert_eq!(page, ShmPage::empty());
        assert_eq!(page.info(), None);
    }

    #[test]
    fn test_dec_ref_on_free_slot() {
        let mut page = ShmPage::empty();
        assert_eq!(page.dec_ref(), Err(ShmError::ProtocolViolation));
        assert_eq!(page, ShmPage::empty());
    }
}
