//! Mapping shared frames into a process
//!
//! A segment is always placed at the first page boundary at or above the
//! caller's virtual-size high-water-mark, which is then bumped past it.

use crate::memory::{
    page_round_up, Frame, MemoryError, MemoryResult, PageProtection, UserMapper, VirtualAddress,
    PAGE_SIZE,
};

/// Protection every shared segment is mapped with
pub const SHARED_PAGE_PROTECTION: PageProtection = PageProtection::USER_READ_WRITE;

/// Maps `frame` at the next free page of `space` and advances its size by
/// one page. On error `space` is left untouched.
pub fn map_shared_page<M>(space: &mut M, frame: Frame) -> MemoryResult<VirtualAddress>
where
    M: UserMapper + ?Sized,
{
    let page = page_round_up(space.size()).ok_or(MemoryError::InvalidAddress)?;
    let new_size = page
        .checked_add(PAGE_SIZE)
        .ok_or(MemoryError::InvalidAddress)?;
    let page = VirtualAddress::new(page);

    space.map_page(page, frame, SHARED_PAGE_PROTECTION)?;
    space.set_size(new_size);

    log::trace!("SharedMapping: {:?} -> {:?}", page, frame.address());
    Ok(page)
}
