//! Page protection flags

use bitflags::bitflags;

bitflags! {
    /// Access rights installed in a page-table entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageProtection: u8 {
        const READ    = 0x1;
        const WRITE   = 0x2;
        const EXECUTE = 0x4;
        const USER    = 0x8;

        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        /// Read-write, user-accessible: what a shared segment is mapped with
        const USER_READ_WRITE = Self::READ_WRITE.bits() | Self::USER.bits();
    }
}

impl PageProtection {
    pub const fn can_write(&self) -> bool {
        self.contains(Self::WRITE)
    }

    pub const fn is_user(&self) -> bool {
        self.contains(Self::USER)
    }

    /// A writable page is always readable (x86 has no write-only PTE)
    pub const fn is_readable(&self) -> bool {
        self.intersects(Self::READ_WRITE)
    }
}
