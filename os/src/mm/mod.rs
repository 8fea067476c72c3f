//! Memory manager collaborator.
//!
//! Paging and frame allocation live outside the task core. The core talks to
//! them through [`MemoryManager`]: address-space creation and teardown, page
//! allocation, page-table insertion and removal, and copying between frames.
//! [`FrameMemory`] is a hosted implementation built on a buddy frame
//! allocator, used to run the core without hardware.

mod frame_allocator;
mod memory_set;
mod page_table;
mod vpn_range;

use crate::config::{PAGE_SIZE, USR_STACK_SIZE, USTACKTOP};
use crate::task::CpuId;
use core::fmt::{self, Display, Formatter};
use core::ops::Add;

pub use frame_allocator::FramePool;
pub use memory_set::FrameMemory;
pub use page_table::{check_user_buffer, translated_byte_buffer, translated_str, write_translated};
pub use vpn_range::VAddrRange;

/// Physical page number.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysPage(pub usize);

/// Handle of an address space: the physical page of its root table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageTable(pub PhysPage);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtAddr(pub usize);

impl VirtAddr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }
    pub fn floor(self) -> Self {
        Self(self.0 & !(PAGE_SIZE - 1))
    }
    pub fn ceil(self) -> Self {
        Self((self.0 + PAGE_SIZE - 1) & !(PAGE_SIZE - 1))
    }
    pub fn page_offset(self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }
}

impl Add<usize> for VirtAddr {
    type Output = VirtAddr;
    fn add(self, rhs: usize) -> VirtAddr {
        VirtAddr(self.0 + rhs)
    }
}

impl From<usize> for VirtAddr {
    fn from(addr: usize) -> Self {
        Self(addr)
    }
}

impl From<VirtAddr> for usize {
    fn from(va: VirtAddr) -> usize {
        va.0
    }
}

bitflags! {
    pub struct MapPermission: u8 {
        const R = 1 << 1;
        const W = 1 << 2;
        const X = 1 << 3;
        const U = 1 << 4;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemError {
    /// No free physical frame.
    OutOfMemory,
    /// The virtual address is not mapped in the address space.
    NotMapped(VirtAddr),
    /// The handle does not name a live address space.
    BadAddressSpace,
    /// A user string has no terminator within the accepted length.
    TooLong,
}

impl Display for MemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MemError::OutOfMemory => write!(f, "out of physical memory"),
            MemError::NotMapped(va) => write!(f, "address {:#x} not mapped", va.0),
            MemError::BadAddressSpace => write!(f, "no such address space"),
            MemError::TooLong => write!(f, "user string too long"),
        }
    }
}

/// Paging primitives the task core consumes.
pub trait MemoryManager: Send + Sync {
    /// A fresh address space holding only the kernel mappings.
    fn create_address_space(&self) -> Result<PageTable, MemError>;
    /// Release the page tables and root of `pt`. User pages must have been
    /// removed already.
    fn destroy_address_space(&self, pt: PageTable);
    /// A zero-filled frame.
    fn page_alloc(&self) -> Result<PhysPage, MemError>;
    fn page_free(&self, page: PhysPage);
    fn page_insert(
        &self,
        pt: PageTable,
        page: PhysPage,
        va: VirtAddr,
        perm: MapPermission,
    ) -> Result<(), MemError>;
    /// Unmap `va`, freeing the frame once nothing else maps it.
    fn page_remove(&self, pt: PageTable, va: VirtAddr);
    fn translate(&self, pt: PageTable, va: VirtAddr) -> Option<PhysPage>;
    fn copy_page(&self, dst: PhysPage, src: PhysPage);
    fn read_user(&self, pt: PageTable, va: VirtAddr, buf: &mut [u8]) -> Result<(), MemError>;
    fn write_user(&self, pt: PageTable, va: VirtAddr, data: &[u8]) -> Result<(), MemError>;
    /// Map the shared user program image (text, data, bss, rodata).
    fn map_user_image(&self, pt: PageTable) -> Result<(), MemError>;
    /// Load `pt` on `cpu`.
    fn activate(&self, cpu: CpuId, pt: PageTable);
    fn active(&self, cpu: CpuId) -> PageTable;
    fn kernel_page_table(&self) -> PageTable;
    fn num_free_pages(&self) -> usize;
    fn num_used_pages(&self) -> usize;
}

/// The pages backing every task's user stack.
pub fn user_stack_range() -> VAddrRange {
    VAddrRange::new(
        VirtAddr::new(USTACKTOP - USR_STACK_SIZE),
        VirtAddr::new(USTACKTOP),
    )
}
