use super::PhysPage;
use buddy_system_allocator::FrameAllocator;
use log::trace;

/// Pool of physical page numbers handed out one frame at a time.
pub struct FramePool {
    allocator: FrameAllocator,
    total: usize,
    free: usize,
}

impl FramePool {
    /// A pool owning the frames `[start, end)`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start < end, "empty frame range {:#x}..{:#x}", start, end);
        let mut allocator = FrameAllocator::new();
        allocator.add_frame(start, end);
        Self {
            allocator,
            total: end - start,
            free: end - start,
        }
    }

    pub fn alloc(&mut self) -> Option<PhysPage> {
        let ppn = self.allocator.alloc(1)?;
        self.free -= 1;
        trace!("frame alloc {:#x}", ppn);
        Some(PhysPage(ppn))
    }

    pub fn dealloc(&mut self, page: PhysPage) {
        trace!("frame dealloc {:#x}", page.0);
        self.allocator.dealloc(page.0, 1);
        self.free += 1;
    }

    pub fn num_free(&self) -> usize {
        self.free
    }

    pub fn num_used(&self) -> usize {
        self.total - self.free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_alloc_and_dealloc() {
        let mut pool = FramePool::new(0x100, 0x104);
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.num_used(), 2);
        pool.dealloc(a);
        assert_eq!(pool.num_free(), 3);
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let mut pool = FramePool::new(0x100, 0x102);
        assert!(pool.alloc().is_some());
        assert!(pool.alloc().is_some());
        assert!(pool.alloc().is_none());
        assert_eq!(pool.num_free(), 0);
    }
}
