use super::VirtAddr;
use crate::config::PAGE_SIZE;
use core::iter::{Map, StepBy};
use core::ops::Range;

/// Page-aligned half-open range of virtual addresses, walked one page at a time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VAddrRange {
    start: VirtAddr,
    end: VirtAddr,
}

impl VAddrRange {
    /// The pages touched by `[start, end)`.
    pub fn new(start: VirtAddr, end: VirtAddr) -> Self {
        let (start, end) = (start.floor(), end.ceil());
        assert!(start <= end, "start {:?} > end {:?}!", start, end);
        Self { start, end }
    }

    pub fn get_start(&self) -> VirtAddr {
        self.start
    }

    pub fn get_end(&self) -> VirtAddr {
        self.end
    }

    pub fn pages(&self) -> usize {
        (self.end.0 - self.start.0) / PAGE_SIZE
    }

    pub fn contains(&self, va: VirtAddr) -> bool {
        self.start <= va && va < self.end
    }
}

impl IntoIterator for VAddrRange {
    type Item = VirtAddr;
    type IntoIter = Map<StepBy<Range<usize>>, fn(usize) -> VirtAddr>;

    fn into_iter(self) -> Self::IntoIter {
        (self.start.0..self.end.0)
            .step_by(PAGE_SIZE)
            .map(VirtAddr::new as fn(usize) -> VirtAddr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_every_page_once() {
        let range = VAddrRange::new(VirtAddr::new(0x1000), VirtAddr::new(0x4000));
        let pages: alloc::vec::Vec<_> = range.into_iter().map(|va| va.0).collect();
        assert_eq!(pages, [0x1000, 0x2000, 0x3000]);
        assert_eq!(range.pages(), 3);
    }

    #[test]
    fn unaligned_bounds_widen_to_pages() {
        let range = VAddrRange::new(VirtAddr::new(0x1800), VirtAddr::new(0x2001));
        assert_eq!(range.get_start(), VirtAddr::new(0x1000));
        assert_eq!(range.get_end(), VirtAddr::new(0x3000));
        assert!(range.contains(VirtAddr::new(0x2fff)));
        assert!(!range.contains(VirtAddr::new(0x3000)));
    }
}
