use super::{FramePool, MapPermission, MemError, MemoryManager, PageTable, PhysPage, VirtAddr};
use crate::config::{MAX_CPU, PAGE_SIZE, UTEXT};
use crate::sync::SpinLock;
use crate::task::CpuId;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use log::*;

/// First physical page number handed to the frame pool.
const FIRST_PPN: usize = 0x100;
/// Virtual address bits translated by one second-level table.
const PDX_SHIFT: usize = 22;

struct Frame {
    data: Box<[u8; PAGE_SIZE]>,
    refs: usize,
}

/// Mappings of one simulated address space.
struct MemorySet {
    /// Second-level tables, keyed by directory index.
    tables: BTreeMap<usize, PhysPage>,
    areas: BTreeMap<VirtAddr, (PhysPage, MapPermission)>,
}

impl MemorySet {
    fn new_bare() -> Self {
        Self {
            tables: BTreeMap::new(),
            areas: BTreeMap::new(),
        }
    }
}

struct FrameMemoryInner {
    pool: FramePool,
    frames: BTreeMap<PhysPage, Frame>,
    spaces: BTreeMap<PageTable, MemorySet>,
    active: Vec<PageTable>,
    kernel: PageTable,
    image: Vec<PhysPage>,
}

impl FrameMemoryInner {
    fn alloc_frame(&mut self) -> Result<PhysPage, MemError> {
        let page = self.pool.alloc().ok_or(MemError::OutOfMemory)?;
        self.frames.insert(
            page,
            Frame {
                data: Box::new([0u8; PAGE_SIZE]),
                refs: 0,
            },
        );
        Ok(page)
    }

    fn release_frame(&mut self, page: PhysPage) {
        if self.frames.remove(&page).is_some() {
            self.pool.dealloc(page);
        }
    }

    fn decref(&mut self, page: PhysPage) {
        let free = match self.frames.get_mut(&page) {
            Some(frame) => {
                frame.refs = frame.refs.saturating_sub(1);
                frame.refs == 0
            }
            None => false,
        };
        if free {
            self.release_frame(page);
        }
    }

    fn frame(&self, page: PhysPage) -> &Frame {
        self.frames
            .get(&page)
            .unwrap_or_else(|| panic!("frame {:#x} is not allocated", page.0))
    }

    fn frame_mut(&mut self, page: PhysPage) -> &mut Frame {
        self.frames
            .get_mut(&page)
            .unwrap_or_else(|| panic!("frame {:#x} is not allocated", page.0))
    }

    fn translate(&self, pt: PageTable, va: VirtAddr) -> Option<PhysPage> {
        self.spaces
            .get(&pt)?
            .areas
            .get(&va.floor())
            .map(|(page, _)| *page)
    }
}

/// Hosted [`MemoryManager`]: frames come from a buddy allocator and page
/// tables are kept as ordered maps.
pub struct FrameMemory {
    inner: SpinLock<FrameMemoryInner>,
}

impl FrameMemory {
    /// A machine with `frames` physical pages and a one-page user image.
    pub fn new(frames: usize) -> Self {
        Self::with_image(frames, b"\xeb\xfe")
    }

    /// A machine whose shared user image holds `image`.
    pub fn with_image(frames: usize, image: &[u8]) -> Self {
        let mut inner = FrameMemoryInner {
            pool: FramePool::new(FIRST_PPN, FIRST_PPN + frames),
            frames: BTreeMap::new(),
            spaces: BTreeMap::new(),
            active: Vec::new(),
            kernel: PageTable(PhysPage(0)),
            image: Vec::new(),
        };
        let root = inner
            .alloc_frame()
            .expect("no frame for the kernel page directory");
        inner.frame_mut(root).refs = 1;
        inner.kernel = PageTable(root);
        inner.spaces.insert(inner.kernel, MemorySet::new_bare());
        inner.active = vec![inner.kernel; MAX_CPU];
        for chunk in image.chunks(PAGE_SIZE) {
            let page = inner.alloc_frame().expect("no frame for the user image");
            let frame = inner.frame_mut(page);
            // the image itself keeps one reference so tasks never free it
            frame.refs = 1;
            frame.data[..chunk.len()].copy_from_slice(chunk);
            inner.image.push(page);
        }
        info!(
            "frame memory: {} frames, {} used at boot",
            frames,
            inner.pool.num_used()
        );
        Self {
            inner: SpinLock::new(inner),
        }
    }

    pub fn has_address_space(&self, pt: PageTable) -> bool {
        self.inner.lock().spaces.contains_key(&pt)
    }

    /// Number of user pages mapped in `pt`.
    pub fn mapped_pages(&self, pt: PageTable) -> usize {
        self.inner
            .lock()
            .spaces
            .get(&pt)
            .map_or(0, |space| space.areas.len())
    }

    fn access_user(
        &self,
        pt: PageTable,
        va: VirtAddr,
        len: usize,
        mut op: impl FnMut(&mut [u8; PAGE_SIZE], usize, usize, usize),
    ) -> Result<(), MemError> {
        let mut inner = self.inner.lock();
        if !inner.spaces.contains_key(&pt) {
            return Err(MemError::BadAddressSpace);
        }
        let mut done = 0;
        while done < len {
            let cur = va + done;
            let offset = cur.page_offset();
            let n = (PAGE_SIZE - offset).min(len - done);
            let page = inner
                .translate(pt, cur)
                .ok_or(MemError::NotMapped(cur))?;
            op(&mut *inner.frame_mut(page).data, offset, done, n);
            done += n;
        }
        Ok(())
    }
}

impl MemoryManager for FrameMemory {
    fn create_address_space(&self) -> Result<PageTable, MemError> {
        let mut inner = self.inner.lock();
        let root = inner.alloc_frame()?;
        inner.frame_mut(root).refs = 1;
        let pt = PageTable(root);
        inner.spaces.insert(pt, MemorySet::new_bare());
        trace!("address space {:#x} created", root.0);
        Ok(pt)
    }

    fn destroy_address_space(&self, pt: PageTable) {
        let mut inner = self.inner.lock();
        if pt == inner.kernel {
            warn!("refusing to destroy the kernel address space");
            return;
        }
        let space = match inner.spaces.remove(&pt) {
            Some(space) => space,
            None => return,
        };
        for (_, (page, _)) in space.areas {
            inner.decref(page);
        }
        for (_, table) in space.tables {
            inner.release_frame(table);
        }
        inner.release_frame(pt.0);
        let kernel = inner.kernel;
        for active in inner.active.iter_mut().filter(|active| **active == pt) {
            *active = kernel;
        }
        trace!("address space {:#x} destroyed", pt.0 .0);
    }

    fn page_alloc(&self) -> Result<PhysPage, MemError> {
        self.inner.lock().alloc_frame()
    }

    fn page_free(&self, page: PhysPage) {
        let mut inner = self.inner.lock();
        if inner.frames.get(&page).map_or(false, |frame| frame.refs == 0) {
            inner.release_frame(page);
        }
    }

    fn page_insert(
        &self,
        pt: PageTable,
        page: PhysPage,
        va: VirtAddr,
        perm: MapPermission,
    ) -> Result<(), MemError> {
        let mut inner = self.inner.lock();
        if !inner.spaces.contains_key(&pt) {
            return Err(MemError::BadAddressSpace);
        }
        let va = va.floor();
        let pdx = va.0 >> PDX_SHIFT;
        let needs_table = !inner
            .spaces
            .get(&pt)
            .map_or(false, |space| space.tables.contains_key(&pdx));
        if needs_table {
            let table = inner.alloc_frame()?;
            inner.frame_mut(table).refs = 1;
            if let Some(space) = inner.spaces.get_mut(&pt) {
                space.tables.insert(pdx, table);
            }
        }
        inner.frame_mut(page).refs += 1;
        let old = inner
            .spaces
            .get_mut(&pt)
            .and_then(|space| space.areas.insert(va, (page, perm)));
        if let Some((old, _)) = old {
            inner.decref(old);
        }
        Ok(())
    }

    fn page_remove(&self, pt: PageTable, va: VirtAddr) {
        let mut inner = self.inner.lock();
        let removed = inner
            .spaces
            .get_mut(&pt)
            .and_then(|space| space.areas.remove(&va.floor()));
        if let Some((page, _)) = removed {
            inner.decref(page);
        }
    }

    fn translate(&self, pt: PageTable, va: VirtAddr) -> Option<PhysPage> {
        self.inner.lock().translate(pt, va)
    }

    fn copy_page(&self, dst: PhysPage, src: PhysPage) {
        let mut inner = self.inner.lock();
        let data = inner.frame(src).data.clone();
        inner.frame_mut(dst).data = data;
    }

    fn read_user(&self, pt: PageTable, va: VirtAddr, buf: &mut [u8]) -> Result<(), MemError> {
        let len = buf.len();
        self.access_user(pt, va, len, |page, offset, done, n| {
            buf[done..done + n].copy_from_slice(&page[offset..offset + n]);
        })
    }

    fn write_user(&self, pt: PageTable, va: VirtAddr, data: &[u8]) -> Result<(), MemError> {
        self.access_user(pt, va, data.len(), |page, offset, done, n| {
            page[offset..offset + n].copy_from_slice(&data[done..done + n]);
        })
    }

    fn map_user_image(&self, pt: PageTable) -> Result<(), MemError> {
        let image = self.inner.lock().image.clone();
        for (i, page) in image.into_iter().enumerate() {
            self.page_insert(
                pt,
                page,
                VirtAddr::new(UTEXT + i * PAGE_SIZE),
                MapPermission::R | MapPermission::X | MapPermission::U,
            )?;
        }
        Ok(())
    }

    fn activate(&self, cpu: CpuId, pt: PageTable) {
        self.inner.lock().active[cpu] = pt;
    }

    fn active(&self, cpu: CpuId) -> PageTable {
        self.inner.lock().active[cpu]
    }

    fn kernel_page_table(&self) -> PageTable {
        self.inner.lock().kernel
    }

    fn num_free_pages(&self) -> usize {
        self.inner.lock().pool.num_free()
    }

    fn num_used_pages(&self) -> usize {
        self.inner.lock().pool.num_used()
    }
}
