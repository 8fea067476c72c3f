//! Access to user memory from the kernel side of a syscall.

use super::{MemError, MemoryManager, PageTable, VirtAddr};
use crate::config::PAGE_SIZE;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

/// Longest string accepted from user space, terminator included.
const MAX_USER_STR: usize = 256;

/// Check that every page of `[ptr, ptr + len)` is mapped in `token`.
///
/// Walks page by page and stops at the first hole, so a huge `len` costs
/// no more than the mapped prefix.
pub fn check_user_buffer(
    mm: &dyn MemoryManager,
    token: PageTable,
    ptr: usize,
    len: usize,
) -> Result<(), MemError> {
    if len == 0 {
        return Ok(());
    }
    let start = VirtAddr::new(ptr);
    let end = ptr.checked_add(len).ok_or(MemError::NotMapped(start))?;
    let mut page = start.floor();
    while page.0 < end {
        if mm.translate(token, page).is_none() {
            return Err(MemError::NotMapped(page.max(start)));
        }
        page = match page.0.checked_add(PAGE_SIZE) {
            Some(next) => VirtAddr::new(next),
            None => break,
        };
    }
    Ok(())
}

/// Copy `len` bytes at `ptr` out of the address space `token`.
pub fn translated_byte_buffer(
    mm: &dyn MemoryManager,
    token: PageTable,
    ptr: usize,
    len: usize,
) -> Result<Vec<u8>, MemError> {
    log::trace!("translated_byte_buffer {:#x}+{}", ptr, len);
    check_user_buffer(mm, token, ptr, len)?;
    let mut buf = vec![0u8; len];
    mm.read_user(token, VirtAddr::new(ptr), &mut buf)?;
    Ok(buf)
}

/// Copy `data` into the address space `token` at `ptr`.
pub fn write_translated(
    mm: &dyn MemoryManager,
    token: PageTable,
    ptr: usize,
    data: &[u8],
) -> Result<(), MemError> {
    mm.write_user(token, VirtAddr::new(ptr), data)
}

/// Load a string from other address spaces into kernel space without an end `\0`.
///
/// Fails with [`MemError::TooLong`] when no terminator shows up within
/// `MAX_USER_STR` bytes.
pub fn translated_str(
    mm: &dyn MemoryManager,
    token: PageTable,
    ptr: usize,
) -> Result<String, MemError> {
    let mut bytes = Vec::new();
    let mut cur = VirtAddr::new(ptr);
    while bytes.len() < MAX_USER_STR {
        // never read across a page we have not checked yet
        let n = (PAGE_SIZE - cur.page_offset()).min(MAX_USER_STR - bytes.len());
        let mut chunk = vec![0u8; n];
        mm.read_user(token, cur, &mut chunk)?;
        if let Some(end) = chunk.iter().position(|&c| c == 0) {
            bytes.extend_from_slice(&chunk[..end]);
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }
        bytes.extend_from_slice(&chunk);
        cur = cur + n;
    }
    Err(MemError::TooLong)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::{FrameMemory, MapPermission};

    #[test]
    fn string_ends_at_nul_across_pages() {
        let mm = FrameMemory::new(16);
        let pt = mm.create_address_space().unwrap();
        for va in [0x5000, 0x6000] {
            let page = mm.page_alloc().unwrap();
            mm.page_insert(pt, page, VirtAddr::new(va), MapPermission::U)
                .unwrap();
        }
        mm.write_user(pt, VirtAddr::new(0x5ffc), b"/dir/a.txt\0junk")
            .unwrap();
        assert_eq!(translated_str(&mm, pt, 0x5ffc).unwrap(), "/dir/a.txt");
        assert_eq!(
            translated_byte_buffer(&mm, pt, 0x5ffc, 4).unwrap(),
            b"/dir".to_vec()
        );
    }

    #[test]
    fn unmapped_string_is_an_error() {
        let mm = FrameMemory::new(8);
        let pt = mm.create_address_space().unwrap();
        assert_eq!(
            translated_str(&mm, pt, 0x7000),
            Err(MemError::NotMapped(VirtAddr::new(0x7000)))
        );
    }

    #[test]
    fn unterminated_string_is_too_long() {
        let mm = FrameMemory::new(8);
        let pt = mm.create_address_space().unwrap();
        let page = mm.page_alloc().unwrap();
        mm.page_insert(pt, page, VirtAddr::new(0x5000), MapPermission::U)
            .unwrap();
        mm.write_user(pt, VirtAddr::new(0x5000), &[b'a'; MAX_USER_STR])
            .unwrap();
        assert_eq!(translated_str(&mm, pt, 0x5000), Err(MemError::TooLong));
        // one byte shorter fits with its terminator
        mm.write_user(pt, VirtAddr::new(0x50ff), &[0]).unwrap();
        assert_eq!(translated_str(&mm, pt, 0x5000).unwrap().len(), 255);
    }

    #[test]
    fn huge_buffer_stops_at_the_first_hole() {
        let mm = FrameMemory::new(8);
        let pt = mm.create_address_space().unwrap();
        let page = mm.page_alloc().unwrap();
        mm.page_insert(pt, page, VirtAddr::new(0x5000), MapPermission::U)
            .unwrap();
        assert_eq!(check_user_buffer(&mm, pt, 0x5800, 0x800), Ok(()));
        assert_eq!(
            check_user_buffer(&mm, pt, 0x5800, isize::MAX as usize),
            Err(MemError::NotMapped(VirtAddr::new(0x6000)))
        );
        assert_eq!(
            translated_byte_buffer(&mm, pt, 0x5800, usize::MAX),
            Err(MemError::NotMapped(VirtAddr::new(0x5800)))
        );
        assert_eq!(check_user_buffer(&mm, pt, 0x9000, 0), Ok(()));
    }
}
