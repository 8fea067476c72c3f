//! Console and file syscalls.

use crate::fs::*;
use crate::kernel::Kernel;
use crate::mm::{
    check_user_buffer, translated_byte_buffer, translated_str, write_translated, MemError,
    PageTable,
};
use crate::task::CpuId;
use alloc::string::String;
use alloc::vec;
use log::warn;

impl Kernel {
    pub(super) fn sys_getc(&self) -> isize {
        self.console.getc() as isize
    }

    pub(super) fn sys_puts(&self, cpu: CpuId, buf: usize, len: isize) -> isize {
        if len < 0 {
            return -STATUS_EINVAL;
        }
        if len == 0 {
            return STATUS_OK;
        }
        if buf == 0 {
            return -STATUS_EINVAL;
        }
        let token = match self.current_space(cpu) {
            Some(token) => token,
            None => return -STATUS_EFAULT,
        };
        match translated_byte_buffer(self.mm.as_ref(), token, buf, len as usize) {
            Ok(bytes) => {
                self.console.puts(&bytes);
                STATUS_OK
            }
            Err(err) => {
                warn!("puts from cpu {}: {}", cpu, err);
                -STATUS_EFAULT
            }
        }
    }

    pub(super) fn sys_settextcolor(&self, fore: u8, back: u8) -> isize {
        self.console.set_text_color(fore, back);
        STATUS_OK
    }

    pub(super) fn sys_cls(&self) -> isize {
        self.console.clear();
        STATUS_OK
    }

    /// Copy a NUL-terminated path out of the caller's memory.
    fn user_path(&self, cpu: CpuId, ptr: usize) -> Result<String, isize> {
        if ptr == 0 {
            return Err(-STATUS_EINVAL);
        }
        let token = self.current_space(cpu).ok_or(-STATUS_EFAULT)?;
        translated_str(self.mm.as_ref(), token, ptr).map_err(|err| match err {
            MemError::TooLong => -STATUS_EINVAL,
            _ => -STATUS_EFAULT,
        })
    }

    /// Check a user buffer before any file state changes.
    fn user_buffer(&self, cpu: CpuId, buf: usize, len: isize) -> Result<(PageTable, usize), isize> {
        if len < 0 || buf == 0 {
            return Err(-STATUS_EINVAL);
        }
        let token = self.current_space(cpu).ok_or(-STATUS_EFAULT)?;
        Ok((token, len as usize))
    }

    pub(super) fn sys_open(&self, cpu: CpuId, path: usize, flags: usize, _mode: usize) -> isize {
        let path = match self.user_path(cpu, path) {
            Ok(path) => path,
            Err(status) => return status,
        };
        match self.fs.open(&path, flags) {
            Ok(fd) => fd as isize,
            Err(err) => -err.status(),
        }
    }

    pub(super) fn sys_read(&self, cpu: CpuId, fd: usize, buf: usize, len: isize) -> isize {
        if !self.fs.is_open(fd) {
            return -STATUS_EBADF;
        }
        let (token, len) = match self.user_buffer(cpu, buf, len) {
            Ok(checked) => checked,
            Err(status) => return status,
        };
        // fault before the file position moves
        if check_user_buffer(self.mm.as_ref(), token, buf, len).is_err() {
            return -STATUS_EFAULT;
        }
        let mut data = vec![0u8; len];
        let n = match self.fs.read(fd, &mut data) {
            Ok(n) => n,
            Err(_) => return -STATUS_EIO,
        };
        match write_translated(self.mm.as_ref(), token, buf, &data[..n]) {
            Ok(()) => n as isize,
            Err(_) => -STATUS_EFAULT,
        }
    }

    pub(super) fn sys_write(&self, cpu: CpuId, fd: usize, buf: usize, len: isize) -> isize {
        if !self.fs.is_open(fd) {
            return -STATUS_EBADF;
        }
        let (token, len) = match self.user_buffer(cpu, buf, len) {
            Ok(checked) => checked,
            Err(status) => return status,
        };
        let data = match translated_byte_buffer(self.mm.as_ref(), token, buf, len) {
            Ok(data) => data,
            Err(_) => return -STATUS_EFAULT,
        };
        match self.fs.write(fd, &data) {
            Ok(n) => n as isize,
            Err(_) => -STATUS_EIO,
        }
    }

    pub(super) fn sys_close(&self, fd: usize) -> isize {
        if !self.fs.is_open(fd) {
            return -STATUS_EINVAL;
        }
        match self.fs.close(fd) {
            Ok(()) => STATUS_OK,
            Err(_) => -STATUS_EBADF,
        }
    }

    pub(super) fn sys_lseek(&self, fd: usize, offset: isize, whence: usize) -> isize {
        if offset < 0 {
            return -STATUS_EINVAL;
        }
        if !self.fs.is_open(fd) {
            return -STATUS_EBADF;
        }
        let (pos, size) = match self.fs.tell(fd) {
            Ok(at) => at,
            Err(_) => return -STATUS_EBADF,
        };
        let base = match whence {
            SEEK_SET => 0,
            SEEK_CUR => pos,
            SEEK_END => size,
            _ => return -STATUS_EINVAL,
        };
        let target = match base
            .checked_add(offset as usize)
            .filter(|&target| target <= isize::MAX as usize)
        {
            Some(target) => target,
            None => return -STATUS_EINVAL,
        };
        match self.fs.lseek(fd, target) {
            Ok(()) => target as isize,
            Err(_) => -STATUS_EIO,
        }
    }

    pub(super) fn sys_unlink(&self, cpu: CpuId, path: usize) -> isize {
        let path = match self.user_path(cpu, path) {
            Ok(path) => path,
            Err(status) => return status,
        };
        match self.fs.unlink(&path) {
            Ok(()) => STATUS_OK,
            Err(_) => -STATUS_ENOENT,
        }
    }

    pub(super) fn sys_readdir(&self, cpu: CpuId, dir: usize, info: usize) -> isize {
        if dir == 0 || info == 0 {
            return -STATUS_EINVAL;
        }
        let token = match self.current_space(cpu) {
            Some(token) => token,
            None => return -STATUS_EFAULT,
        };
        // the end of the stream is an entry with an empty name
        let entry = match self.fs.readdir(dir) {
            Ok(entry) => entry.unwrap_or_default(),
            Err(_) => return -STATUS_EIO,
        };
        match write_translated(self.mm.as_ref(), token, info, &entry.to_bytes()) {
            Ok(()) => STATUS_OK,
            Err(_) => -STATUS_EFAULT,
        }
    }

    pub(super) fn sys_opendir(&self, cpu: CpuId, dir: usize, path: usize) -> isize {
        if dir == 0 {
            return -STATUS_EINVAL;
        }
        let path = match self.user_path(cpu, path) {
            Ok(path) => path,
            Err(status) => return status,
        };
        match self.fs.opendir(dir, &path) {
            Ok(()) => STATUS_OK,
            Err(FsError::NoPath) | Err(FsError::NoFile) => -STATUS_ENOENT,
            Err(FsError::InvalidName) => -STATUS_EINVAL,
            Err(_) => -STATUS_EIO,
        }
    }

    pub(super) fn sys_closedir(&self, dir: usize) -> isize {
        match self.fs.closedir(dir) {
            Ok(()) => STATUS_OK,
            Err(FsError::InvalidObject) => -STATUS_EINVAL,
            Err(_) => -STATUS_EIO,
        }
    }
}
