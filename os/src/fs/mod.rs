//! Filesystem collaborator.
//!
//! The FAT library and its descriptor table live outside the task core. The
//! syscall layer validates arguments, moves bytes between user memory and
//! the kernel, calls [`FileSystem`] and folds its [`FsError`] into the
//! negative status returned to user code.

use alloc::string::String;
use core::fmt::{self, Display, Formatter};

pub const STATUS_OK: isize = 0;
pub const STATUS_EPERM: isize = 1;
pub const STATUS_ENOENT: isize = 2;
pub const STATUS_EIO: isize = 5;
pub const STATUS_EBADF: isize = 9;
pub const STATUS_ENOMEM: isize = 12;
pub const STATUS_EFAULT: isize = 14;
pub const STATUS_EEXIST: isize = 17;
pub const STATUS_EINVAL: isize = 22;
pub const STATUS_ENOSPC: isize = 28;
pub const STATUS_EROFS: isize = 30;

pub const SEEK_SET: usize = 0;
pub const SEEK_CUR: usize = 1;
pub const SEEK_END: usize = 2;

/// Failure codes of the FAT library.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FsError {
    DiskErr,
    IntErr,
    NotReady,
    NoFile,
    NoPath,
    InvalidName,
    Denied,
    Exist,
    InvalidObject,
    WriteProtected,
    InvalidDrive,
    NotEnabled,
    NoFilesystem,
    Timeout,
    Locked,
    NotEnoughCore,
    TooManyOpenFiles,
}

impl FsError {
    /// Positive status code reported for this failure.
    pub fn status(self) -> isize {
        match self {
            FsError::NoFile | FsError::NoPath => STATUS_ENOENT,
            FsError::Exist => STATUS_EEXIST,
            FsError::WriteProtected => STATUS_EROFS,
            FsError::TooManyOpenFiles => STATUS_ENOSPC,
            _ => STATUS_EIO,
        }
    }
}

impl Display for FsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (status {})", self, self.status())
    }
}

/// One directory entry, laid out in user memory like the FAT library's
/// `FILINFO`: size, date, time, attributes, then an 8.3 name with its NUL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u32,
    pub date: u16,
    pub time: u16,
    pub attrib: u8,
    pub name: String,
}

pub const FILINFO_NAME_LEN: usize = 13;
pub const FILINFO_SIZE: usize = 9 + FILINFO_NAME_LEN;

impl FileInfo {
    pub fn to_bytes(&self) -> [u8; FILINFO_SIZE] {
        let mut raw = [0u8; FILINFO_SIZE];
        raw[0..4].copy_from_slice(&self.size.to_le_bytes());
        raw[4..6].copy_from_slice(&self.date.to_le_bytes());
        raw[6..8].copy_from_slice(&self.time.to_le_bytes());
        raw[8] = self.attrib;
        let name = self.name.as_bytes();
        let n = name.len().min(FILINFO_NAME_LEN - 1);
        raw[9..9 + n].copy_from_slice(&name[..n]);
        raw
    }
}

/// File operations keyed by descriptors the filesystem layer allocates.
pub trait FileSystem: Send + Sync {
    /// Open `path` on a fresh descriptor.
    fn open(&self, path: &str, flags: usize) -> Result<usize, FsError>;
    fn is_open(&self, fd: usize) -> bool;
    fn read(&self, fd: usize, buf: &mut [u8]) -> Result<usize, FsError>;
    fn write(&self, fd: usize, data: &[u8]) -> Result<usize, FsError>;
    fn close(&self, fd: usize) -> Result<(), FsError>;
    /// Current position and size of an open file.
    fn tell(&self, fd: usize) -> Result<(usize, usize), FsError>;
    /// Move to the absolute `offset`.
    fn lseek(&self, fd: usize, offset: usize) -> Result<(), FsError>;
    fn unlink(&self, path: &str) -> Result<(), FsError>;
    /// Open a directory stream identified by the caller's `dir` object.
    fn opendir(&self, dir: usize, path: &str) -> Result<(), FsError>;
    /// Next entry of `dir`, `None` at the end.
    fn readdir(&self, dir: usize) -> Result<Option<FileInfo>, FsError>;
    fn closedir(&self, dir: usize) -> Result<(), FsError>;
}
