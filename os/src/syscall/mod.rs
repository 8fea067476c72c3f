//! Implementation of syscalls
//!
//! The single entry point to all system calls, [`Kernel::syscall`], is called
//! whenever userspace wishes to perform a system call using the `int`
//! instruction. The trap layer delivers it as [`TrapType::SysCall`], which is
//! handled as one of the cases in [`Kernel::kernel_interrupt`]. The number
//! travels in `eax`, up to five arguments in `edx`, `ecx`, `ebx`, `edi` and
//! `esi`, and the result goes back in `eax`.
//!
//! [`TrapType::SysCall`]: crate::trap::TrapType::SysCall
//!
//! For clarity, each single syscall is implemented as its own function, named
//! `sys_` then the name of the syscall. You can find functions like this in
//! submodules, and you should also implement syscalls this way.

pub const SYSCALL_PUTS: usize = 0;
pub const SYSCALL_GETC: usize = 1;
pub const SYSCALL_GETPID: usize = 2;
pub const SYSCALL_GETCID: usize = 3;
pub const SYSCALL_FORK: usize = 4;
pub const SYSCALL_KILL: usize = 5;
pub const SYSCALL_SLEEP: usize = 6;
pub const SYSCALL_GET_NUM_FREE_PAGE: usize = 7;
pub const SYSCALL_GET_NUM_USED_PAGE: usize = 8;
pub const SYSCALL_GET_TICKS: usize = 9;
pub const SYSCALL_SETTEXTCOLOR: usize = 10;
pub const SYSCALL_CLS: usize = 11;
pub const SYSCALL_OPEN: usize = 12;
pub const SYSCALL_READ: usize = 13;
pub const SYSCALL_WRITE: usize = 14;
pub const SYSCALL_CLOSE: usize = 15;
pub const SYSCALL_LSEEK: usize = 16;
pub const SYSCALL_UNLINK: usize = 17;
pub const SYSCALL_READDIR: usize = 18;
pub const SYSCALL_OPENDIR: usize = 19;
pub const SYSCALL_CLOSEDIR: usize = 20;

mod fs;
mod process;

use crate::kernel::Kernel;
use crate::mm::PageTable;
use crate::task::CpuId;
use log::{debug, warn};

impl Kernel {
    /// Handle syscall `syscall_id` for the task running on `cpu`.
    ///
    /// Returns the value for the caller's result register, or `None` when
    /// there is nothing to write back: the caller is gone, or it suspended
    /// after its result was already stored.
    pub fn syscall(&self, cpu: CpuId, syscall_id: usize, args: [usize; 5]) -> Option<isize> {
        debug!("cpu {} syscall {} {:x?}", cpu, syscall_id, args);
        let ret = match syscall_id {
            SYSCALL_PUTS => self.sys_puts(cpu, args[0], args[1] as isize),
            SYSCALL_GETC => self.sys_getc(),
            SYSCALL_GETPID => self.sys_getpid(cpu),
            SYSCALL_GETCID => self.sys_getcid(cpu),
            SYSCALL_FORK => self.sys_fork(cpu),
            SYSCALL_KILL => return self.sys_kill(cpu),
            SYSCALL_SLEEP => {
                self.sys_sleep(cpu, args[0] as i32);
                return None;
            }
            SYSCALL_GET_NUM_FREE_PAGE => self.sys_get_num_free_page(),
            SYSCALL_GET_NUM_USED_PAGE => self.sys_get_num_used_page(),
            SYSCALL_GET_TICKS => self.sys_get_ticks(),
            SYSCALL_SETTEXTCOLOR => self.sys_settextcolor(args[0] as u8, args[1] as u8),
            SYSCALL_CLS => self.sys_cls(),
            SYSCALL_OPEN => self.sys_open(cpu, args[0], args[1], args[2]),
            SYSCALL_READ => self.sys_read(cpu, args[0], args[1], args[2] as isize),
            SYSCALL_WRITE => self.sys_write(cpu, args[0], args[1], args[2] as isize),
            SYSCALL_CLOSE => self.sys_close(args[0]),
            SYSCALL_LSEEK => self.sys_lseek(args[0], args[1] as isize, args[2]),
            SYSCALL_UNLINK => self.sys_unlink(cpu, args[0]),
            SYSCALL_READDIR => self.sys_readdir(cpu, args[0], args[1]),
            SYSCALL_OPENDIR => self.sys_opendir(cpu, args[0], args[1]),
            SYSCALL_CLOSEDIR => self.sys_closedir(args[0]),
            _ => {
                warn!("Unsupported syscall_id: {}", syscall_id);
                -1
            }
        };
        Some(ret)
    }

    /// Address space of the task running on `cpu`.
    fn current_space(&self, cpu: CpuId) -> Option<PageTable> {
        let id = self.cpus[cpu].current()?;
        self.tasks.inner_exclusive_access(id).memory_set
    }
}
