use crate::kernel::Kernel;
use crate::task::{CpuId, KillOutcome};
use crate::trap::TrapFrameArgs;
use log::warn;

impl Kernel {
    pub(super) fn sys_fork(&self, cpu: CpuId) -> isize {
        match self.fork(cpu) {
            Ok(pid) => pid as isize,
            Err(err) => {
                warn!("fork on cpu {}: {}", cpu, err);
                -1
            }
        }
    }

    pub(super) fn sys_getpid(&self, cpu: CpuId) -> isize {
        self.cpus[cpu].current().map_or(-1, |id| id as isize)
    }

    pub(super) fn sys_getcid(&self, cpu: CpuId) -> isize {
        cpu as isize
    }

    /// The caller's result is stored before it gives up the cpu; it is
    /// resumed only after the countdown ends.
    pub(super) fn sys_sleep(&self, cpu: CpuId, ticks: i32) {
        if let Some(id) = self.cpus[cpu].current() {
            self.tasks.inner_exclusive_access(id).trap_cx[TrapFrameArgs::RET] = 0;
        }
        self.sleep(cpu, ticks);
    }

    /// Kill the caller. Nothing returns to it unless the kill was refused.
    pub(super) fn sys_kill(&self, cpu: CpuId) -> Option<isize> {
        let id = self.cpus[cpu].current()?;
        match self.kill(cpu, id) {
            KillOutcome::Killed => None,
            _ => Some(-1),
        }
    }

    pub(super) fn sys_get_num_free_page(&self) -> isize {
        self.mm.num_free_pages() as isize
    }

    pub(super) fn sys_get_num_used_page(&self) -> isize {
        self.mm.num_used_pages() as isize
    }

    pub(super) fn sys_get_ticks(&self) -> isize {
        self.get_ticks() as isize
    }
}
