//! Timer tick handling: sleep countdowns and quantum expiry.

use crate::config::{PIT_CLOCK, TIME_HZ};
use crate::kernel::Kernel;
use crate::task::{CpuId, TaskStatus};
use core::sync::atomic::Ordering;
use log::trace;

/// Reload value that makes the interval timer fire `hz` times a second.
pub fn pit_divisor(hz: usize) -> u16 {
    (PIT_CLOCK / hz) as u16
}

/// Reload value for the kernel tick rate.
pub fn tick_divisor() -> u16 {
    pit_divisor(TIME_HZ)
}

impl Kernel {
    /// Handle one timer interrupt on `cpu`.
    ///
    /// Only tasks queued on `cpu` age: sleepers count down and wake at zero,
    /// then the running task loses a tick of its quantum and is preempted
    /// when it runs out. An idle core looks for work on every tick.
    pub fn timer_handler(&self, cpu: CpuId) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let core = &self.cpus[cpu];
        {
            let rq = core.rq.lock();
            for id in rq.iter() {
                let mut task = self.tasks.inner_exclusive_access(id);
                if task.task_status == TaskStatus::Sleeping {
                    task.remind_ticks -= 1;
                    if task.remind_ticks <= 0 {
                        task.task_status = TaskStatus::Runnable;
                        trace!("task {} woke on cpu {}", id, cpu);
                    }
                }
            }
        }
        let expired = match core.current() {
            Some(id) => {
                let mut task = self.tasks.inner_exclusive_access(id);
                task.remind_ticks -= 1;
                if task.remind_ticks <= 0 {
                    task.task_status = TaskStatus::Runnable;
                    true
                } else {
                    false
                }
            }
            None => true,
        };
        if expired {
            self.schedule(cpu);
        }
    }

    /// Put the task running on `cpu` to sleep for `ticks` timer ticks and
    /// give the core away.
    pub fn sleep(&self, cpu: CpuId, ticks: i32) {
        if let Some(id) = self.cpus[cpu].current() {
            let mut task = self.tasks.inner_exclusive_access(id);
            task.remind_ticks = ticks;
            task.task_status = TaskStatus::Sleeping;
        }
        self.schedule(cpu);
    }

    /// Timer interrupts since boot.
    pub fn get_ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_for_kernel_rate() {
        assert_eq!(tick_divisor(), 11931);
        assert_eq!(pit_divisor(1000), 1193);
    }
}
