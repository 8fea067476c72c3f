//! Constants used in the task core, plus the runtime [`KernelConfig`].

pub const PAGE_SIZE: usize = 0x1000;

/// Capacity of the task table.
pub const NR_TASKS: usize = 1024;
/// Timer ticks a task may run before it is preempted.
pub const TIME_QUANT: i32 = 100;
/// Timer interrupt frequency.
pub const TIME_HZ: usize = 100;
/// Input clock of the programmable interval timer.
pub const PIT_CLOCK: usize = 1193180;

pub const MAX_CPU: usize = 8;

/// Each task's user stack.
pub const USR_STACK_SIZE: usize = 40960;
pub const USTACKTOP: usize = 0xeebf_e000;
/// Where the shared user program image is mapped in every address space.
pub const UTEXT: usize = 0x0080_0000;

pub const KSTKSIZE: usize = 4096 * 8;
pub const KSTACKTOP: usize = 0xefc0_0000;
pub const KSTKGAP: usize = 4096 * 8;

/// Runtime knobs for one kernel instance.
#[derive(Clone, Copy, Debug)]
pub struct KernelConfig {
    /// Number of cores brought up.
    pub ncpu: usize,
    /// Task table capacity.
    pub nr_tasks: usize,
    pub time_quant: i32,
    /// Entry of the boot core's first task.
    pub user_entry: usize,
    /// Entry of the first task on every other core.
    pub idle_entry: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            ncpu: 1,
            nr_tasks: NR_TASKS,
            time_quant: TIME_QUANT,
            user_entry: UTEXT,
            idle_entry: UTEXT + 0x100,
        }
    }
}

impl KernelConfig {
    pub fn with_cpus(ncpu: usize) -> Self {
        assert!(ncpu > 0 && ncpu <= MAX_CPU, "bad cpu count {}", ncpu);
        Self {
            ncpu,
            ..Self::default()
        }
    }
}

/// Top of the kernel stack reserved for `cpu`.
pub fn percpu_kstack_top(cpu: usize) -> usize {
    KSTACKTOP - cpu * (KSTKSIZE + KSTKGAP)
}
