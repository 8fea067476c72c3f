//! The shared state of every core, passed explicitly to each operation.

use crate::config::{percpu_kstack_top, KernelConfig};
use crate::console::Console;
use crate::fs::FileSystem;
use crate::mm::MemoryManager;
use crate::task::{Cpu, CpuId, TaskError, TaskId, TaskInfo, TaskManager, TaskStatus};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::AtomicU64;
use log::info;

pub struct Kernel {
    pub(crate) config: KernelConfig,
    pub(crate) tasks: TaskManager,
    pub(crate) cpus: Vec<Cpu>,
    /// Timer interrupts since boot, across all cores.
    pub(crate) ticks: AtomicU64,
    pub(crate) mm: Arc<dyn MemoryManager>,
    pub(crate) console: Arc<dyn Console>,
    pub(crate) fs: Arc<dyn FileSystem>,
}

impl Kernel {
    /// A kernel with every task slot free and every core offline.
    pub fn new(
        config: KernelConfig,
        mm: Arc<dyn MemoryManager>,
        console: Arc<dyn Console>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        info!(
            "task core: {} cpus, {} task slots, quantum {}",
            config.ncpu, config.nr_tasks, config.time_quant
        );
        Self {
            config,
            tasks: TaskManager::new(config.nr_tasks),
            cpus: (0..config.ncpu)
                .map(|cpu| Cpu::new(cpu, percpu_kstack_top(cpu)))
                .collect(),
            ticks: AtomicU64::new(0),
            mm,
            console,
            fs,
        }
    }

    /// Bring every core online in order, returning their first tasks.
    pub fn boot(&self) -> Result<Vec<TaskId>, TaskError> {
        (0..self.config.ncpu)
            .map(|cpu| self.task_init_percpu(cpu))
            .collect()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn ncpu(&self) -> usize {
        self.cpus.len()
    }

    pub fn cpu(&self, cpu: CpuId) -> &Cpu {
        &self.cpus[cpu]
    }

    pub fn current(&self, cpu: CpuId) -> Option<TaskId> {
        self.cpus[cpu].current()
    }

    /// Snapshot of the run queue of `cpu`.
    pub fn run_queue(&self, cpu: CpuId) -> Vec<TaskId> {
        self.cpus[cpu].rq.lock().to_vec()
    }

    pub fn task_info(&self, id: TaskId) -> TaskInfo {
        self.tasks.inner_exclusive_access(id).info()
    }

    /// Number of task slots in `status`.
    pub fn task_count(&self, status: TaskStatus) -> usize {
        self.tasks.count(status)
    }
}
