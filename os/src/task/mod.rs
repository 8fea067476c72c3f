//! Task management implementation
//!
//! Everything about the life of a task lives here: creating the first task
//! of each core, fork with load balancing across cores, and kill.
//!
//! All of it is reached through a [`Kernel`] and always names the cpu it runs
//! on; nothing looks up "this cpu" behind the caller's back.

mod manager;
mod processor;
mod switch;
#[allow(clippy::module_inception)]
mod task;

use crate::config::PAGE_SIZE;
use crate::config::{percpu_kstack_top, USTACKTOP};
use crate::kernel::Kernel;
use crate::mm::{user_stack_range, MapPermission, MemError, PageTable};
use crate::trap::{TaskStateSegment, TrapFrame, TrapFrameArgs};
use alloc::vec::Vec;
use core::fmt::{self, Display, Formatter};
use core::sync::atomic::Ordering;
use log::*;

pub use manager::TaskManager;
pub use processor::{Cpu, Processor, RunQueue};
pub use task::{TaskControlBlock, TaskInfo, TaskStatus};

/// Index of a task in the task table.
pub type TaskId = usize;
/// Index of a physical core.
pub type CpuId = usize;

/// The core that runs the user program; the others start on the idle entry.
pub const BOOT_CPU: CpuId = 0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskError {
    /// Every slot of the task table is in use.
    ResourceExhausted,
    /// Building the address space ran out of memory.
    Memory(MemError),
}

impl From<MemError> for TaskError {
    fn from(err: MemError) -> Self {
        TaskError::Memory(err)
    }
}

impl Display for TaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::ResourceExhausted => write!(f, "task table exhausted"),
            TaskError::Memory(err) => write!(f, "task setup failed: {}", err),
        }
    }
}

/// What [`Kernel::kill`] did with its target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KillOutcome {
    /// Removed from its run queue and freed.
    Killed,
    /// Running on another core; that core kills it at its next trap.
    Deferred,
    /// The first task of a core.
    Refused,
    /// Out of range or not a live task.
    Ignored,
}

impl Kernel {
    /// Claim a free slot and give it an address space with a zeroed user
    /// stack and a user-mode entry frame.
    ///
    /// The returned task is `Runnable` but sits on no run queue yet. On
    /// failure the slot is free again and every page taken is returned.
    pub fn create_task(&self, caller: Option<TaskId>) -> Result<TaskId, TaskError> {
        self.spawn(caller).map(|(id, _)| id)
    }

    fn spawn(&self, caller: Option<TaskId>) -> Result<(TaskId, PageTable), TaskError> {
        let new_id = self
            .tasks
            .claim(caller)
            .ok_or(TaskError::ResourceExhausted)?;
        let memory_set = match self.setup_user_space() {
            Ok(pt) => pt,
            Err(err) => {
                self.tasks.release(new_id);
                warn!("task {} setup failed: {}", new_id, err);
                return Err(err.into());
            }
        };
        let mut task = self.tasks.inner_exclusive_access(new_id);
        task.trap_cx = TrapFrame::app_init_context(0, USTACKTOP - PAGE_SIZE);
        task.task_id = new_id;
        task.parent_id = caller;
        task.remind_ticks = self.config.time_quant;
        task.memory_set = Some(memory_set);
        task.kill_requested = false;
        task.task_status = TaskStatus::Runnable;
        info!("task {} created (parent {:?})", new_id, caller);
        Ok((new_id, memory_set))
    }

    fn setup_user_space(&self) -> Result<PageTable, MemError> {
        let pt = self.mm.create_address_space()?;
        for va in user_stack_range() {
            let page = match self.mm.page_alloc() {
                Ok(page) => page,
                Err(err) => {
                    self.release_user_space(pt);
                    return Err(err);
                }
            };
            if let Err(err) =
                self.mm
                    .page_insert(pt, page, va, MapPermission::U | MapPermission::W | MapPermission::R)
            {
                self.mm.page_free(page);
                self.release_user_space(pt);
                return Err(err);
            }
        }
        Ok(pt)
    }

    fn release_user_space(&self, pt: PageTable) {
        for va in user_stack_range() {
            self.mm.page_remove(pt, va);
        }
        self.mm.destroy_address_space(pt);
    }

    /// Bring up `cpu`: program its task state segment, create its first task
    /// and make that task the only entry of its run queue, already running.
    pub fn task_init_percpu(&self, cpu: CpuId) -> Result<TaskId, TaskError> {
        *self.cpus[cpu].tss.lock() = TaskStateSegment::for_kernel_stack(percpu_kstack_top(cpu));
        let (id, pt) = self.spawn(None)?;
        if let Err(err) = self.mm.map_user_image(pt) {
            self.task_free(cpu, id, pt);
            return Err(err.into());
        }
        let entry = if cpu == BOOT_CPU {
            self.config.user_entry
        } else {
            self.config.idle_entry
        };
        {
            let core = &self.cpus[cpu];
            let mut rq = core.rq.lock();
            let mut processor = core.processor.lock();
            let mut task = self.tasks.inner_exclusive_access(id);
            task.trap_cx[TrapFrameArgs::SEPC] = entry;
            task.task_status = TaskStatus::Running;
            // forks balanced onto this core before it came up stay queued
            rq.install_first(id);
            processor.set_current(id);
        }
        self.mm.activate(cpu, pt);
        self.cpus[cpu].started.store(true, Ordering::Release);
        info!("cpu {} online, first task {}", cpu, id);
        Ok(id)
    }

    /// Copy the calling task into a new one and queue it on the least
    /// loaded core.
    ///
    /// The child gets the caller's registers and a copy of every mapped user
    /// stack page; it sees 0 as its result, the caller sees the child's id.
    pub fn fork(&self, cpu: CpuId) -> Result<TaskId, TaskError> {
        let parent = self.cpus[cpu].current();
        let (pid, pt) = self.spawn(parent)?;
        if let Some(parent) = parent {
            if let Err(err) = self.copy_from_parent(parent, pid, pt) {
                self.task_free(cpu, pid, pt);
                return Err(err.into());
            }
        }
        let selected = self.enqueue_balanced(pid);
        debug!("fork {:?} -> {} on cpu {}", parent, pid, selected);
        Ok(pid)
    }

    fn copy_from_parent(
        &self,
        parent: TaskId,
        child: TaskId,
        child_pt: PageTable,
    ) -> Result<(), MemError> {
        let (parent_cx, parent_pt) = {
            let task = self.tasks.inner_exclusive_access(parent);
            (task.trap_cx, task.memory_set.ok_or(MemError::BadAddressSpace)?)
        };
        for va in user_stack_range() {
            if let Some(src) = self.mm.translate(parent_pt, va) {
                let dst = self
                    .mm
                    .translate(child_pt, va)
                    .ok_or(MemError::NotMapped(va))?;
                self.mm.copy_page(dst, src);
            }
        }
        self.mm.map_user_image(child_pt)?;
        let mut task = self.tasks.inner_exclusive_access(child);
        task.trap_cx = parent_cx;
        task.trap_cx[TrapFrameArgs::RET] = 0;
        Ok(())
    }

    /// Append `id` to the shortest run queue, ties going to the lowest cpu.
    fn enqueue_balanced(&self, id: TaskId) -> CpuId {
        let mut selected = 0;
        let mut min = usize::MAX;
        for core in self.cpus.iter() {
            let len = core.rq.lock().len();
            if len < min {
                min = len;
                selected = core.cpu_id;
            }
        }
        self.cpus[selected].rq.lock().push(id);
        selected
    }

    /// Kill `task_id` on behalf of code running on `cpu`.
    ///
    /// Ids outside `1..capacity`, tasks on no run queue and the first task of
    /// a core are left alone. A task running on another core is only flagged;
    /// that core finishes the job at its next trap. Otherwise the task leaves
    /// its run queue, its memory is released and the slot is free. A task
    /// killing itself gives up the cpu before this returns.
    pub fn kill(&self, cpu: CpuId, task_id: TaskId) -> KillOutcome {
        if task_id == 0 || task_id >= self.tasks.capacity() {
            return KillOutcome::Ignored;
        }
        for core in self.cpus.iter() {
            let mut rq = core.rq.lock();
            let pos = match rq.position(task_id) {
                Some(pos) => pos,
                None => continue,
            };
            if pos == 0 {
                // prevent the core from losing its first task
                warn!("kill {}: first task of cpu {}", task_id, core.cpu_id);
                return KillOutcome::Refused;
            }
            // `current` only moves under this queue lock, so it is stable here
            let mut processor = core.processor.lock();
            let is_current = processor.current() == Some(task_id);
            let mut task = self.tasks.inner_exclusive_access(task_id);
            if is_current && core.cpu_id != cpu {
                task.kill_requested = true;
                core.resched_pending.store(true, Ordering::Release);
                info!("kill {}: running on cpu {}, deferred", task_id, core.cpu_id);
                return KillOutcome::Deferred;
            }
            task.task_status = TaskStatus::Stopped;
            let pt = task.memory_set;
            drop(task);
            rq.remove_at(pos);
            if is_current {
                processor.take_current();
            }
            drop(processor);
            drop(rq);
            match pt {
                Some(pt) => self.task_free(cpu, task_id, pt),
                None => self.tasks.release(task_id),
            }
            info!("task {} killed by cpu {}", task_id, cpu);
            if is_current {
                // the caller's own context is gone; give the core away
                self.schedule(cpu);
            }
            return KillOutcome::Killed;
        }
        KillOutcome::Ignored
    }

    /// Release the user stack and address space of `id`, then free its slot.
    fn task_free(&self, cpu: CpuId, id: TaskId, pt: PageTable) {
        if self.mm.active(cpu) == pt {
            self.mm.activate(cpu, self.mm.kernel_page_table());
        }
        self.release_user_space(pt);
        self.tasks.release(id);
    }

    /// Finish kills other cores requested for tasks on `cpu`.
    pub(crate) fn reap_pending(&self, cpu: CpuId) {
        let core = &self.cpus[cpu];
        if !core.resched_pending.swap(false, Ordering::AcqRel) {
            return;
        }
        let doomed: Vec<TaskId> = {
            let rq = core.rq.lock();
            rq.iter()
                .filter(|&id| self.tasks.inner_exclusive_access(id).kill_requested)
                .collect()
        };
        for id in doomed {
            self.kill(cpu, id);
        }
    }
}
