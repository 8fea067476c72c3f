//! The task table: a fixed arena of task control blocks indexed by id.
//!
//! A freed slot can be claimed again by the very next creation; ids carry no
//! generation, so a released id must not be kept as a reference to a task.

use super::{TaskControlBlock, TaskId, TaskStatus};
use crate::sync::{SpinLock, SpinLockGuard};
use alloc::vec::Vec;

pub struct TaskManager {
    tasks: Vec<SpinLock<TaskControlBlock>>,
    /// Serializes the scan-and-claim step of task creation.
    claim_lock: SpinLock<()>,
}

impl TaskManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: (0..capacity)
                .map(|id| SpinLock::new(TaskControlBlock::empty(id)))
                .collect(),
            claim_lock: SpinLock::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.tasks.len()
    }

    pub fn inner_exclusive_access(&self, id: TaskId) -> SpinLockGuard<'_, TaskControlBlock> {
        self.tasks[id].lock()
    }

    /// Find a free slot, starting just after `caller` (or at slot 0 without
    /// one) and wrapping once, and reserve it as `Stopped`.
    pub fn claim(&self, caller: Option<TaskId>) -> Option<TaskId> {
        let _guard = self.claim_lock.lock();
        let n = self.tasks.len();
        let start = caller.map_or(0, |id| (id + 1) % n);
        for new_id in (0..n).map(|i| (start + i) % n) {
            let mut task = self.tasks[new_id].lock();
            if task.task_status == TaskStatus::Free {
                task.task_status = TaskStatus::Stopped;
                return Some(new_id);
            }
        }
        None
    }

    /// Return a slot to the free pool.
    pub fn release(&self, id: TaskId) {
        let mut task = self.tasks[id].lock();
        *task = TaskControlBlock::empty(id);
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.lock().task_status == status)
            .count()
    }
}
