use super::TaskId;
use crate::mm::PageTable;
use crate::trap::TrapFrame;

/// One slot of the task table.
pub struct TaskControlBlock {
    pub task_id: TaskId,
    /// `None` for the first task of a core.
    pub parent_id: Option<TaskId>,
    /// Registers saved at the last trap, or built at creation.
    pub trap_cx: TrapFrame,
    /// Quantum left while running, sleep countdown while sleeping.
    pub remind_ticks: i32,
    pub task_status: TaskStatus,
    /// Root of the address space owned by this task.
    pub memory_set: Option<PageTable>,
    /// Set by a core that tried to kill this task while it ran elsewhere.
    pub kill_requested: bool,
}

impl TaskControlBlock {
    pub(crate) fn empty(task_id: TaskId) -> Self {
        Self {
            task_id,
            parent_id: None,
            trap_cx: TrapFrame::new(),
            remind_ticks: 0,
            task_status: TaskStatus::Free,
            memory_set: None,
            kill_requested: false,
        }
    }

    /// Whether the slot holds a task that may sit on a run queue.
    pub fn is_live(&self) -> bool {
        matches!(
            self.task_status,
            TaskStatus::Runnable | TaskStatus::Running | TaskStatus::Sleeping
        )
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            task_id: self.task_id,
            parent_id: self.parent_id,
            status: self.task_status,
            remaining_ticks: self.remind_ticks,
            address_space: self.memory_set,
            trap_cx: self.trap_cx,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Free,
    Runnable,
    Running,
    Sleeping,
    /// Claimed for setup or being torn down; invisible to the scheduler.
    Stopped,
}

/// Point-in-time copy of a task control block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskInfo {
    pub task_id: TaskId,
    pub parent_id: Option<TaskId>,
    pub status: TaskStatus,
    pub remaining_ticks: i32,
    pub address_space: Option<PageTable>,
    pub trap_cx: TrapFrame,
}
