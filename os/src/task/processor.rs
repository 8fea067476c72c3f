//! Per-cpu state: the run queue, the task running on the core, and the
//! round-robin scheduler over them.

use super::{CpuId, TaskId, TaskStatus};
use crate::kernel::Kernel;
use crate::sync::SpinLock;
use crate::trap::{TaskStateSegment, TrapFrame};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use log::*;

/// Ids of the tasks owned by one cpu, in insertion order.
///
/// Position 0 holds the core's first task and is never removed.
pub struct RunQueue {
    /// Position of the task dispatched last.
    index: usize,
    running: Vec<TaskId>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self {
            index: 0,
            running: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn push(&mut self, id: TaskId) {
        self.running.push(id);
    }

    /// Put a core's first task at position 0 ahead of anything queued
    /// before the core came online, and point the cursor at it.
    pub fn install_first(&mut self, id: TaskId) {
        self.running.insert(0, id);
        self.index = 0;
    }

    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.running.iter().position(|&t| t == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.running.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<TaskId> {
        self.running.clone()
    }

    /// Remove the entry at `pos`, shifting later entries down. The cursor
    /// is moved so the next scan starts at the entry that slid into `pos`.
    pub fn remove_at(&mut self, pos: usize) -> TaskId {
        assert!(pos > 0, "run queue slot 0 is not removable");
        let id = self.running.remove(pos);
        if pos <= self.index {
            self.index -= 1;
        }
        id
    }

    /// Positions in scan order: `index + 1` onwards, wrapping, ending at `index`.
    fn scan_order(&self) -> impl Iterator<Item = usize> {
        let (start, len) = (self.index, self.running.len());
        (1..=len).map(move |step| (start + step) % len)
    }
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Processor {
    current: Option<TaskId>,
    /// Context resumed while no task is runnable.
    idle_task_cx: TrapFrame,
}

impl Processor {
    pub fn new(idle_task_cx: TrapFrame) -> Self {
        Self {
            current: None,
            idle_task_cx,
        }
    }
    pub fn current(&self) -> Option<TaskId> {
        self.current
    }
    pub fn take_current(&mut self) -> Option<TaskId> {
        self.current.take()
    }
    pub(crate) fn set_current(&mut self, id: TaskId) {
        self.current = Some(id);
    }
    pub fn idle_task_cx(&self) -> &TrapFrame {
        &self.idle_task_cx
    }
}

/// Descriptor of one physical core.
pub struct Cpu {
    pub cpu_id: CpuId,
    pub(crate) rq: SpinLock<RunQueue>,
    pub(crate) processor: SpinLock<Processor>,
    pub(crate) tss: SpinLock<TaskStateSegment>,
    /// Raised by other cores that left work for this one, such as a
    /// deferred kill.
    pub(crate) resched_pending: AtomicBool,
    pub(crate) started: AtomicBool,
}

impl Cpu {
    pub fn new(cpu_id: CpuId, kernel_stack_top: usize) -> Self {
        Self {
            cpu_id,
            rq: SpinLock::new(RunQueue::new()),
            processor: SpinLock::new(Processor::new(TrapFrame::idle_context(kernel_stack_top))),
            tss: SpinLock::new(TaskStateSegment::default()),
            resched_pending: AtomicBool::new(false),
            started: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> Option<TaskId> {
        self.processor.lock().current()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn tss(&self) -> TaskStateSegment {
        *self.tss.lock()
    }

    /// Context the core resumes while it has nothing to run.
    pub fn idle_frame(&self) -> TrapFrame {
        *self.processor.lock().idle_task_cx()
    }
}

impl Kernel {
    /// Pick the next task on `cpu` round-robin and make it current.
    ///
    /// The scan starts after the last dispatched position and ends at it, so
    /// the task that was running is chosen again only when nothing else can
    /// run. With nothing runnable the core goes idle. The caller resumes the
    /// chosen context on its way out of the trap; no lock outlives this call.
    pub fn schedule(&self, cpu: CpuId) {
        trace!("schedule on cpu {}", cpu);
        let core = &self.cpus[cpu];
        let mut rq = core.rq.lock();
        let mut processor = core.processor.lock();
        let prev = processor.current;
        let mut next = None;
        for pos in rq.scan_order() {
            let id = rq.running[pos];
            let mut task = self.tasks.inner_exclusive_access(id);
            let eligible = task.task_status == TaskStatus::Runnable
                || (Some(id) == prev && task.task_status == TaskStatus::Running);
            if eligible {
                task.task_status = TaskStatus::Running;
                task.remind_ticks = self.config.time_quant;
                next = Some((pos, id, task.memory_set));
                break;
            }
        }
        if let Some(prev) = prev.filter(|&prev| next.map(|(_, id, _)| id) != Some(prev)) {
            // switched away from a task that never gave up the cpu
            let mut task = self.tasks.inner_exclusive_access(prev);
            if task.task_status == TaskStatus::Running {
                task.task_status = TaskStatus::Runnable;
            }
        }
        let space = match next {
            Some((pos, id, space)) => {
                rq.index = pos;
                processor.current = Some(id);
                space
            }
            None => {
                processor.current = None;
                None
            }
        };
        // switch spaces before a remote kill can see the old task off-core
        self.mm
            .activate(cpu, space.unwrap_or_else(|| self.mm.kernel_page_table()));
        drop(processor);
        drop(rq);
        match next {
            Some((_, id, _)) if prev != Some(id) => debug!("cpu {} switch {:?} -> {}", cpu, prev, id),
            None if prev.is_some() => debug!("cpu {} idle", cpu),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(ids: &[TaskId]) -> RunQueue {
        let mut rq = RunQueue::new();
        ids.iter().for_each(|&id| rq.push(id));
        rq
    }

    #[test]
    fn scan_starts_after_cursor_and_ends_on_it() {
        let mut rq = queue(&[7, 8, 9]);
        rq.index = 1;
        let order: Vec<_> = rq.scan_order().collect();
        assert_eq!(order, [2, 0, 1]);
    }

    #[test]
    fn removal_before_cursor_keeps_current_under_it() {
        let mut rq = queue(&[0, 4, 5, 6]);
        rq.index = 3;
        assert_eq!(rq.remove_at(1), 4);
        assert_eq!(rq.to_vec(), [0, 5, 6]);
        assert_eq!(rq.running[rq.index()], 6);
    }

    #[test]
    fn removing_the_current_entry_resumes_scan_at_its_successor() {
        let mut rq = queue(&[0, 4, 5]);
        rq.index = 1;
        rq.remove_at(1);
        assert_eq!(rq.scan_order().next(), Some(1));
        assert_eq!(rq.running[1], 5);
    }

    #[test]
    fn first_task_goes_ahead_of_early_arrivals() {
        let mut rq = queue(&[3, 5]);
        rq.install_first(2);
        assert_eq!(rq.to_vec(), [2, 3, 5]);
        assert_eq!(rq.index(), 0);
        assert_eq!(rq.scan_order().next(), Some(1));
    }

    #[test]
    #[should_panic]
    fn base_slot_cannot_be_removed() {
        queue(&[0, 1]).remove_at(0);
    }
}
