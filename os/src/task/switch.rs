//! Context capture and resume.
//!
//! There is no raw jump between kernel stacks here. Trap entry copies the
//! live registers into the current task's control block, and trap return
//! overwrites the live registers with whatever context is current on the core
//! by then. A switch made by [`Kernel::schedule`] in between therefore
//! resumes the chosen task, and the interrupted caller continues only when it
//! is chosen again.

use super::{CpuId, TaskId};
use crate::kernel::Kernel;
use crate::trap::TrapFrame;

impl Kernel {
    /// Save `ctx` into the task running on `cpu`, returning its id.
    pub(crate) fn save_current(&self, cpu: CpuId, ctx: &TrapFrame) -> Option<TaskId> {
        let current = self.cpus[cpu].current()?;
        let mut task = self.tasks.inner_exclusive_access(current);
        if !task.is_live() {
            return None;
        }
        task.trap_cx = *ctx;
        Some(current)
    }

    /// Load the context now current on `cpu` into `ctx`.
    pub(crate) fn resume_current(&self, cpu: CpuId, ctx: &mut TrapFrame) {
        let processor = self.cpus[cpu].processor.lock();
        match processor.current() {
            Some(id) => *ctx = self.tasks.inner_exclusive_access(id).trap_cx,
            None => *ctx = *processor.idle_task_cx(),
        }
    }
}
