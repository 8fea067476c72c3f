//! Trap handling
//!
//! The low-level entry code captures the interrupted registers into a
//! [`TrapFrame`] and calls [`Kernel::kernel_interrupt`] with the decoded
//! [`TrapType`]. Whatever context is current on the core when the handler
//! returns is what the entry code restores.

mod context;

use crate::kernel::Kernel;
use crate::task::{CpuId, TaskStatus};
use log::warn;

pub use context::*;

/// Interrupt vector of the system call gate.
pub const T_SYSCALL: usize = 0x30;
/// Vector the interval timer is routed to.
pub const IRQ_TIMER: usize = 0x20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapType {
    Time,
    SysCall,
    Breakpoint,
    /// Faulting address.
    PageFault(usize),
    Unknown(usize),
}

impl TrapType {
    /// Decode the vector stored in a trap frame. `fault_va` is what the
    /// entry code read from `cr2`.
    pub fn from_frame(ctx: &TrapFrame, fault_va: usize) -> Self {
        match ctx.trapno {
            IRQ_TIMER => TrapType::Time,
            T_SYSCALL => TrapType::SysCall,
            3 => TrapType::Breakpoint,
            14 => TrapType::PageFault(fault_va),
            other => TrapType::Unknown(other),
        }
    }
}

impl Kernel {
    /// kernel interrupt
    pub fn kernel_interrupt(&self, cpu: CpuId, ctx: &mut TrapFrame, trap_type: TrapType) {
        let caller = self.save_current(cpu, ctx);
        self.reap_pending(cpu);
        match trap_type {
            TrapType::Breakpoint => {}
            TrapType::Time => self.timer_handler(cpu),
            TrapType::SysCall => {
                // a deferred kill may have taken the caller away
                if let Some(id) = caller.filter(|&id| self.current(cpu) == Some(id)) {
                    let args = ctx.args();
                    let result = self.syscall(cpu, ctx[TrapFrameArgs::SYSCALL], args);
                    if let Some(result) = result {
                        let mut task = self.tasks.inner_exclusive_access(id);
                        if task.task_status != TaskStatus::Free {
                            task.trap_cx[TrapFrameArgs::RET] = result as usize;
                        }
                    }
                }
            }
            TrapType::PageFault(addr) => {
                warn!("cpu {}: page fault at {:#x} in task {:?}, killed", cpu, addr, caller);
                if let Some(id) = caller {
                    self.kill(cpu, id);
                }
            }
            TrapType::Unknown(trapno) => {
                warn!("unsuspended trap {} on cpu {}", trapno, cpu);
            }
        }
        self.resume_current(cpu, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_vectors() {
        let mut ctx = TrapFrame::new();
        ctx.trapno = IRQ_TIMER;
        assert_eq!(TrapType::from_frame(&ctx, 0x8000), TrapType::Time);
        ctx.trapno = T_SYSCALL;
        assert_eq!(TrapType::from_frame(&ctx, 0x8000), TrapType::SysCall);
        ctx.trapno = 14;
        assert_eq!(TrapType::from_frame(&ctx, 0x8000), TrapType::PageFault(0x8000));
        ctx.trapno = 13;
        assert_eq!(TrapType::from_frame(&ctx, 0x8000), TrapType::Unknown(13));
    }
}
