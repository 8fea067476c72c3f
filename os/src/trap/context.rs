//! Saved register state of an interrupted context.

use core::ops::{Index, IndexMut};

/// Kernel text segment selector.
pub const GD_KT: usize = 0x08;
/// Kernel data segment selector.
pub const GD_KD: usize = 0x10;
/// User text segment selector.
pub const GD_UT: usize = 0x18;
/// User data segment selector.
pub const GD_UD: usize = 0x20;

/// Interrupt enable flag.
pub const FL_IF: usize = 0x200;

/// General registers in `pushal` order.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PushRegs {
    pub edi: usize,
    pub esi: usize,
    pub ebp: usize,
    pub oesp: usize,
    pub ebx: usize,
    pub edx: usize,
    pub ecx: usize,
    pub eax: usize,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrapFrame {
    pub regs: PushRegs,
    pub es: usize,
    pub ds: usize,
    pub trapno: usize,
    pub err: usize,
    pub eip: usize,
    pub cs: usize,
    pub eflags: usize,
    pub esp: usize,
    pub ss: usize,
}

/// Named slots of a [`TrapFrame`] used by the syscall ABI and task setup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapFrameArgs {
    SEPC,
    SP,
    RET,
    SYSCALL,
    ARG0,
    ARG1,
    ARG2,
    ARG3,
    ARG4,
}

impl TrapFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame entering user mode at `entry` with stack `sp`.
    pub fn app_init_context(entry: usize, sp: usize) -> Self {
        Self {
            cs: GD_UT | 0x03,
            ds: GD_UD | 0x03,
            es: GD_UD | 0x03,
            ss: GD_UD | 0x03,
            eflags: FL_IF,
            eip: entry,
            esp: sp,
            ..Self::default()
        }
    }

    /// Kernel-mode frame the core parks in while nothing is runnable.
    pub fn idle_context(kernel_sp: usize) -> Self {
        Self {
            cs: GD_KT,
            ds: GD_KD,
            es: GD_KD,
            ss: GD_KD,
            eflags: FL_IF,
            esp: kernel_sp,
            ..Self::default()
        }
    }

    /// Syscall arguments in ABI order.
    pub fn args(&self) -> [usize; 5] {
        [
            self[TrapFrameArgs::ARG0],
            self[TrapFrameArgs::ARG1],
            self[TrapFrameArgs::ARG2],
            self[TrapFrameArgs::ARG3],
            self[TrapFrameArgs::ARG4],
        ]
    }
}

impl Index<TrapFrameArgs> for TrapFrame {
    type Output = usize;

    fn index(&self, index: TrapFrameArgs) -> &usize {
        match index {
            TrapFrameArgs::SEPC => &self.eip,
            TrapFrameArgs::SP => &self.esp,
            TrapFrameArgs::RET | TrapFrameArgs::SYSCALL => &self.regs.eax,
            TrapFrameArgs::ARG0 => &self.regs.edx,
            TrapFrameArgs::ARG1 => &self.regs.ecx,
            TrapFrameArgs::ARG2 => &self.regs.ebx,
            TrapFrameArgs::ARG3 => &self.regs.edi,
            TrapFrameArgs::ARG4 => &self.regs.esi,
        }
    }
}

impl IndexMut<TrapFrameArgs> for TrapFrame {
    fn index_mut(&mut self, index: TrapFrameArgs) -> &mut usize {
        match index {
            TrapFrameArgs::SEPC => &mut self.eip,
            TrapFrameArgs::SP => &mut self.esp,
            TrapFrameArgs::RET | TrapFrameArgs::SYSCALL => &mut self.regs.eax,
            TrapFrameArgs::ARG0 => &mut self.regs.edx,
            TrapFrameArgs::ARG1 => &mut self.regs.ecx,
            TrapFrameArgs::ARG2 => &mut self.regs.ebx,
            TrapFrameArgs::ARG3 => &mut self.regs.edi,
            TrapFrameArgs::ARG4 => &mut self.regs.esi,
        }
    }
}

/// Core-local task state segment: where the cpu finds its kernel stack on a
/// trap from user mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskStateSegment {
    pub esp0: usize,
    pub ss0: usize,
    pub fs: usize,
    pub gs: usize,
}

impl TaskStateSegment {
    pub fn for_kernel_stack(top: usize) -> Self {
        Self {
            esp0: top,
            ss0: GD_KD,
            // fs and gs stay in user data segment
            fs: GD_UD | 0x03,
            gs: GD_UD | 0x03,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syscall_registers_follow_the_abi() {
        let mut tf = TrapFrame::new();
        tf.regs.eax = 6;
        tf.regs.edx = 1;
        tf.regs.ecx = 2;
        tf.regs.ebx = 3;
        tf.regs.edi = 4;
        tf.regs.esi = 5;
        assert_eq!(tf[TrapFrameArgs::SYSCALL], 6);
        assert_eq!(tf.args(), [1, 2, 3, 4, 5]);
        tf[TrapFrameArgs::RET] = usize::MAX;
        assert_eq!(tf.regs.eax, usize::MAX);
    }

    #[test]
    fn user_context_uses_user_selectors() {
        let tf = TrapFrame::app_init_context(0x80_0000, 0xeebf_d000);
        assert_eq!(tf.cs & 3, 3);
        assert_eq!(tf.ss, GD_UD | 3);
        assert_eq!(tf[TrapFrameArgs::SEPC], 0x80_0000);
        assert_eq!(tf[TrapFrameArgs::SP], 0xeebf_d000);
        assert_ne!(tf.eflags & FL_IF, 0);
    }
}
