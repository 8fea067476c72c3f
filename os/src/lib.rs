//! Task core of a small multiprocessor teaching kernel.
//!
//! A fixed task table, one run queue per core, round-robin scheduling with
//! timer preemption, and the system call dispatcher on top. Memory, console
//! and filesystem are collaborators handed to [`Kernel::new`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
extern crate bitflags;

pub mod config;
pub mod console;
pub mod fs;
pub mod kernel;
pub mod logging;
pub mod mm;
pub mod sync;
pub mod syscall;
pub mod task;
pub mod timer;
pub mod trap;

pub use kernel::Kernel;
