//! Synchronization primitives shared by all cores.
//!
//! Every lock in the task core is a busy-wait lock. When more than one is
//! needed they are taken in this order:
//!
//! 1. the task table claim lock,
//! 2. a run queue lock,
//! 3. a processor lock,
//! 4. a task control block lock.
//!
//! The claim lock is always released before any run queue lock is taken.

pub use spin::{Mutex as SpinLock, MutexGuard as SpinLockGuard};
