//! Collaborator doubles shared by the integration tests.

#![allow(dead_code)]

use smp_kernel::config::KernelConfig;
use smp_kernel::console::Console;
use smp_kernel::fs::{FileInfo, FileSystem, FsError};
use smp_kernel::mm::{FrameMemory, MemoryManager, VirtAddr};
use smp_kernel::task::{CpuId, TaskId};
use smp_kernel::trap::{TrapFrame, TrapFrameArgs, TrapType};
use smp_kernel::{logging, Kernel};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Console that records output and replays scripted keystrokes.
#[derive(Default)]
pub struct TestConsole {
    pub output: Mutex<Vec<u8>>,
    pub input: Mutex<VecDeque<i32>>,
    pub color: Mutex<Option<(u8, u8)>>,
    pub clears: Mutex<usize>,
}

impl TestConsole {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output.lock().unwrap()).into_owned()
    }
}

impl Console for TestConsole {
    fn getc(&self) -> i32 {
        self.input.lock().unwrap().pop_front().unwrap_or(-1)
    }
    fn putc(&self, c: u8) {
        self.output.lock().unwrap().push(c);
    }
    fn set_text_color(&self, fore: u8, back: u8) {
        *self.color.lock().unwrap() = Some((fore, back));
    }
    fn clear(&self) {
        *self.clears.lock().unwrap() += 1;
    }
}

/// Open flag asking [`MemFs`] to create a missing file.
pub const O_CREATE: usize = 0x1;

struct OpenFile {
    path: String,
    pos: usize,
}

#[derive(Default)]
struct MemFsInner {
    files: BTreeMap<String, Vec<u8>>,
    open: BTreeMap<usize, OpenFile>,
    dirs: BTreeMap<usize, VecDeque<FileInfo>>,
    next_fd: usize,
}

/// Flat in-memory filesystem; every directory lists all files.
#[derive(Default)]
pub struct MemFs {
    inner: Mutex<MemFsInner>,
}

impl MemFs {
    pub fn with_file(path: &str, data: &[u8]) -> Self {
        let fs = Self::default();
        fs.inner
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), data.to_vec());
        fs
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().files.get(path).cloned()
    }
}

impl FileSystem for MemFs {
    fn open(&self, path: &str, flags: usize) -> Result<usize, FsError> {
        let mut inner = self.inner.lock().unwrap();
        if path.is_empty() || path.contains('*') {
            return Err(FsError::InvalidName);
        }
        if !inner.files.contains_key(path) {
            if flags & O_CREATE == 0 {
                return Err(FsError::NoFile);
            }
            inner.files.insert(path.to_string(), Vec::new());
        }
        if inner.open.len() >= 4 {
            return Err(FsError::TooManyOpenFiles);
        }
        inner.next_fd += 1;
        let fd = inner.next_fd;
        inner.open.insert(
            fd,
            OpenFile {
                path: path.to_string(),
                pos: 0,
            },
        );
        Ok(fd)
    }

    fn is_open(&self, fd: usize) -> bool {
        self.inner.lock().unwrap().open.contains_key(&fd)
    }

    fn read(&self, fd: usize, buf: &mut [u8]) -> Result<usize, FsError> {
        let mut inner = self.inner.lock().unwrap();
        let MemFsInner { files, open, .. } = &mut *inner;
        let file = open.get_mut(&fd).ok_or(FsError::InvalidObject)?;
        let data = files.get(&file.path).ok_or(FsError::NoFile)?;
        let start = file.pos.min(data.len());
        let n = (data.len() - start).min(buf.len());
        buf[..n].copy_from_slice(&data[start..start + n]);
        file.pos = start + n;
        Ok(n)
    }

    fn write(&self, fd: usize, src: &[u8]) -> Result<usize, FsError> {
        let mut inner = self.inner.lock().unwrap();
        let MemFsInner { files, open, .. } = &mut *inner;
        let file = open.get_mut(&fd).ok_or(FsError::InvalidObject)?;
        let data = files.get_mut(&file.path).ok_or(FsError::NoFile)?;
        if data.len() < file.pos + src.len() {
            data.resize(file.pos + src.len(), 0);
        }
        data[file.pos..file.pos + src.len()].copy_from_slice(src);
        file.pos += src.len();
        Ok(src.len())
    }

    fn close(&self, fd: usize) -> Result<(), FsError> {
        self.inner
            .lock()
            .unwrap()
            .open
            .remove(&fd)
            .map(|_| ())
            .ok_or(FsError::InvalidObject)
    }

    fn tell(&self, fd: usize) -> Result<(usize, usize), FsError> {
        let inner = self.inner.lock().unwrap();
        let file = inner.open.get(&fd).ok_or(FsError::InvalidObject)?;
        let size = inner.files.get(&file.path).map_or(0, |data| data.len());
        Ok((file.pos, size))
    }

    fn lseek(&self, fd: usize, offset: usize) -> Result<(), FsError> {
        let mut inner = self.inner.lock().unwrap();
        let file = inner.open.get_mut(&fd).ok_or(FsError::InvalidObject)?;
        file.pos = offset;
        Ok(())
    }

    fn unlink(&self, path: &str) -> Result<(), FsError> {
        self.inner
            .lock()
            .unwrap()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or(FsError::NoFile)
    }

    fn opendir(&self, dir: usize, path: &str) -> Result<(), FsError> {
        let mut inner = self.inner.lock().unwrap();
        if path != "/" {
            return Err(FsError::NoPath);
        }
        let entries = inner
            .files
            .iter()
            .map(|(name, data)| FileInfo {
                size: data.len() as u32,
                attrib: 0x20,
                name: name.trim_start_matches('/').to_uppercase(),
                ..FileInfo::default()
            })
            .collect();
        inner.dirs.insert(dir, entries);
        Ok(())
    }

    fn readdir(&self, dir: usize) -> Result<Option<FileInfo>, FsError> {
        let mut inner = self.inner.lock().unwrap();
        let entries = inner.dirs.get_mut(&dir).ok_or(FsError::InvalidObject)?;
        Ok(entries.pop_front())
    }

    fn closedir(&self, dir: usize) -> Result<(), FsError> {
        self.inner
            .lock()
            .unwrap()
            .dirs
            .remove(&dir)
            .map(|_| ())
            .ok_or(FsError::InvalidObject)
    }
}

pub struct Machine {
    pub kernel: Kernel,
    pub mm: Arc<FrameMemory>,
    pub console: Arc<TestConsole>,
    pub fs: Arc<MemFs>,
}

/// Enough frames for a few dozen tasks.
pub const FRAMES: usize = 1024;

pub fn machine(ncpu: usize, nr_tasks: usize, time_quant: i32) -> Machine {
    machine_with(ncpu, nr_tasks, time_quant, FRAMES, MemFs::default())
}

pub fn machine_with(
    ncpu: usize,
    nr_tasks: usize,
    time_quant: i32,
    frames: usize,
    fs: MemFs,
) -> Machine {
    let config = KernelConfig {
        nr_tasks,
        time_quant,
        ..KernelConfig::with_cpus(ncpu)
    };
    // keep log lines out of the console under test
    logging::init(Arc::new(TestConsole::default()), Some("trace"));
    let mm = Arc::new(FrameMemory::new(frames));
    let console = Arc::new(TestConsole::default());
    let fs = Arc::new(fs);
    let kernel = Kernel::new(config, mm.clone(), console.clone(), fs.clone());
    Machine {
        kernel,
        mm,
        console,
        fs,
    }
}

impl Machine {
    /// Boot every core.
    pub fn boot(ncpu: usize, nr_tasks: usize, time_quant: i32) -> Self {
        let m = machine(ncpu, nr_tasks, time_quant);
        m.kernel.boot().unwrap();
        m
    }

    /// Frame of the task running on `cpu`, as the trap entry would capture it.
    pub fn live_frame(&self, cpu: CpuId) -> TrapFrame {
        let id = self.kernel.current(cpu).expect("cpu is idle");
        self.kernel.task_info(id).trap_cx
    }

    /// Issue syscall `nr` from the task running on `cpu` and return the
    /// frame the core resumes.
    pub fn syscall(&self, cpu: CpuId, nr: usize, args: &[usize]) -> TrapFrame {
        let mut ctx = self.live_frame(cpu);
        ctx[TrapFrameArgs::SYSCALL] = nr;
        let slots = [
            TrapFrameArgs::ARG0,
            TrapFrameArgs::ARG1,
            TrapFrameArgs::ARG2,
            TrapFrameArgs::ARG3,
            TrapFrameArgs::ARG4,
        ];
        for (slot, &arg) in slots.iter().zip(args) {
            ctx[*slot] = arg;
        }
        self.kernel.kernel_interrupt(cpu, &mut ctx, TrapType::SysCall);
        ctx
    }

    /// Result of syscall `nr` when the caller keeps the cpu.
    pub fn call(&self, cpu: CpuId, nr: usize, args: &[usize]) -> isize {
        self.syscall(cpu, nr, args)[TrapFrameArgs::RET] as isize
    }

    pub fn tick(&self, cpu: CpuId) -> TrapFrame {
        let mut ctx = match self.kernel.current(cpu) {
            Some(id) => self.kernel.task_info(id).trap_cx,
            None => self.kernel.cpu(cpu).idle_frame(),
        };
        self.kernel.kernel_interrupt(cpu, &mut ctx, TrapType::Time);
        ctx
    }

    /// Copy `data` into the user memory of `task`.
    pub fn poke(&self, task: TaskId, va: usize, data: &[u8]) {
        let pt = self.kernel.task_info(task).address_space.unwrap();
        self.mm.write_user(pt, VirtAddr::new(va), data).unwrap();
    }

    pub fn peek(&self, task: TaskId, va: usize, len: usize) -> Vec<u8> {
        let pt = self.kernel.task_info(task).address_space.unwrap();
        let mut buf = vec![0u8; len];
        self.mm.read_user(pt, VirtAddr::new(va), &mut buf).unwrap();
        buf
    }
}
