//! Process Control Block.
//!
//! Grounded on the teacher's `process/pcb.rs` `Process` struct: an
//! `AtomicU32`-backed state field with `get_state`/`set_state` using
//! acquire/release ordering, and a `#[repr(u8)]` state enum. Narrowed
//! from the teacher's heap-allocated table of processes each owning a
//! `BTreeMap<ThreadId, Thread>`, a `CapabilitySpace` and IPC endpoints to
//! a flat, fixed `MAX_PROCESSES`-slot table of single-threaded processes
//! with no capability or IPC state, per `original_source/src/process.c`'s
//! `struct process`.

use crate::config::KERNEL_STACK_SIZE;
use crate::mm::vmm::AddressSpace;
use core::sync::atomic::{AtomicU32, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Unused = 0,
    Ready = 1,
    Running = 2,
    Blocked = 3,
    Sleeping = 4,
    Zombie = 5,
}

impl ProcessState {
    fn from_u32(v: u32) -> Self {
        match v {
            1 => ProcessState::Ready,
            2 => ProcessState::Running,
            3 => ProcessState::Blocked,
            4 => ProcessState::Sleeping,
            5 => ProcessState::Zombie,
            _ => ProcessState::Unused,
        }
    }
}

pub type Pid = u32;

/// What a process resumes into the first time it's scheduled: a ring-3
/// user entry point, or (for the idle task only) a kernel function that
/// never returns to its caller.
#[derive(Clone, Copy)]
pub enum EntryPoint {
    User { entry: u32, user_stack_top: u32 },
    Kernel(fn() -> !),
}

/// Saved callee-saved registers and return address for a kernel-stack
/// switch. Populated on creation so the first `sched::context::switch_to`
/// "returns" into [`crate::process::process_trampoline`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuContext {
    pub edi: u32,
    pub esi: u32,
    pub ebx: u32,
    pub ebp: u32,
    pub eip: u32,
}

pub struct Pcb {
    pub pid: Pid,
    pub parent: Option<Pid>,
    pub name: [u8; 32],
    state: AtomicU32,
    /// Current kernel stack pointer, written by `sched::context::switch_to`
    /// whenever this process is switched away from.
    pub kernel_esp: u32,
    pub kernel_stack: alloc::boxed::Box<[u8; KERNEL_STACK_SIZE]>,
    pub address_space: Option<AddressSpace>,
    pub entry_point: EntryPoint,
    pub time_slice: u32,
    pub sleep_until_tick: u64,
    pub exit_code: i32,
}

pub(crate) fn idle_halt_loop() -> ! {
    crate::arch::x86::halt()
}

impl Pcb {
    pub fn state(&self) -> ProcessState {
        ProcessState::from_u32(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ProcessState) {
        self.state.store(state as u32, Ordering::Release);
    }

    pub fn new(pid: Pid, name: &str) -> Self {
        let mut name_buf = [0u8; 32];
        let bytes = name.as_bytes();
        let n = bytes.len().min(31);
        name_buf[..n].copy_from_slice(&bytes[..n]);
        Self {
            pid,
            parent: None,
            name: name_buf,
            state: AtomicU32::new(ProcessState::Unused as u32),
            kernel_esp: 0,
            kernel_stack: alloc::boxed::Box::new([0u8; KERNEL_STACK_SIZE]),
            address_space: None,
            entry_point: EntryPoint::Kernel(idle_halt_loop),
            time_slice: crate::config::TIME_SLICE_TICKS,
            sleep_until_tick: 0,
            exit_code: 0,
        }
    }

    pub fn name_str(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }
}
