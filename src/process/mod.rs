//! Process table and lifecycle: creation, the trap-return trampoline
//! that lands a process on first dispatch, exit and the PID allocator.
//!
//! Narrowed from the teacher's `process/mod.rs` (`MAX_PROCESSES = 4096`,
//! `NEXT_PID`/`NEXT_TID` atomics, per-thread `create_thread`/
//! `block_thread`/`wake_thread` wired to `sched::SCHEDULER`) to a single
//! PCB per process (`MAX_PROCESSES = 256`, no threads, no capability or
//! IPC integration).

pub mod pcb;

use crate::arch::x86::{gdt, usermode};
use crate::config::MAX_PROCESSES;
use crate::mm::vmm::AddressSpace;
use pcb::{EntryPoint, Pcb, Pid, ProcessState};
use spin::Mutex;

static PROCESS_TABLE: Mutex<[Option<Pcb>; MAX_PROCESSES]> =
    Mutex::new([const { None }; MAX_PROCESSES]);

static NEXT_PID: Mutex<Pid> = Mutex::new(1);

fn allocate_pid() -> Option<Pid> {
    let mut next = NEXT_PID.lock();
    let table = PROCESS_TABLE.lock();
    for _ in 0..MAX_PROCESSES {
        let candidate = *next;
        *next = next.wrapping_add(1).max(1);
        let slot = (candidate as usize) % MAX_PROCESSES;
        let reusable = match &table[slot] {
            None => true,
            Some(pcb) => pcb.state() == ProcessState::Zombie,
        };
        if reusable {
            return Some(candidate);
        }
    }
    None
}

fn insert(mut pcb: Pcb, entry_point: EntryPoint) -> Pid {
    pcb.entry_point = entry_point;
    prepare_initial_context(&mut pcb);
    pcb.set_state(ProcessState::Ready);
    let pid = pcb.pid;
    let slot = (pid as usize) % MAX_PROCESSES;
    PROCESS_TABLE.lock()[slot] = Some(pcb);
    pid
}

/// Creates a new ring-3 process with its own address space. Does not
/// start it running — the caller enqueues it with `sched::enqueue`.
pub fn create_process(
    name: &str,
    address_space: AddressSpace,
    entry: u32,
    user_stack_top: u32,
) -> Result<Pid, &'static str> {
    let pid = allocate_pid().ok_or("process table full")?;
    let mut pcb = Pcb::new(pid, name);
    pcb.address_space = Some(address_space);
    Ok(insert(
        pcb,
        EntryPoint::User {
            entry,
            user_stack_top,
        },
    ))
}

/// Creates a kernel-only process (used once, for the idle task) that
/// never enters ring 3.
pub fn create_kernel_process(name: &str, entry: fn() -> !) -> Result<Pid, &'static str> {
    let pid = allocate_pid().ok_or("process table full")?;
    let pcb = Pcb::new(pid, name);
    Ok(insert(pcb, EntryPoint::Kernel(entry)))
}

/// Lays out the initial kernel stack so that the first
/// `sched::context::switch_to` into this process "returns" into
/// [`process_trampoline`].
fn prepare_initial_context(pcb: &mut Pcb) {
    let stack_top = pcb.kernel_stack.as_ptr() as usize + pcb.kernel_stack.len();
    let mut sp = stack_top & !0xF;

    // switch_to's epilogue pops edi, esi, ebx, ebp then `ret`s into eip.
    sp -= 4;
    unsafe { *(sp as *mut u32) = process_trampoline as usize as u32 }; // eip
    sp -= 4;
    unsafe { *(sp as *mut u32) = 0 }; // ebp
    sp -= 4;
    unsafe { *(sp as *mut u32) = 0 }; // ebx
    sp -= 4;
    unsafe { *(sp as *mut u32) = 0 }; // esi
    sp -= 4;
    unsafe { *(sp as *mut u32) = 0 }; // edi

    pcb.kernel_esp = sp as u32;
}

/// Entry point every freshly created process's kernel stack resumes at
/// the first time the scheduler switches to it: loads the process's
/// page directory (if any) and either drops to ring 3 or runs a kernel
/// function directly. Never returns.
#[no_mangle]
extern "C" fn process_trampoline() -> ! {
    let entry_point = with_current(|pcb| {
        if let Some(space) = &pcb.address_space {
            unsafe {
                core::arch::asm!("mov cr3, {0}", in(reg) space.phys_addr(), options(nostack));
            }
        }
        pcb.entry_point
    })
    .expect("process_trampoline running without a current process");

    match entry_point {
        EntryPoint::User {
            entry,
            user_stack_top,
        } => unsafe { usermode::enter_usermode(entry, user_stack_top) },
        EntryPoint::Kernel(f) => f(),
    }
}

static CURRENT_PID: Mutex<Option<Pid>> = Mutex::new(None);

pub fn current_pid() -> Option<Pid> {
    *CURRENT_PID.lock()
}

pub fn set_current_pid(pid: Option<Pid>) {
    *CURRENT_PID.lock() = pid;
    if let Some(pid) = pid {
        with_process(pid, |pcb| {
            gdt::set_kernel_stack(pcb.kernel_stack.as_ptr() as u32 + pcb.kernel_stack.len() as u32);
        });
    }
}

/// Runs `f` with exclusive access to the given process's PCB, if it's
/// still live.
pub fn with_process<R>(pid: Pid, f: impl FnOnce(&mut Pcb) -> R) -> Option<R> {
    let slot = (pid as usize) % MAX_PROCESSES;
    let mut table = PROCESS_TABLE.lock();
    match &mut table[slot] {
        Some(pcb) if pcb.pid == pid => Some(f(pcb)),
        _ => None,
    }
}

pub fn with_current<R>(f: impl FnOnce(&mut Pcb) -> R) -> Option<R> {
    let pid = current_pid()?;
    with_process(pid, f)
}

/// Marks a process as exited with the given status. The PCB slot is
/// reclaimed lazily by `allocate_pid` reusing it; reclaiming the
/// process's own page-table frames is left as future work, per the
/// "known gap" design note on frame reclamation on exit.
pub fn exit_process(pid: Pid, exit_code: i32) {
    with_process(pid, |pcb| {
        pcb.exit_code = exit_code;
        pcb.set_state(ProcessState::Zombie);
    });
}

pub fn process_state(pid: Pid) -> Option<ProcessState> {
    with_process(pid, |pcb| pcb.state())
}

/// Puts the calling process to sleep for at least `ms` milliseconds:
/// computes the wake tick from the timer frequency, marks the PCB
/// `Sleeping`, and yields. `sched::tick` wakes it once the tick counter
/// reaches `sleep_until_tick`.
pub fn sleep(ms: u64) {
    let freq = crate::config::TIMER_HZ as u64;
    let ticks = (ms * freq).div_ceil(1000).max(1);
    let wake = crate::timer::ticks() + ticks;
    with_current(|pcb| {
        pcb.sleep_until_tick = wake;
        pcb.set_state(ProcessState::Sleeping);
    });
    crate::sched::schedule();
}
