//! Preemptive round-robin scheduler: a FIFO ready queue, a timer-tick
//! preemption hook and the switch-task entry point.
//!
//! Narrowed from the teacher's `sched/scheduler.rs` (CFS red-black-tree
//! run queue, per-CPU queues, load balancing, `vruntime`) to a single
//! ready queue serving one CPU in strict arrival order, per
//! `original_source/src/scheduler.c`'s `schedule()`.

pub mod context;

use crate::config::TIME_SLICE_TICKS;
use crate::process::pcb::{Pid, ProcessState};
use crate::process::{self, with_current, with_process};
use alloc::collections::VecDeque;
use spin::Mutex;

static READY_QUEUE: Mutex<VecDeque<Pid>> = Mutex::new(VecDeque::new());
static IDLE_PID: Mutex<Option<Pid>> = Mutex::new(None);

/// Creates the idle task and makes it the scheduler's fallback when the
/// ready queue is empty. Must run once, after `process::` and before the
/// first `tick`/`schedule` call.
pub fn init() {
    let idle = process::create_kernel_process("idle", crate::process::pcb::idle_halt_loop)
        .expect("idle task must be the first process created");
    *IDLE_PID.lock() = Some(idle);
    log::info!("sched: idle task created as pid {idle}");
}

/// Adds a ready process to the back of the run queue.
pub fn enqueue(pid: Pid) {
    READY_QUEUE.lock().push_back(pid);
}

fn pop_next() -> Pid {
    READY_QUEUE
        .lock()
        .pop_front()
        .or_else(|| *IDLE_PID.lock())
        .expect("scheduler has neither a ready task nor an idle task")
}

/// Called from the IRQ0 (PIT) handler on every timer tick. Wakes any
/// process whose sleep has expired, decrements the running process's
/// time slice, and triggers a reschedule once it hits zero.
pub fn tick(current_tick: u64) {
    {
        let mut queue = READY_QUEUE.lock();
        for slot in 0..crate::config::MAX_PROCESSES {
            let pid = slot as Pid;
            let woke = with_process(pid, |pcb| {
                if pcb.state() == ProcessState::Sleeping && current_tick >= pcb.sleep_until_tick {
                    pcb.set_state(ProcessState::Ready);
                    true
                } else {
                    false
                }
            });
            if woke == Some(true) {
                queue.push_back(pid);
            }
        }
    }

    let should_switch = with_current(|pcb| {
        if pcb.time_slice == 0 {
            false
        } else {
            pcb.time_slice -= 1;
            pcb.time_slice == 0
        }
    });

    if should_switch == Some(true) {
        schedule();
    }
}

/// Picks the next ready task and context-switches into it. If the
/// currently running process is still runnable, it's re-enqueued at the
/// back before switching away (round-robin).
pub fn schedule() {
    let current = process::current_pid();

    if let Some(pid) = current {
        with_process(pid, |pcb| {
            pcb.time_slice = TIME_SLICE_TICKS;
            if pcb.state() == ProcessState::Running {
                pcb.set_state(ProcessState::Ready);
                READY_QUEUE.lock().push_back(pid);
            }
        });
    }

    let next = pop_next();
    if Some(next) == current {
        with_process(next, |pcb| pcb.set_state(ProcessState::Running));
        return;
    }

    let prev_esp_ptr: *mut u32 = match current {
        Some(pid) => with_process(pid, |pcb| &mut pcb.kernel_esp as *mut u32)
            .unwrap_or(core::ptr::null_mut()),
        None => core::ptr::null_mut(),
    };
    let next_esp = with_process(next, |pcb| {
        pcb.set_state(ProcessState::Running);
        pcb.kernel_esp
    })
    .expect("scheduled pid must exist in the process table");

    process::set_current_pid(Some(next));
    unsafe {
        context::switch_to(prev_esp_ptr, next_esp);
    }
}

/// Enters the scheduler for the first time and never returns: switches
/// from the bootstrap stack into whatever `schedule` picks first (the
/// idle task, absent any enqueued process).
pub fn run() -> ! {
    schedule();
    unreachable!("schedule() does not return into the bootstrap stack");
}
