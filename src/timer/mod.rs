//! Monotonic tick counter driving the scheduler's preemption hook.
//!
//! Narrowed from the teacher's 256-slot software timer wheel
//! (`TimerWheel`/`TimerId`/one-shot and periodic callbacks) to a single
//! `AtomicU64` tick count: nothing in this kernel schedules one-shot or
//! periodic work off a timer, only the scheduler's per-tick preemption
//! decision, which `sched::tick` already implements. Grounded on
//! `original_source/src/scheduler.c`, whose `timer_interrupt_handler` does
//! exactly this: bump a tick count, call `schedule()`.

use core::sync::atomic::{AtomicU64, Ordering};

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Registers the IRQ0 (PIT) handler. Must run once, after `sched::init`.
pub fn init() {
    crate::arch::x86::isr::register_irq_handler(0, irq0_handler);
}

fn irq0_handler(_frame: &mut crate::arch::x86::isr::TrapFrame) {
    let tick = TICKS.fetch_add(1, Ordering::Relaxed) + 1;
    crate::sched::tick(tick);
}

/// Ticks elapsed since boot at `config::TIMER_HZ`.
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_start_at_zero_and_advance() {
        TICKS.store(0, Ordering::Relaxed);
        assert_eq!(ticks(), 0);
        TICKS.fetch_add(3, Ordering::Relaxed);
        assert_eq!(ticks(), 3);
    }
}
