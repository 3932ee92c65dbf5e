//! Programmable Interval Timer bring-up. Drives the scheduler's
//! preemption tick via IRQ0.

use super::port::Port8;
use crate::config::TIMER_HZ;

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;
const PIT_BASE_FREQUENCY: u32 = 1_193_182;

pub fn init() {
    let divisor = (PIT_BASE_FREQUENCY / TIMER_HZ) as u16;
    let mut command = Port8::new(PIT_COMMAND);
    let mut channel0 = Port8::new(PIT_CHANNEL0);

    // Channel 0, lo/hi byte access, mode 3 (square wave), binary.
    command.write(0x36);
    channel0.write((divisor & 0xFF) as u8);
    channel0.write((divisor >> 8) as u8);
}
