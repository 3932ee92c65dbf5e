//! Kernel boot sequence.
//!
//! Narrowed from the teacher's `define_bootstrap_stages!` macro and
//! 6-stage/12-function cap/ipc/graphics/net/perf/pkg/services/security
//! bring-up (`kernel_init`/`run`/`kernel_init_main`) to the single linear
//! sequence `original_source/src/kernel.c`'s `kmain` follows: trap plane,
//! memory, process table, drivers, filesystem, enable interrupts, hand
//! off to the scheduler. Nothing here runs user code directly — the first
//! process to actually execute is whatever `fs::lookup` finds at the
//! init path, loaded through [`crate::elf`].

use crate::arch::x86::multiboot::MultibootInfo;
use crate::{arch, drivers, fs, mm, sched, syscall, timer};

/// Path of the first user program to exec once the kernel is up.
const INIT_PATH: &str = "INIT";

/// Runs the full boot sequence and falls through into the scheduler.
/// Never returns.
///
/// # Safety
/// `multiboot_addr` must be the physical address the bootloader passed
/// in EBX, still identity-mapped at call time.
pub unsafe fn run(multiboot_addr: u32) -> ! {
    arch::x86::init();
    log::info!("bootstrap: trap plane initialized");

    let multiboot_info = MultibootInfo::from_addr(multiboot_addr);
    mm::init(&multiboot_info);

    sched::init();
    timer::init();
    syscall::init();
    drivers::init();

    match fs::init() {
        Ok(()) => log::info!("bootstrap: FAT32 volume mounted"),
        Err(e) => log::warn!("bootstrap: no FAT32 volume mounted: {e}"),
    }

    arch::x86::enable_interrupts();

    match crate::elf::exec(INIT_PATH) {
        Ok(pid) => {
            sched::enqueue(pid);
            log::info!("bootstrap: {INIT_PATH} started as pid {pid}");
        }
        Err(e) => log::warn!("bootstrap: failed to exec {INIT_PATH}: {e}"),
    }

    sched::run()
}
