//! Context switch benchmark.
//!
//! Measures `sched::context::switch_to`'s round-trip cost by running two
//! cooperating kernel tasks that do nothing but call `sched::schedule()`
//! at each other, and separately the raw register-save/restore cost in
//! isolation (no stack swap, no scheduling decision).

#![no_std]
#![no_main]

use core::arch::{asm, global_asm};
use core::panic::PanicInfo;

use flowos_kernel::arch::x86::multiboot::MultibootInfo;
use flowos_kernel::{
    arch, exit_qemu, mm, process, sched, serial_println, BenchmarkRunner, QemuExitCode,
};

global_asm!(
    r#"
.global _start
_start:
    push ebx
    call kernel_main
"#
);

#[no_mangle]
extern "C" fn kernel_main(multiboot_addr: u32) -> ! {
    serial_println!("Context Switch Benchmark");
    serial_println!("========================");

    arch::x86::init();
    let multiboot_info = unsafe { MultibootInfo::from_addr(multiboot_addr) };
    mm::init(&multiboot_info);
    sched::init();

    let runner = BenchmarkRunner::new();
    let register_result =
        runner.run_benchmark("register save/restore", benchmark_register_save_restore);
    serial_println!(
        "register save/restore  avg: {} ns  min: {} ns  max: {} ns",
        register_result.avg_time_ns,
        register_result.min_time_ns,
        register_result.max_time_ns
    );

    let main_task = process::create_kernel_process("bench-main", bench_main_task)
        .expect("process table should have room for the benchmark main task");
    let peer = process::create_kernel_process("bench-peer", peer_loop)
        .expect("process table should have room for the benchmark peer");
    sched::enqueue(main_task);
    sched::enqueue(peer);

    sched::run()
}

/// Saves and restores the same callee-saved registers
/// `sched::context::switch_to` does, without actually switching stacks —
/// isolates the instruction cost from the scheduling decision around it.
fn benchmark_register_save_restore() {
    unsafe {
        asm!(
            "push ebp",
            "push ebx",
            "push esi",
            "push edi",
            "pop edi",
            "pop esi",
            "pop ebx",
            "pop ebp",
            options(nostack),
        );
    }
}

/// The benchmarked task: yields to its peer `ITERATIONS` times, timing
/// each `sched::schedule()` round trip, then reports and exits.
fn bench_main_task() -> ! {
    const ITERATIONS: u64 = 1000;
    serial_println!("running {} scheduled round-trips...", ITERATIONS);

    let runner = BenchmarkRunner::new();
    let result = runner.run_benchmark("scheduled round-trip", sched::schedule);
    serial_println!(
        "scheduled round-trip   avg: {} ns  min: {} ns  max: {} ns",
        result.avg_time_ns,
        result.min_time_ns,
        result.max_time_ns
    );
    exit_qemu(QemuExitCode::Success)
}

/// Does nothing but hand control back, so `bench-main`'s `schedule()`
/// calls always have somewhere to switch to.
fn peer_loop() -> ! {
    loop {
        sched::schedule();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    serial_println!("Benchmark panic: {}", info);
    exit_qemu(QemuExitCode::Failed)
}
