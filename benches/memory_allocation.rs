//! Memory allocation benchmark.
//!
//! Measures the kernel heap's allocation cost at a few representative
//! sizes using real boot-time paging, not a host-target stand-in.

#![no_std]
#![no_main]

extern crate alloc;

use core::arch::global_asm;
use core::panic::PanicInfo;

use alloc::vec::Vec;
use flowos_kernel::arch::x86::multiboot::MultibootInfo;
use flowos_kernel::{arch, exit_qemu, mm, serial_println, BenchmarkRunner, QemuExitCode};

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
    serial_println!("Memory Allocation Benchmark");
    serial_println!("===========================");

    arch::x86::init();
    let multiboot_info = unsafe { MultibootInfo::from_addr(multiboot_addr) };
    mm::init(&multiboot_info);

    let runner = BenchmarkRunner::new();

    let small = runner.run_benchmark("alloc 64 B", || {
        let v: Vec<u8> = Vec::with_capacity(64);
        unsafe { core::ptr::read_volatile(&v as *const _) };
    });
    let medium = runner.run_benchmark("alloc 4 KiB", || {
        let v: Vec<u8> = Vec::with_capacity(4096);
        unsafe { core::ptr::read_volatile(&v as *const _) };
    });
    let large = runner.run_benchmark("alloc 64 KiB", || {
        let v: Vec<u8> = Vec::with_capacity(65536);
        unsafe { core::ptr::read_volatile(&v as *const _) };
    });

    for result in [&small, &medium, &large] {
        serial_println!(
            "{:<12} avg: {} ns  min: {} ns  max: {} ns",
            result.name,
            result.avg_time_ns,
            result.min_time_ns,
            result.max_time_ns
        );
    }

    let dealloc = benchmark_deallocation(&runner);
    serial_println!(
        "{:<12} avg: {} ns  min: {} ns  max: {} ns",
        dealloc.name,
        dealloc.avg_time_ns,
        dealloc.min_time_ns,
        dealloc.max_time_ns
    );

    exit_qemu(QemuExitCode::Success)
}

/// `run_benchmark` times one call to its closure per iteration, so
/// deallocation — freeing something allocated *before* the timed region —
/// needs its own loop: pre-allocate, then time only the `drop`.
fn benchmark_deallocation(runner: &BenchmarkRunner) -> flowos_kernel::BenchmarkResult {
    let mut pending: Vec<Option<Vec<u8>>> = (0..256).map(|_| Some(Vec::with_capacity(64))).collect();
    let mut i = 0usize;
    runner.run_benchmark("dealloc 64 B", || {
        if let Some(v) = pending[i % pending.len()].take() {
            drop(v);
        }
        i += 1;
    })
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    serial_println!("Benchmark panic: {}", info);
    exit_qemu(QemuExitCode::Failed)
}
