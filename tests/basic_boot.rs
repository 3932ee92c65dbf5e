//! Smoke test: the trap plane and memory subsystem come up and the
//! kernel heap is usable.

#![no_std]
#![no_main]

extern crate alloc;

use core::arch::global_asm;
use core::panic::PanicInfo;

use flowos_kernel::arch::x86::multiboot::MultibootInfo;
use flowos_kernel::{arch, exit_qemu, mm, serial_println, test_panic_handler, QemuExitCode};

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
    serial_println!("basic_boot: starting...");

    arch::x86::init();
    serial_println!("basic_boot: trap plane initialized [ok]");

    let multiboot_info = unsafe { MultibootInfo::from_addr(multiboot_addr) };
    mm::init(&multiboot_info);
    serial_println!("basic_boot: memory subsystem initialized [ok]");

    test_heap_alloc();
    serial_println!("basic_boot: heap allocation [ok]");

    serial_println!("All tests passed!");
    exit_qemu(QemuExitCode::Success)
}

fn test_heap_alloc() {
    let v: alloc::vec::Vec<u32> = (0..64).collect();
    assert_eq!(v.len(), 64);
    assert_eq!(v.iter().sum::<u32>(), (0..64).sum());
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}
