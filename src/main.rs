//! Kernel entry point.
//!
//! Narrowed from the teacher's multi-arch `_start` (x86_64/aarch64/riscv64
//! `#[cfg]` branches, `cap::init`/`ipc::init` calls,
//! `#![feature(abi_x86_interrupt)]`) to the single i686 Multiboot1 entry
//! point this kernel boots from. A tiny hand-written stub (in the style of
//! [`flowos_kernel::arch::x86::isr`]'s ISR stubs) stashes the EBX register
//! — the physical address of the `multiboot_info_t` GRUB leaves there per
//! the Multiboot1 spec — before the Rust prologue can clobber it, then
//! calls into [`flowos_kernel::bootstrap::run`].

#![no_std]
#![no_main]
#![cfg_attr(test, allow(unused))]

use core::arch::global_asm;
use core::panic::PanicInfo;

use flowos_kernel::{arch, bootstrap, println, serial_println};

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
    const GIT_HASH: &str = env!("GIT_HASH");
    let short_hash = &GIT_HASH[..GIT_HASH.len().min(7)];
    println!(
        "flowos-kernel v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        short_hash,
        env!("BUILD_TIMESTAMP")
    );
    println!("booting...");

    unsafe {
        bootstrap::run(multiboot_addr);
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    serial_println!("[KERNEL PANIC] {}", info);
    arch::x86::disable_interrupts();
    arch::x86::halt();
}
