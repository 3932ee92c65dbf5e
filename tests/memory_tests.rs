//! Exercises the physical frame allocator and the per-process virtual
//! address space on top of a real boot-time memory map.

#![no_std]
#![no_main]

extern crate alloc;

use core::arch::global_asm;
use core::panic::PanicInfo;

use flowos_kernel::arch::x86::multiboot::MultibootInfo;
use flowos_kernel::mm::{pmm, vmm, PageFlags};
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
    arch::x86::init();
    let multiboot_info = unsafe { MultibootInfo::from_addr(multiboot_addr) };
    mm::init(&multiboot_info);

    test_frame_alloc_and_free();
    serial_println!("memory_tests: frame alloc/free [ok]");

    test_frame_exhaustion_is_bounded();
    serial_println!("memory_tests: frame accounting [ok]");

    test_address_space_map_and_translate();
    serial_println!("memory_tests: address space map/translate [ok]");

    test_address_space_demand_paging();
    serial_println!("memory_tests: demand paging [ok]");

    test_address_space_clone();
    serial_println!("memory_tests: address space clone [ok]");

    test_heap_vec_growth();
    serial_println!("memory_tests: heap Vec growth [ok]");

    serial_println!("All tests passed!");
    exit_qemu(QemuExitCode::Success)
}

fn test_frame_alloc_and_free() {
    let before = pmm::free_frame_count();
    let frame = pmm::alloc_frame().expect("a fresh boot should have free frames");
    assert_eq!(pmm::free_frame_count(), before - 1);
    pmm::free_frame(frame).expect("freeing a just-allocated frame should succeed");
    assert_eq!(pmm::free_frame_count(), before);
}

fn test_frame_exhaustion_is_bounded() {
    assert!(pmm::total_frame_count() > 0);
    assert!(pmm::free_frame_count() <= pmm::total_frame_count());
}

fn test_address_space_map_and_translate() {
    let mut space = vmm::AddressSpace::new().expect("address space creation should succeed");
    let vaddr = 0x4000_0000u32;
    let paddr = pmm::alloc_frame().expect("frame for mapping");
    space
        .map(vaddr, paddr, PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER)
        .expect("mapping a fresh page should succeed");
    assert_eq!(space.translate(vaddr), Some(paddr));
    assert!(space.map(vaddr, paddr, PageFlags::PRESENT).is_err());
    space.unmap(vaddr).expect("unmapping a mapped page should succeed");
    assert_eq!(space.translate(vaddr), None);
}

fn test_address_space_demand_paging() {
    let mut space = vmm::AddressSpace::new().expect("address space creation should succeed");
    let fault_addr = 0x4000_1000u32;
    assert_eq!(space.translate(fault_addr), None);
    space
        .handle_page_fault(fault_addr)
        .expect("a fault inside the user region should be satisfied");
    assert!(space.translate(fault_addr & !0xFFF).is_some());

    // Outside the user region must be rejected rather than silently mapped.
    assert!(space.handle_page_fault(0).is_err());
}

fn test_address_space_clone() {
    let mut src = vmm::AddressSpace::new().expect("source address space");
    let vaddr = 0x4000_2000u32;
    let paddr = pmm::alloc_frame().expect("frame for source mapping");
    unsafe {
        core::ptr::write_bytes(paddr as *mut u8, 0xAB, flowos_kernel::config::PAGE_SIZE);
    }
    src.map(vaddr, paddr, PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER)
        .unwrap();

    let dst = vmm::AddressSpace::clone_from(&src).expect("clone should succeed");
    let dst_paddr = dst.translate(vaddr).expect("cloned mapping should be present");
    assert_ne!(dst_paddr, paddr, "clone must copy data into a new frame, not share it");
    let cloned_byte = unsafe { *(dst_paddr as *const u8) };
    assert_eq!(cloned_byte, 0xAB);
}

fn test_heap_vec_growth() {
    let mut v: alloc::vec::Vec<u64> = alloc::vec::Vec::new();
    for i in 0..4096u64 {
        v.push(i);
    }
    assert_eq!(v.len(), 4096);
    assert_eq!(v[4095], 4095);
    drop(v);
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}
