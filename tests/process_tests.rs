//! Exercises process-table lifecycle: creation, current-process tracking
//! and exit accounting.

#![no_std]
#![no_main]

use core::arch::global_asm;
use core::panic::PanicInfo;

use flowos_kernel::arch::x86::multiboot::MultibootInfo;
use flowos_kernel::process::pcb::ProcessState;
use flowos_kernel::{arch, exit_qemu, mm, process, serial_println, test_panic_handler, QemuExitCode};

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

    test_kernel_process_creation();
    serial_println!("process_tests: kernel process creation [ok]");

    test_current_pid_tracking();
    serial_println!("process_tests: current pid tracking [ok]");

    test_exit_marks_zombie();
    serial_println!("process_tests: exit marks zombie [ok]");

    test_user_process_gets_address_space();
    serial_println!("process_tests: user process address space [ok]");

    serial_println!("All tests passed!");
    exit_qemu(QemuExitCode::Success)
}

fn idle_like() -> ! {
    arch::x86::halt()
}

fn test_kernel_process_creation() {
    let pid = process::create_kernel_process("test-task", idle_like)
        .expect("process table should have room for one task");
    assert_eq!(process::process_state(pid), Some(ProcessState::Ready));
}

fn test_current_pid_tracking() {
    assert_eq!(process::current_pid(), None);
    let pid = process::create_kernel_process("current-probe", idle_like).unwrap();
    process::set_current_pid(Some(pid));
    assert_eq!(process::current_pid(), Some(pid));

    let observed = process::with_current(|pcb| pcb.pid);
    assert_eq!(observed, Some(pid));

    process::set_current_pid(None);
    assert_eq!(process::current_pid(), None);
}

fn test_exit_marks_zombie() {
    let pid = process::create_kernel_process("exit-probe", idle_like).unwrap();
    process::exit_process(pid, 7);
    assert_eq!(process::process_state(pid), Some(ProcessState::Zombie));

    let exit_code = process::with_process(pid, |pcb| pcb.exit_code);
    assert_eq!(exit_code, Some(7));
}

fn test_user_process_gets_address_space() {
    let space = flowos_kernel::mm::vmm::AddressSpace::new().expect("address space creation");
    let pid = process::create_process("user-probe", space, 0x4000_0000, 0xC000_0000)
        .expect("process table should have room");
    let has_space = process::with_process(pid, |pcb| pcb.address_space.is_some());
    assert_eq!(has_space, Some(true));
    assert_eq!(process::process_state(pid), Some(ProcessState::Ready));
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}
