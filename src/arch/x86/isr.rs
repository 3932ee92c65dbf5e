//! ISR/IRQ entry stubs and the trap dispatch table.
//!
//! Stubs are emitted with `core::arch::global_asm!` using GNU-as
//! `.macro`/`.altmacro`, following the push-error-code-then-common-frame
//! shape of `original_source/src/idt.c`'s hand-written `isr0..isr31` /
//! `irq0..irq15`, generated inline here instead of in a separate `.asm`
//! file.

use super::pic;
use core::arch::global_asm;

/// Register state saved on entry to every trap/IRQ/syscall handler, in the
/// order the stubs below push it (top of stack first).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TrapFrame {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub int_no: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub user_esp: u32,
    pub user_ss: u32,
}

global_asm!(
    r#"
.altmacro
.macro isr_noerr n
.global isr\n
isr\n:
    push 0
    push \n
    jmp isr_common_stub
.endm
.macro isr_err n
.global isr\n
isr\n:
    push \n
    jmp isr_common_stub
.endm
.macro irq_stub n, vec
.global irq\n
irq\n:
    push 0
    push \vec
    jmp irq_common_stub
.endm

.set i, 0
.rept 32
  .if i == 8 || i == 10 || i == 11 || i == 12 || i == 13 || i == 14 || i == 17
    isr_err %i
  .else
    isr_noerr %i
  .endif
  .set i, i+1
.endr

.set i, 0
.rept 16
  .set vec, i+32
  irq_stub %i, %vec
  .set i, i+1
.endr

.global isr128
isr128:
    push 0
    push 128
    jmp isr_common_stub

isr_common_stub:
irq_common_stub:
    push ds
    push es
    push fs
    push gs
    pushad

    mov ax, 0x10
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax

    push esp
    call trap_dispatch
    add esp, 4

    popad
    pop gs
    pop fs
    pop es
    pop ds
    add esp, 8
    iretd
"#
);

extern "C" {
    fn isr0();
    fn isr1();
    fn isr2();
    fn isr3();
    fn isr4();
    fn isr5();
    fn isr6();
    fn isr7();
    fn isr8();
    fn isr9();
    fn isr10();
    fn isr11();
    fn isr12();
    fn isr13();
    fn isr14();
    fn isr15();
    fn isr16();
    fn isr17();
    fn isr18();
    fn isr19();
    fn isr20();
    fn isr21();
    fn isr22();
    fn isr23();
    fn isr24();
    fn isr25();
    fn isr26();
    fn isr27();
    fn isr28();
    fn isr29();
    fn isr30();
    fn isr31();
    fn irq0();
    fn irq1();
    fn irq2();
    fn irq3();
    fn irq4();
    fn irq5();
    fn irq6();
    fn irq7();
    fn irq8();
    fn irq9();
    fn irq10();
    fn irq11();
    fn irq12();
    fn irq13();
    fn irq14();
    fn irq15();
    fn isr128();
}

pub fn install_stubs() {
    let exceptions: [unsafe extern "C" fn(); 32] = [
        isr0, isr1, isr2, isr3, isr4, isr5, isr6, isr7, isr8, isr9, isr10, isr11, isr12, isr13,
        isr14, isr15, isr16, isr17, isr18, isr19, isr20, isr21, isr22, isr23, isr24, isr25, isr26,
        isr27, isr28, isr29, isr30, isr31,
    ];
    for (vector, handler) in exceptions.iter().enumerate() {
        super::idt::set_gate(vector as u8, *handler as usize as u32, false);
    }

    let irqs: [unsafe extern "C" fn(); 16] = [
        irq0, irq1, irq2, irq3, irq4, irq5, irq6, irq7, irq8, irq9, irq10, irq11, irq12, irq13,
        irq14, irq15,
    ];
    for (line, handler) in irqs.iter().enumerate() {
        super::idt::set_gate(pic::IRQ_BASE + line as u8, *handler as usize as u32, false);
    }

    super::idt::set_gate(
        crate::config::SYSCALL_VECTOR,
        isr128 as usize as u32,
        true,
    );
}

/// Handlers registered for each IRQ line (index 0-15). `drivers::keyboard`
/// and the scheduler's timer tick register into this table at init time.
type IrqHandler = fn(&mut TrapFrame);
static mut IRQ_HANDLERS: [Option<IrqHandler>; 16] = [None; 16];

pub fn register_irq_handler(line: u8, handler: IrqHandler) {
    unsafe {
        let table = &raw mut IRQ_HANDLERS;
        (*table)[line as usize] = Some(handler);
    }
}

type SyscallHandler = fn(&mut TrapFrame);
static mut SYSCALL_HANDLER: Option<SyscallHandler> = None;

pub fn register_syscall_handler(handler: SyscallHandler) {
    unsafe {
        SYSCALL_HANDLER = Some(handler);
    }
}

#[no_mangle]
extern "C" fn trap_dispatch(frame: *mut TrapFrame) {
    let frame = unsafe { &mut *frame };

    if frame.int_no == crate::config::SYSCALL_VECTOR as u32 {
        unsafe {
            if let Some(handler) = SYSCALL_HANDLER {
                handler(frame);
            }
        }
        return;
    }

    if frame.int_no >= 32 && frame.int_no < 48 {
        let line = (frame.int_no - 32) as u8;
        pic::end_of_interrupt(line);
        unsafe {
            let table = &raw const IRQ_HANDLERS;
            if let Some(handler) = (*table)[line as usize] {
                handler(frame);
            }
        }
        return;
    }

    log::error!(
        "unhandled exception {} err={:#x} eip={:#x}",
        frame.int_no,
        frame.err_code,
        frame.eip
    );
    panic!("fatal CPU exception {}", frame.int_no);
}
