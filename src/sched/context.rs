//! Kernel-stack context switch for the round-robin scheduler.
//!
//! Grounded on the teacher's `arch/x86_64/usermode.rs` `#[unsafe(naked)]`
//! + `core::arch::naked_asm!` entry trampolines: callee-saved registers
//! pushed by hand, the new stack pointer swapped in, and control handed
//! off with `ret` rather than a normal call/return. Narrowed to the five
//! values this kernel's stack-switch model actually carries (`edi`,
//! `esi`, `ebx`, `ebp`, a return address) instead of the teacher's full
//! register snapshot plus CR3 — CR3 here is loaded separately, once per
//! process, by `process::process_trampoline` and `AddressSpace::activate`.

use core::arch::naked_asm;

/// Saves the current task's callee-saved registers onto its own kernel
/// stack, stores the resulting stack pointer at `*prev_esp`, then loads
/// `next_esp` and resumes whatever task last switched away from it.
///
/// `prev_esp` may be null (used once, for the bootstrap stack that
/// becomes the idle task's first "previous" context and is never
/// switched back into by address).
///
/// # Safety
/// `next_esp` must point at a stack previously saved by this same
/// function, or fabricated by `process::prepare_initial_context` with
/// the same register layout. Must be called with interrupts disabled
/// and with `prev_esp`/`next_esp` referring to live, non-aliasing
/// kernel stacks.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_to(_prev_esp: *mut u32, _next_esp: u32) {
    naked_asm!(
        "push ebp",
        "push ebx",
        "push esi",
        "push edi",
        "mov eax, [esp + 20]", // prev_esp argument (above the 4 pushes + return address)
        "test eax, eax",
        "jz 2f",
        "mov [eax], esp",
        "2:",
        "mov eax, [esp + 24]", // next_esp argument
        "mov esp, eax",
        "pop edi",
        "pop esi",
        "pop ebx",
        "pop ebp",
        "ret",
    );
}
