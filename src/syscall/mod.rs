//! System call ABI: dispatch off `int 0x80` with the call number in `eax`
//! and up to three arguments in `ebx`/`ecx`/`edx`, result written back into
//! `eax`.
//!
//! Narrowed from the teacher's IPC/process/thread/memory/capability
//! `Syscall` enum (30+ numbers, `SmallMessage` fast path, `From<IpcError>`
//! conversions) to the four calls `original_source/src/syscall.c` actually
//! implements: `exit`, `read`, `write`, `exec`. No IPC, no threads, no
//! capabilities.

use crate::arch::x86::isr::TrapFrame;
use crate::drivers::keyboard;
use crate::{serial_print, serial_println};

const SYS_EXIT: u32 = 1;
const SYS_READ: u32 = 3;
const SYS_WRITE: u32 = 4;
const SYS_EXEC: u32 = 11;

const BACKSPACE: u8 = 0x08;
const NEWLINE: u8 = b'\n';

/// Registers the syscall handler. Must run once, after `process::init`.
pub fn init() {
    crate::arch::x86::isr::register_syscall_handler(dispatch);
}

fn dispatch(frame: &mut TrapFrame) {
    let result = match frame.eax {
        SYS_EXIT => sys_exit(frame.ebx as i32),
        SYS_READ => sys_read(frame.ebx as *mut u8, frame.ecx),
        SYS_WRITE => sys_write(frame.ebx as *const u8),
        SYS_EXEC => sys_exec(frame.ebx as *const u8, frame.ecx),
        other => {
            log::warn!("syscall: unknown call number {other}");
            -1
        }
    };
    frame.eax = result as u32;
}

/// Terminates the calling process with `status` and forces a reschedule;
/// never returns to the trap frame that issued it.
fn sys_exit(status: i32) -> i32 {
    if let Some(pid) = crate::process::current_pid() {
        crate::process::exit_process(pid, status);
    }
    crate::sched::schedule();
    0
}

/// Reads one line (up to `max - 1` bytes, NUL-terminated) from the
/// keyboard into the user buffer at `buf`. `\n` ends the line without
/// being stored; `\b` erases the previously stored byte. Every consumed
/// key is echoed back to the log sink as it's typed.
fn sys_read(buf: *mut u8, max: u32) -> i32 {
    if buf.is_null() || max == 0 {
        return -1;
    }
    let capacity = (max - 1) as usize;
    let mut len = 0usize;
    loop {
        let Some(byte) = keyboard::read_key() else {
            continue;
        };
        match byte {
            NEWLINE => {
                serial_println!();
                break;
            }
            BACKSPACE => {
                if len > 0 {
                    len -= 1;
                    serial_print!("\u{8} \u{8}");
                }
            }
            byte => {
                if len < capacity {
                    unsafe { *buf.add(len) = byte };
                    len += 1;
                    serial_print!("{}", byte as char);
                }
            }
        }
    }
    unsafe { *buf.add(len) = 0 };
    len as i32
}

/// Writes the NUL-terminated C string at `cstr` to the log sink.
fn sys_write(cstr: *const u8) -> i32 {
    if cstr.is_null() {
        return -1;
    }
    let mut len = 0usize;
    while unsafe { *cstr.add(len) } != 0 {
        len += 1;
    }
    let slice = unsafe { core::slice::from_raw_parts(cstr, len) };
    match core::str::from_utf8(slice) {
        Ok(s) => log::info!("{s}"),
        Err(_) => log::info!("{:?}", slice),
    }
    0
}

/// Loads and runs the ELF32 executable at the NUL-terminated path `path`
/// (length `path_len` bytes, not counting the terminator) as a new process.
fn sys_exec(path: *const u8, path_len: u32) -> i32 {
    if path.is_null() {
        return -1;
    }
    let slice = unsafe { core::slice::from_raw_parts(path, path_len as usize) };
    let path = match core::str::from_utf8(slice) {
        Ok(s) => s,
        Err(_) => return -1,
    };

    match crate::elf::exec(path) {
        Ok(pid) => {
            crate::sched::enqueue(pid);
            pid as i32
        }
        Err(e) => {
            log::warn!("exec {path}: {e}");
            -1
        }
    }
}
