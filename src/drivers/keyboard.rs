//! PS/2 keyboard driver.
//!
//! Reads scancodes from I/O port 0x60 (delivered via IRQ1), decodes them
//! with the `pc_keyboard` crate (ScancodeSet1, US 104-key layout) and
//! pushes decoded ASCII bytes into a lock-free single-producer
//! single-consumer ring buffer, exactly as the teacher's x86_64 keyboard
//! driver does. Narrowed to drop GUI-mode single-byte key codes, ANSI
//! escape sequences and modifier-bit tracking: this kernel has no shell or
//! terminal UI (Non-goal), so only plain ASCII keys matter.

use core::sync::atomic::{AtomicUsize, Ordering};
use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, ScancodeSet1};
use spin::Mutex;

use crate::config::KEY_BUFFER_SIZE;

struct KeyBuffer {
    buf: [u8; KEY_BUFFER_SIZE],
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl KeyBuffer {
    const fn new() -> Self {
        Self {
            buf: [0; KEY_BUFFER_SIZE],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Called from the IRQ1 handler; sole producer.
    fn push(&mut self, byte: u8) {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) & (KEY_BUFFER_SIZE - 1);
        let tail = self.tail.load(Ordering::Acquire);
        if next == tail {
            return; // full, drop the key
        }
        self.buf[head] = byte;
        self.head.store(next, Ordering::Release);
    }

    /// Called from syscall context (`read`); sole consumer.
    fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let byte = self.buf[tail];
        self.tail
            .store((tail + 1) & (KEY_BUFFER_SIZE - 1), Ordering::Release);
        Some(byte)
    }
}

// SAFETY: push is only ever called from IRQ1 (single producer) and pop only
// from the read() syscall handler (single consumer); head/tail are atomics.
unsafe impl Send for KeyBuffer {}
unsafe impl Sync for KeyBuffer {}

static mut KEY_BUFFER: KeyBuffer = KeyBuffer::new();
static KEYBOARD: Mutex<Option<Keyboard<layouts::Us104Key, ScancodeSet1>>> = Mutex::new(None);

pub fn init() {
    *KEYBOARD.lock() = Some(Keyboard::new(
        ScancodeSet1::new(),
        layouts::Us104Key,
        HandleControl::MapLettersToUnicode,
    ));
    crate::arch::x86::isr::register_irq_handler(1, irq1_handler);
}

fn irq1_handler(_frame: &mut crate::arch::x86::isr::TrapFrame) {
    let scancode = crate::arch::x86::port::Port8::new(0x60).read();
    handle_scancode(scancode);
}

fn handle_scancode(scancode: u8) {
    let mut guard = KEYBOARD.lock();
    let Some(keyboard) = guard.as_mut() else {
        return;
    };
    let Ok(Some(event)) = keyboard.add_byte(scancode) else {
        return;
    };
    let Some(DecodedKey::Unicode(ch)) = keyboard.process_keyevent(event) else {
        return;
    };
    if ch.is_ascii() {
        // SAFETY: sole producer, called from IRQ1 with interrupts disabled.
        #[allow(static_mut_refs)]
        unsafe {
            KEY_BUFFER.push(ch as u8);
        }
    }
}

/// Reads one decoded key byte, non-blocking.
pub fn read_key() -> Option<u8> {
    // SAFETY: sole consumer.
    #[allow(static_mut_refs)]
    unsafe {
        KEY_BUFFER.pop()
    }
}
