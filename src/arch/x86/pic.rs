//! 8259 PIC remap, masking and end-of-interrupt handling.
//!
//! Hand-rolled rather than the teacher's `pic8259` crate dependency (also
//! x86_64-only in practice); the remap sequence below is the textbook
//! master/slave cascade from `original_source/src/idt.c`.

use super::port::{io_wait, Port8};

const PIC1_CMD: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_CMD: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x10;
const ICW1_ICW4: u8 = 0x01;
const ICW4_8086: u8 = 0x01;

const PIC_EOI: u8 = 0x20;

/// Interrupt vector the master PIC's IRQ0 is remapped to.
pub const IRQ_BASE: u8 = 32;

pub struct Pic {
    master_cmd: Port8,
    master_data: Port8,
    slave_cmd: Port8,
    slave_data: Port8,
}

impl Pic {
    const fn new() -> Self {
        Self {
            master_cmd: Port8::new(PIC1_CMD),
            master_data: Port8::new(PIC1_DATA),
            slave_cmd: Port8::new(PIC2_CMD),
            slave_data: Port8::new(PIC2_DATA),
        }
    }

    /// Remap IRQ0-15 to vectors 32-47 so they don't collide with the CPU's
    /// reserved exception vectors 0-31, then mask everything but the timer
    /// and keyboard lines.
    fn remap(&mut self) {
        let saved_master = self.master_data.read();
        let saved_slave = self.slave_data.read();

        self.master_cmd.write(ICW1_INIT | ICW1_ICW4);
        io_wait();
        self.slave_cmd.write(ICW1_INIT | ICW1_ICW4);
        io_wait();

        self.master_data.write(IRQ_BASE);
        io_wait();
        self.slave_data.write(IRQ_BASE + 8);
        io_wait();

        self.master_data.write(4); // slave attached to master's IRQ2
        io_wait();
        self.slave_data.write(2); // slave's cascade identity
        io_wait();

        self.master_data.write(ICW4_8086);
        io_wait();
        self.slave_data.write(ICW4_8086);
        io_wait();

        self.master_data.write(saved_master);
        self.slave_data.write(saved_slave);
    }

    fn set_mask(&mut self, irq: u8, masked: bool) {
        let (port, bit) = if irq < 8 {
            (&mut self.master_data, irq)
        } else {
            (&mut self.slave_data, irq - 8)
        };
        let mut value = port.read();
        if masked {
            value |= 1 << bit;
        } else {
            value &= !(1 << bit);
        }
        port.write(value);
    }

    fn end_of_interrupt(&mut self, irq: u8) {
        if irq >= 8 {
            self.slave_cmd.write(PIC_EOI);
        }
        self.master_cmd.write(PIC_EOI);
    }
}

static PIC: spin::Mutex<Pic> = spin::Mutex::new(Pic::new());

pub fn init() {
    let mut pic = PIC.lock();
    pic.remap();
    // Mask every line, then unmask just the timer (IRQ0) and keyboard
    // (IRQ1); other drivers unmask their own line when they initialize.
    for irq in 0..16 {
        pic.set_mask(irq, true);
    }
    pic.set_mask(0, false);
    pic.set_mask(1, false);
}

pub fn unmask(irq: u8) {
    PIC.lock().set_mask(irq, false);
}

pub fn mask(irq: u8) {
    PIC.lock().set_mask(irq, true);
}

/// Sends the end-of-interrupt for the given IRQ line. Vectors >= 40 (IRQ8
/// and above) live on the slave PIC and need an EOI sent to *both*
/// controllers, in slave-then-master order — a single EOI to the master
/// alone leaves the slave's in-service bit set and starves every
/// subsequent slave-line interrupt.
pub fn end_of_interrupt(irq: u8) {
    PIC.lock().end_of_interrupt(irq);
}
