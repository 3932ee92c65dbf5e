//! Device drivers.
//!
//! Narrowed from the teacher's full driver roster (PCI/USB/NVMe/GPU/
//! network/virtio/console/mouse/terminal) to the two devices this kernel
//! actually talks to: the PIO ATA disk ([`ata`]) that backs the FAT32
//! reader, and the PS/2 keyboard ([`keyboard`]) that feeds `read()`
//! syscalls on stdin.

pub mod ata;
pub mod keyboard;

pub fn init() {
    ata::init();
    keyboard::init();
}
