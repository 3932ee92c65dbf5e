//! PIO-mode ATA disk driver.
//!
//! Grounded on `original_source/src/ata.c`: four possible drives (primary/
//! secondary channel x master/slave), IDENTIFY-based enumeration that skips
//! ATAPI/SATA devices (detected by a nonzero LBA-mid/LBA-high byte after
//! IDENTIFY), and 28-bit-LBA PIO sector read/write. Narrowed to read-only
//! use by [`crate::fs::fat32`]; `write_sectors` is kept (grounded on the
//! same file) since nothing in the Non-goals forbids it, but is currently
//! unused outside tests.

use crate::arch::x86::port::{io_wait, Port16, Port8};
use crate::error::AtaError;
use core::fmt;
use spin::Mutex;

const ATA_PRIMARY_IO: u16 = 0x1F0;
const ATA_PRIMARY_CTRL: u16 = 0x3F6;
const ATA_SECONDARY_IO: u16 = 0x170;
const ATA_SECONDARY_CTRL: u16 = 0x376;

const ATA_MASTER: u8 = 0x00;
const ATA_SLAVE: u8 = 0x10;

const REG_DATA: u16 = 0x00;
const REG_SECCOUNT: u16 = 0x02;
const REG_LBA_LO: u16 = 0x03;
const REG_LBA_MID: u16 = 0x04;
const REG_LBA_HI: u16 = 0x05;
const REG_DRIVE: u16 = 0x06;
const REG_STATUS: u16 = 0x07;
const REG_COMMAND: u16 = 0x07;

const CMD_READ_PIO: u8 = 0x20;
const CMD_WRITE_PIO: u8 = 0x30;
const CMD_IDENTIFY: u8 = 0xEC;
const CMD_FLUSH: u8 = 0xE7;

const SR_BSY: u8 = 0x80;
const SR_DRQ: u8 = 0x08;
const SR_ERR: u8 = 0x01;
const SR_DF: u8 = 0x20;

const MAX_DRIVES: usize = 4;
const READY_POLL_LIMIT: u32 = 100_000;

#[derive(Clone, Copy)]
pub struct Drive {
    pub present: bool,
    io_base: u16,
    drive_select: u8,
    pub sectors: u32,
    pub model: [u8; 40],
    pub model_len: u8,
}

impl Drive {
    const fn absent() -> Self {
        Self {
            present: false,
            io_base: 0,
            drive_select: 0,
            sectors: 0,
            model: [0; 40],
            model_len: 0,
        }
    }

    pub fn model_str(&self) -> &str {
        core::str::from_utf8(&self.model[..self.model_len as usize]).unwrap_or("")
    }
}

impl fmt::Debug for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drive")
            .field("present", &self.present)
            .field("sectors", &self.sectors)
            .field("model", &self.model_str())
            .finish()
    }
}

static DRIVES: Mutex<[Drive; MAX_DRIVES]> = Mutex::new([Drive::absent(); MAX_DRIVES]);

fn wait_bsy_clear(io_base: u16) {
    let status = Port8::new(io_base + REG_STATUS);
    while status.read() & SR_BSY != 0 {}
}

fn wait_drq(io_base: u16) {
    let status = Port8::new(io_base + REG_STATUS);
    while status.read() & SR_DRQ == 0 {}
}

fn wait_ready(io_base: u16) -> Result<(), AtaError> {
    let status = Port8::new(io_base + REG_STATUS);
    for _ in 0..READY_POLL_LIMIT {
        let s = status.read();
        if s & SR_ERR != 0 || s & SR_DF != 0 {
            return Err(AtaError::DeviceFault);
        }
        if s & SR_BSY == 0 && s & SR_DRQ != 0 {
            return Ok(());
        }
    }
    Err(AtaError::Timeout)
}

fn identify(io_base: u16, drive_sel: u8) -> Option<Drive> {
    let mut drive_reg = Port8::new(io_base + REG_DRIVE);
    let mut seccount = Port8::new(io_base + REG_SECCOUNT);
    let mut lba_lo = Port8::new(io_base + REG_LBA_LO);
    let mut lba_mid = Port8::new(io_base + REG_LBA_MID);
    let mut lba_hi = Port8::new(io_base + REG_LBA_HI);
    let mut command = Port8::new(io_base + REG_COMMAND);
    let status = Port8::new(io_base + REG_STATUS);

    drive_reg.write(0xA0 | drive_sel);
    io_wait();
    seccount.write(0);
    lba_lo.write(0);
    lba_mid.write(0);
    lba_hi.write(0);

    command.write(CMD_IDENTIFY);
    io_wait();

    if status.read() == 0 {
        return None;
    }

    wait_bsy_clear(io_base);

    // A nonzero LBA-mid/LBA-hi at this point means ATAPI or SATA, which
    // this driver does not support.
    if lba_mid.read() != 0 || lba_hi.read() != 0 {
        return None;
    }

    loop {
        let s = status.read();
        if s & SR_ERR != 0 {
            return None;
        }
        if s & SR_DRQ != 0 {
            break;
        }
    }

    let data = Port16::new(io_base + REG_DATA);
    let mut words = [0u16; 256];
    for w in words.iter_mut() {
        *w = data.read();
    }

    let sectors = (words[61] as u32) << 16 | words[60] as u32;

    let mut model = [0u8; 40];
    for i in 0..20 {
        let w = words[27 + i];
        model[i * 2] = (w >> 8) as u8;
        model[i * 2 + 1] = w as u8;
    }
    let mut model_len = 40;
    while model_len > 0 && model[model_len - 1] == b' ' {
        model_len -= 1;
    }

    Some(Drive {
        present: true,
        io_base,
        drive_select: drive_sel,
        sectors,
        model,
        model_len: model_len as u8,
    })
}

/// Probes all four primary/secondary master/slave channels via IDENTIFY.
pub fn init() {
    let mut drives = DRIVES.lock();
    let channels = [
        (ATA_PRIMARY_IO, ATA_PRIMARY_CTRL, ATA_MASTER),
        (ATA_PRIMARY_IO, ATA_PRIMARY_CTRL, ATA_SLAVE),
        (ATA_SECONDARY_IO, ATA_SECONDARY_CTRL, ATA_MASTER),
        (ATA_SECONDARY_IO, ATA_SECONDARY_CTRL, ATA_SLAVE),
    ];
    let mut found = 0;
    for (slot, (io_base, _ctrl_base, sel)) in channels.iter().enumerate() {
        if let Some(drive) = identify(*io_base, *sel) {
            log::info!(
                "ata: drive {slot} present, {} sectors, model \"{}\"",
                drive.sectors,
                drive.model_str()
            );
            drives[slot] = drive;
            found += 1;
        }
    }
    log::info!("ata: {found} drive(s) found");
}

pub fn drive(index: u8) -> Option<Drive> {
    let drives = DRIVES.lock();
    drives
        .get(index as usize)
        .copied()
        .filter(|d| d.present)
}

/// Reads `count` sectors (512 bytes each) starting at 28-bit LBA `lba` from
/// `drive` into `buffer`, which must be at least `count * 512` bytes.
pub fn read_sectors(drive_index: u8, lba: u32, count: u8, buffer: &mut [u8]) -> Result<(), AtaError> {
    let d = drive(drive_index).ok_or(AtaError::NoDrive)?;
    if buffer.len() < count as usize * 512 {
        return Err(AtaError::BadSectorCount);
    }

    wait_bsy_clear(d.io_base);

    let mut drive_reg = Port8::new(d.io_base + REG_DRIVE);
    let mut seccount = Port8::new(d.io_base + REG_SECCOUNT);
    let mut lba_lo = Port8::new(d.io_base + REG_LBA_LO);
    let mut lba_mid = Port8::new(d.io_base + REG_LBA_MID);
    let mut lba_hi = Port8::new(d.io_base + REG_LBA_HI);
    let mut command = Port8::new(d.io_base + REG_COMMAND);
    let data = Port16::new(d.io_base + REG_DATA);

    drive_reg.write(0xE0 | d.drive_select | ((lba >> 24) & 0x0F) as u8);
    seccount.write(count);
    lba_lo.write(lba as u8);
    lba_mid.write((lba >> 8) as u8);
    lba_hi.write((lba >> 16) as u8);
    command.write(CMD_READ_PIO);

    for s in 0..count as usize {
        wait_ready(d.io_base)?;
        for i in 0..256 {
            let word = data.read();
            let off = s * 512 + i * 2;
            buffer[off] = word as u8;
            buffer[off + 1] = (word >> 8) as u8;
        }
    }

    Ok(())
}

/// Writes `count` sectors from `buffer` to `drive` starting at 28-bit LBA
/// `lba`, followed by a cache flush.
pub fn write_sectors(drive_index: u8, lba: u32, count: u8, buffer: &[u8]) -> Result<(), AtaError> {
    let d = drive(drive_index).ok_or(AtaError::NoDrive)?;
    if buffer.len() < count as usize * 512 {
        return Err(AtaError::BadSectorCount);
    }

    wait_bsy_clear(d.io_base);

    let mut drive_reg = Port8::new(d.io_base + REG_DRIVE);
    let mut seccount = Port8::new(d.io_base + REG_SECCOUNT);
    let mut lba_lo = Port8::new(d.io_base + REG_LBA_LO);
    let mut lba_mid = Port8::new(d.io_base + REG_LBA_MID);
    let mut lba_hi = Port8::new(d.io_base + REG_LBA_HI);
    let mut command = Port8::new(d.io_base + REG_COMMAND);
    let mut data = Port16::new(d.io_base + REG_DATA);

    drive_reg.write(0xE0 | d.drive_select | ((lba >> 24) & 0x0F) as u8);
    seccount.write(count);
    lba_lo.write(lba as u8);
    lba_mid.write((lba >> 8) as u8);
    lba_hi.write((lba >> 16) as u8);
    command.write(CMD_WRITE_PIO);

    for s in 0..count as usize {
        wait_drq(d.io_base);
        for i in 0..256 {
            let off = s * 512 + i * 2;
            let word = buffer[off] as u16 | (buffer[off + 1] as u16) << 8;
            data.write(word);
        }
    }

    command.write(CMD_FLUSH);
    wait_bsy_clear(d.io_base);

    Ok(())
}
