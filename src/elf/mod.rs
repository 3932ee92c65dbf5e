//! ELF32/i386 executable loader.
//!
//! Grounded on `original_source/src/elf.c`/`elf.h`: validates the 52-byte
//! ELF32 header (magic, `EM_386`, `ET_EXEC`), walks the program header
//! table, maps each `PT_LOAD` segment page-aligned with the writability
//! fix described below, copies in `filesz` bytes and zeroes the BSS tail,
//! then maps a fixed 8 KiB user stack and hands off through
//! [`crate::arch::x86::usermode::enter_usermode`].
//!
//! Narrowed from the teacher's ELF64 loader (`elf/mod.rs`/`elf/types.rs`):
//! no section headers, dynamic linking, relocations or symbol resolution —
//! this kernel only ever runs statically linked `ET_EXEC` binaries.
//!
//! **Writability fix.** The original C loader maps every `PT_LOAD` page
//! with exactly the segment's final flags before copying file data in,
//! which silently no-ops the copy for read-only segments once write-
//! protection is enforced. Here every page is mapped
//! `{present, user, writable}` for the copy-in, and only afterward
//! `remap_flags` clears `WRITABLE` if the segment's `PF_W` bit is absent.

use crate::config::{PAGE_SIZE, USER_STACK_SIZE, USER_STACK_TOP};
use crate::error::ElfError;
use crate::mm::vmm::AddressSpace;
use crate::mm::{pmm, PageFlags};
use alloc::vec;
use alloc::vec::Vec;

const ELF_MAGIC: u32 = 0x464C_457F; // "\x7FELF" little-endian
const EM_386: u16 = 3;
const ET_EXEC: u16 = 2;
const PT_LOAD: u32 = 1;
const PF_W: u32 = 0x2;

const HEADER_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;

#[derive(Debug, Clone, Copy)]
struct Header {
    entry: u32,
    phoff: u32,
    phnum: u16,
}

fn parse_header(data: &[u8]) -> Result<Header, ElfError> {
    if data.len() < HEADER_SIZE {
        return Err(ElfError::TruncatedHeader);
    }
    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if magic != ELF_MAGIC {
        return Err(ElfError::BadMagic);
    }
    let elf_class = data[4];
    if elf_class != 1 {
        return Err(ElfError::UnsupportedClass);
    }
    let elf_type = u16::from_le_bytes([data[16], data[17]]);
    let machine = u16::from_le_bytes([data[18], data[19]]);
    if machine != EM_386 {
        return Err(ElfError::UnsupportedMachine);
    }
    if elf_type != ET_EXEC {
        return Err(ElfError::NotExecutable);
    }

    Ok(Header {
        entry: u32::from_le_bytes([data[24], data[25], data[26], data[27]]),
        phoff: u32::from_le_bytes([data[28], data[29], data[30], data[31]]),
        phnum: u16::from_le_bytes([data[44], data[45]]),
    })
}

struct ProgramHeader {
    p_type: u32,
    offset: u32,
    vaddr: u32,
    filesz: u32,
    memsz: u32,
    flags: u32,
}

fn parse_program_headers(data: &[u8], header: &Header) -> Result<Vec<ProgramHeader>, ElfError> {
    let mut headers = Vec::with_capacity(header.phnum as usize);
    for i in 0..header.phnum as usize {
        let off = header.phoff as usize + i * PHDR_SIZE;
        if off + PHDR_SIZE > data.len() {
            return Err(ElfError::TruncatedProgramHeader);
        }
        let word = |o: usize| u32::from_le_bytes([data[off + o], data[off + o + 1], data[off + o + 2], data[off + o + 3]]);
        headers.push(ProgramHeader {
            p_type: word(0),
            offset: word(4),
            vaddr: word(8),
            filesz: word(16),
            memsz: word(20),
            flags: word(24),
        });
    }
    Ok(headers)
}

fn load_segment(space: &mut AddressSpace, data: &[u8], ph: &ProgramHeader) -> Result<(), ElfError> {
    if ph.offset as usize + ph.filesz as usize > data.len() {
        return Err(ElfError::SegmentOutOfRange);
    }

    let page_start = ph.vaddr & !0xFFF;
    let page_end = (ph.vaddr + ph.memsz + 0xFFF) & !0xFFF;
    let num_pages = (page_end - page_start) / PAGE_SIZE as u32;

    let mut frames = Vec::with_capacity(num_pages as usize);
    for i in 0..num_pages {
        let page_vaddr = page_start + i * PAGE_SIZE as u32;
        let frame = pmm::alloc_frame().map_err(|_| ElfError::MapFailed)?;
        unsafe {
            core::ptr::write_bytes(frame as *mut u8, 0, PAGE_SIZE);
        }
        // Always mapped writable for the copy-in below; narrowed to
        // read-only afterward if the segment itself isn't PF_W.
        space
            .map(
                page_vaddr,
                frame,
                PageFlags::PRESENT | PageFlags::USER | PageFlags::WRITABLE,
            )
            .map_err(|_| ElfError::MapFailed)?;
        frames.push(frame);
    }

    // `space` isn't active yet (nothing switches CR3 until the process is
    // scheduled), so writes through `ph.vaddr` would land in whatever
    // address space the caller of `exec` happens to be running in. Copy
    // through the just-allocated physical frames instead, the same idiom
    // `AddressSpace::clone_from` uses elsewhere in this crate. BSS is
    // already zero: every frame above was zero-filled before mapping.
    if ph.filesz > 0 {
        let mut remaining = ph.filesz as usize;
        let mut src_off = ph.offset as usize;
        let mut vaddr = ph.vaddr;
        while remaining > 0 {
            let page_index = ((vaddr & !0xFFF) - page_start) / PAGE_SIZE as u32;
            let page_offset = (vaddr & 0xFFF) as usize;
            let chunk = remaining.min(PAGE_SIZE - page_offset);
            let dst = (frames[page_index as usize] as usize + page_offset) as *mut u8;
            unsafe {
                core::ptr::copy_nonoverlapping(data[src_off..].as_ptr(), dst, chunk);
            }
            remaining -= chunk;
            src_off += chunk;
            vaddr += chunk as u32;
        }
    }

    if ph.flags & PF_W == 0 {
        for i in 0..num_pages {
            let page_vaddr = page_start + i * PAGE_SIZE as u32;
            space
                .remap_flags(page_vaddr, PageFlags::PRESENT | PageFlags::USER)
                .map_err(|_| ElfError::MapFailed)?;
        }
    }

    Ok(())
}

/// A validated, not-yet-launched user program: the address space it was
/// loaded into, its entry point and its user stack top.
pub struct LoadedElf {
    pub address_space: AddressSpace,
    pub entry: u32,
    pub user_stack_top: u32,
}

/// Loads the ELF32 executable in `data` into a fresh address space.
pub fn load(data: &[u8]) -> Result<LoadedElf, ElfError> {
    let header = parse_header(data)?;
    let program_headers = parse_program_headers(data, &header)?;

    let mut space = AddressSpace::new().map_err(|_| ElfError::MapFailed)?;

    for ph in &program_headers {
        if ph.p_type == PT_LOAD {
            load_segment(&mut space, data, ph)?;
        }
    }

    let stack_pages = USER_STACK_SIZE as u32 / PAGE_SIZE as u32;
    for i in 0..stack_pages {
        let frame = pmm::alloc_frame().map_err(|_| ElfError::MapFailed)?;
        unsafe {
            core::ptr::write_bytes(frame as *mut u8, 0, PAGE_SIZE);
        }
        let page_vaddr = USER_STACK_TOP - (i + 1) * PAGE_SIZE as u32;
        space
            .map(
                page_vaddr,
                frame,
                PageFlags::PRESENT | PageFlags::USER | PageFlags::WRITABLE,
            )
            .map_err(|_| ElfError::MapFailed)?;
    }

    Ok(LoadedElf {
        address_space: space,
        entry: header.entry,
        user_stack_top: USER_STACK_TOP,
    })
}

/// Looks up `path` on the mounted filesystem, reads it whole, loads it as
/// an ELF32 executable and spawns it as a new ring-3 process.
pub fn exec(path: &str) -> Result<crate::process::pcb::Pid, ElfError> {
    let node = crate::fs::lookup(path).map_err(|_| ElfError::MapFailed)?;
    let mut buffer = vec![0u8; node.length() as usize];
    node.read(0, &mut buffer).map_err(|_| ElfError::MapFailed)?;

    let loaded = load(&buffer)?;
    crate::process::create_process(path, loaded.address_space, loaded.entry, loaded.user_stack_top)
        .map_err(|_| ElfError::MapFailed)
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    fn make_minimal_elf(entry: u32, vaddr: u32, memsz: u32, filesz: u32, flags: u32) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE + PHDR_SIZE];
        buf[0..4].copy_from_slice(&ELF_MAGIC.to_le_bytes());
        buf[4] = 1; // 32-bit
        buf[5] = 1; // little endian
        buf[16..18].copy_from_slice(&ET_EXEC.to_le_bytes());
        buf[18..20].copy_from_slice(&EM_386.to_le_bytes());
        buf[24..28].copy_from_slice(&entry.to_le_bytes());
        buf[28..32].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
        buf[44..46].copy_from_slice(&1u16.to_le_bytes());

        let ph = HEADER_SIZE;
        buf[ph..ph + 4].copy_from_slice(&PT_LOAD.to_le_bytes());
        buf[ph + 4..ph + 8].copy_from_slice(&0u32.to_le_bytes());
        buf[ph + 8..ph + 12].copy_from_slice(&vaddr.to_le_bytes());
        buf[ph + 16..ph + 20].copy_from_slice(&filesz.to_le_bytes());
        buf[ph + 20..ph + 24].copy_from_slice(&memsz.to_le_bytes());
        buf[ph + 24..ph + 28].copy_from_slice(&flags.to_le_bytes());
        buf
    }

    #[test]
    fn rejects_bad_magic() {
        let data = vec![0u8; 64];
        assert_eq!(parse_header(&data).unwrap_err(), ElfError::BadMagic);
    }

    #[test]
    fn rejects_wrong_machine() {
        let mut data = make_minimal_elf(0x1000, 0x1000, 0x1000, 0, 7);
        data[18..20].copy_from_slice(&62u16.to_le_bytes()); // x86_64
        assert_eq!(parse_header(&data).unwrap_err(), ElfError::UnsupportedMachine);
    }

    #[test]
    fn parses_valid_header() {
        let data = make_minimal_elf(0x1000, 0x1000, 0x2000, 0x1000, 7);
        let header = parse_header(&data).unwrap();
        assert_eq!(header.entry, 0x1000);
        assert_eq!(header.phnum, 1);
        let phs = parse_program_headers(&data, &header).unwrap();
        assert_eq!(phs.len(), 1);
        assert_eq!(phs[0].vaddr, 0x1000);
        assert_eq!(phs[0].memsz, 0x2000);
    }
}
