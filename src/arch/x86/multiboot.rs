//! Multiboot1 info structure parsing.
//!
//! The boot trampoline/linker script handshake itself is out of scope
//! (spec Non-goals); this module only reads the `multiboot_info_t` the
//! loader leaves in EBX at `_start` to discover physical memory extents.

const MULTIBOOT_FLAG_MEM: u32 = 1 << 0;
const MULTIBOOT_FLAG_MMAP: u32 = 1 << 6;

#[repr(C, packed)]
struct MultibootInfoRaw {
    flags: u32,
    mem_lower: u32,
    mem_upper: u32,
    boot_device: u32,
    cmdline: u32,
    mods_count: u32,
    mods_addr: u32,
    syms: [u32; 4],
    mmap_length: u32,
    mmap_addr: u32,
}

#[repr(C, packed)]
struct MultibootMmapEntry {
    size: u32,
    base_addr: u64,
    length: u64,
    entry_type: u32,
}

pub const MMAP_TYPE_AVAILABLE: u32 = 1;

#[derive(Clone, Copy, Debug)]
pub struct MemoryRegion {
    pub base: u64,
    pub length: u64,
    pub available: bool,
}

/// Highest physical address reported either by the basic mem_upper field or
/// the memory map, whichever is present. Used to size the PMM bitmap scan.
pub struct MultibootInfo {
    raw: *const MultibootInfoRaw,
}

impl MultibootInfo {
    /// # Safety
    /// `addr` must be the physical address the bootloader passed in EBX,
    /// still mapped (identity-mapped low memory) at call time.
    pub unsafe fn from_addr(addr: u32) -> Self {
        Self {
            raw: addr as *const MultibootInfoRaw,
        }
    }

    fn flags(&self) -> u32 {
        unsafe { (*self.raw).flags }
    }

    /// Upper-memory size in KiB above 1 MiB, if the loader reported it.
    pub fn mem_upper_kib(&self) -> Option<u32> {
        if self.flags() & MULTIBOOT_FLAG_MEM != 0 {
            Some(unsafe { (*self.raw).mem_upper })
        } else {
            None
        }
    }

    pub fn memory_regions(&self) -> MemoryRegionIter {
        let (addr, len) = if self.flags() & MULTIBOOT_FLAG_MMAP != 0 {
            unsafe { ((*self.raw).mmap_addr, (*self.raw).mmap_length) }
        } else {
            (0, 0)
        };
        MemoryRegionIter {
            cursor: addr,
            end: addr + len,
        }
    }
}

pub struct MemoryRegionIter {
    cursor: u32,
    end: u32,
}

impl Iterator for MemoryRegionIter {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<MemoryRegion> {
        if self.cursor >= self.end {
            return None;
        }
        let entry = unsafe { &*(self.cursor as *const MultibootMmapEntry) };
        let region = MemoryRegion {
            base: entry.base_addr,
            length: entry.length,
            available: entry.entry_type == MMAP_TYPE_AVAILABLE,
        };
        // Each entry is prefixed by its own `size` field, not including
        // the size field itself.
        self.cursor += entry.size + 4;
        Some(region)
    }
}
