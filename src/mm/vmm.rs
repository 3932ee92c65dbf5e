//! Virtual memory manager: per-process page directories over the
//! two-level `page_table` layout, demand paging and address-space
//! cloning.
//!
//! Address-space split (see DESIGN.md for the resolved Open Question):
//! kernel identity-maps `[0, 0x4000_0000)` in every address space, the
//! kernel heap window `[0xF000_0000, 0xF400_0000)` is likewise shared,
//! and `[0x4000_0000, 0xC000_0000)` is free for each process's own
//! mappings, with the 8 KiB user stack at the top of that range.

use super::page_table::{Table, ENTRIES};
use super::{pmm, PageFlags};
use crate::config::{
    KERNEL_HEAP_START, KERNEL_IDENTITY_END, PAGE_SIZE, USER_SPACE_END, USER_SPACE_START,
};
use core::arch::asm;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmmError {
    OutOfMemory,
    AlreadyMapped,
    NotMapped,
    OutOfRange,
}

impl fmt::Display for VmmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmmError::OutOfMemory => write!(f, "out of physical memory while mapping"),
            VmmError::AlreadyMapped => write!(f, "virtual page already mapped"),
            VmmError::NotMapped => write!(f, "virtual page not mapped"),
            VmmError::OutOfRange => write!(f, "address outside the mappable range"),
        }
    }
}

const IDENTITY_PDES: usize = (KERNEL_IDENTITY_END / (PAGE_SIZE as u32 * ENTRIES as u32)) as usize;
const HEAP_PDE: usize = (KERNEL_HEAP_START / (PAGE_SIZE as u32 * ENTRIES as u32)) as usize;

/// The master kernel page directory: identity map plus the heap window.
/// Every process address space copies these entries by value, which
/// shares the underlying page-table frames (and hence the mappings)
/// across every address space in the system.
static mut KERNEL_PD: Table = Table::new();

fn alloc_table_frame() -> Result<u32, VmmError> {
    pmm::alloc_frame().map_err(|_| VmmError::OutOfMemory)
}

fn table_at_mut(phys: u32) -> &'static mut Table {
    unsafe { &mut *(phys as *mut Table) }
}

/// A process's virtual address space: owns a page directory frame and
/// (through it) whatever page-table frames it has allocated for its own
/// user-region mappings.
pub struct AddressSpace {
    pd_phys: u32,
}

impl AddressSpace {
    /// Builds a fresh address space sharing the kernel's identity map and
    /// heap window, with an empty user region.
    pub fn new() -> Result<Self, VmmError> {
        let pd_phys = alloc_table_frame()?;
        let pd = table_at_mut(pd_phys);
        pd.zero();
        unsafe {
            let kernel_pd = &raw const KERNEL_PD;
            for i in 0..IDENTITY_PDES {
                pd[i] = (*kernel_pd)[i];
            }
            pd[HEAP_PDE] = (*kernel_pd)[HEAP_PDE];
        }
        Ok(Self { pd_phys })
    }

    /// Deep-clones `src`'s user-region mappings (copy-the-data, not
    /// copy-on-write) into a new address space, alongside the same shared
    /// kernel entries every address space carries.
    pub fn clone_from(src: &AddressSpace) -> Result<Self, VmmError> {
        let mut dst = Self::new()?;
        let src_pd = table_at_mut(src.pd_phys);
        for pde_index in user_pde_range() {
            let src_pde = src_pd[pde_index];
            if !src_pde.is_present() {
                continue;
            }
            let src_pt = table_at_mut(src_pde.frame());
            for pte_index in 0..ENTRIES {
                let src_pte = src_pt[pte_index];
                if !src_pte.is_present() {
                    continue;
                }
                let vaddr = ((pde_index as u32) << 22) | ((pte_index as u32) << 12);
                let new_frame = alloc_table_frame()?;
                unsafe {
                    core::ptr::copy_nonoverlapping(
                        src_pte.frame() as *const u8,
                        new_frame as *mut u8,
                        PAGE_SIZE,
                    );
                }
                dst.map(vaddr, new_frame, src_pte.flags())?;
            }
        }
        Ok(dst)
    }

    fn ensure_table(&self, pde_index: usize) -> Result<&'static mut Table, VmmError> {
        let pd = table_at_mut(self.pd_phys);
        let pde = pd[pde_index];
        if pde.is_present() {
            return Ok(table_at_mut(pde.frame()));
        }
        let frame = alloc_table_frame()?;
        let table = table_at_mut(frame);
        table.zero();
        pd[pde_index].set(frame, PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER);
        Ok(table)
    }

    /// Maps one 4 KiB page. `vaddr` and `paddr` must already be
    /// page-aligned.
    pub fn map(&mut self, vaddr: u32, paddr: u32, flags: PageFlags) -> Result<(), VmmError> {
        let pde_index = (vaddr >> 22) as usize;
        let pte_index = ((vaddr >> 12) & 0x3FF) as usize;
        let table = self.ensure_table(pde_index)?;
        if table[pte_index].is_present() {
            return Err(VmmError::AlreadyMapped);
        }
        table[pte_index].set(paddr, flags);
        flush_tlb_entry(vaddr);
        Ok(())
    }

    /// Re-sets the flags of an already-mapped page, used by the ELF
    /// loader to clear the writable bit once a read-only segment has
    /// been fully populated.
    pub fn remap_flags(&mut self, vaddr: u32, flags: PageFlags) -> Result<(), VmmError> {
        let pde_index = (vaddr >> 22) as usize;
        let pte_index = ((vaddr >> 12) & 0x3FF) as usize;
        let pd = table_at_mut(self.pd_phys);
        let pde = pd[pde_index];
        if !pde.is_present() {
            return Err(VmmError::NotMapped);
        }
        let table = table_at_mut(pde.frame());
        if !table[pte_index].is_present() {
            return Err(VmmError::NotMapped);
        }
        let frame = table[pte_index].frame();
        table[pte_index].set(frame, flags);
        flush_tlb_entry(vaddr);
        Ok(())
    }

    pub fn unmap(&mut self, vaddr: u32) -> Result<(), VmmError> {
        let pde_index = (vaddr >> 22) as usize;
        let pte_index = ((vaddr >> 12) & 0x3FF) as usize;
        let pd = table_at_mut(self.pd_phys);
        let pde = pd[pde_index];
        if !pde.is_present() {
            return Err(VmmError::NotMapped);
        }
        let table = table_at_mut(pde.frame());
        if !table[pte_index].is_present() {
            return Err(VmmError::NotMapped);
        }
        table[pte_index].clear();
        flush_tlb_entry(vaddr);
        Ok(())
    }

    pub fn translate(&self, vaddr: u32) -> Option<u32> {
        let pde_index = (vaddr >> 22) as usize;
        let pte_index = ((vaddr >> 12) & 0x3FF) as usize;
        let pd = table_at_mut(self.pd_phys);
        let pde = pd[pde_index];
        if !pde.is_present() {
            return None;
        }
        let table = table_at_mut(pde.frame());
        let pte = table[pte_index];
        if !pte.is_present() {
            return None;
        }
        Some(pte.frame() | (vaddr & 0xFFF))
    }

    /// Handles a page fault by demand-allocating a zeroed frame, if the
    /// faulting address falls inside the user region and the containing
    /// page table exists (or can be created). BSS pages the ELF loader
    /// didn't pre-populate, and stack pages within the fixed user-stack
    /// range, are satisfied this way.
    pub fn handle_page_fault(&mut self, fault_addr: u32) -> Result<(), VmmError> {
        if !(USER_SPACE_START..USER_SPACE_END).contains(&fault_addr) {
            return Err(VmmError::OutOfRange);
        }
        let page = fault_addr & !0xFFF;
        let frame = alloc_table_frame()?;
        unsafe {
            core::ptr::write_bytes(frame as *mut u8, 0, PAGE_SIZE);
        }
        self.map(
            page,
            frame,
            PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER,
        )
    }

    pub fn phys_addr(&self) -> u32 {
        self.pd_phys
    }

    /// Loads this address space into `cr3`, making it active.
    pub fn activate(&self) {
        unsafe {
            asm!("mov cr3, {0}", in(reg) self.pd_phys, options(nostack, preserves_flags));
        }
    }
}

fn user_pde_range() -> core::ops::Range<usize> {
    (USER_SPACE_START as usize >> 22)..(USER_SPACE_END as usize >> 22)
}

fn flush_tlb_entry(vaddr: u32) {
    unsafe {
        asm!("invlpg [{0}]", in(reg) vaddr, options(nostack, preserves_flags));
    }
}

/// Builds the kernel's identity map and enables paging. Must run after
/// `pmm::init` and before any address space is created or the heap is
/// populated.
pub fn init() {
    unsafe {
        let kernel_pd = &raw mut KERNEL_PD;
        (*kernel_pd).zero();

        for pde_index in 0..IDENTITY_PDES {
            let frame = pmm::alloc_frame().expect("identity-map page tables must fit in RAM");
            let table = table_at_mut(frame);
            table.zero();
            for pte_index in 0..ENTRIES {
                let phys = ((pde_index * ENTRIES + pte_index) * PAGE_SIZE) as u32;
                table[pte_index].set(phys, PageFlags::PRESENT | PageFlags::WRITABLE);
            }
            (*kernel_pd)[pde_index].set(frame, PageFlags::PRESENT | PageFlags::WRITABLE);
        }

        let heap_frame = pmm::alloc_frame().expect("heap page table must fit in RAM");
        table_at_mut(heap_frame).zero();
        (*kernel_pd)[HEAP_PDE].set(heap_frame, PageFlags::PRESENT | PageFlags::WRITABLE);

        let pd_phys = kernel_pd as *const Table as u32;
        asm!(
            "mov cr3, {pd}",
            "mov {tmp}, cr0",
            "or {tmp}, 0x80000000",
            "mov cr0, {tmp}",
            pd = in(reg) pd_phys,
            tmp = out(reg) _,
            options(nostack, preserves_flags),
        );
    }
}

/// Maps one page of the shared kernel heap window. Called by
/// `mm::heap::init` to populate `KERNEL_HEAP_SIZE` bytes up front; the
/// mapping is then visible from every address space since they all copy
/// the `HEAP_PDE` entry by value in [`AddressSpace::new`].
pub fn map_kernel_heap_page(vaddr: u32, paddr: u32) {
    unsafe {
        let kernel_pd = &raw mut KERNEL_PD;
        let pde = (*kernel_pd)[HEAP_PDE];
        let table = table_at_mut(pde.frame());
        let pte_index = ((vaddr >> 12) & 0x3FF) as usize;
        table[pte_index].set(paddr, PageFlags::PRESENT | PageFlags::WRITABLE);
    }
}
