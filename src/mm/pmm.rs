//! Bitmap physical page-frame allocator.
//!
//! One bit per 4 KiB frame, `1` meaning free. `BITMAP_WORDS` `u32` words
//! cover `BITMAP_WORDS * 32` frames, i.e. 2 GiB of physical address space —
//! grounded on the teacher's `BitmapAllocator` (`mm/frame_allocator.rs`:
//! `Mutex<[u64; N]>` plus an `AtomicUsize` free counter), narrowed from its
//! NUMA/buddy-hybrid design to a single flat bitmap since this kernel has
//! no NUMA nodes and no allocation ever needs more than a handful of
//! contiguous frames.

use crate::arch::x86::multiboot::MultibootInfo;
use crate::config::{BITMAP_WORDS, PAGE_SIZE};
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmmError {
    OutOfMemory,
    InvalidFrame,
    DoubleFree,
}

impl fmt::Display for PmmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PmmError::OutOfMemory => write!(f, "out of physical memory"),
            PmmError::InvalidFrame => write!(f, "frame number out of range"),
            PmmError::DoubleFree => write!(f, "frame already free"),
        }
    }
}

struct Bitmap {
    words: [u32; BITMAP_WORDS],
    total_frames: usize,
    free_frames: AtomicUsize,
}

impl Bitmap {
    const fn new() -> Self {
        Self {
            words: [0; BITMAP_WORDS],
            total_frames: 0,
            free_frames: AtomicUsize::new(0),
        }
    }

    fn mark_free(&mut self, frame: usize) {
        self.words[frame / 32] |= 1 << (frame % 32);
    }

    fn mark_used_bit(&mut self, frame: usize) -> bool {
        let word = frame / 32;
        let bit = frame % 32;
        let was_free = self.words[word] & (1 << bit) != 0;
        self.words[word] &= !(1 << bit);
        was_free
    }

    fn is_free(&self, frame: usize) -> bool {
        self.words[frame / 32] & (1 << (frame % 32)) != 0
    }

    fn alloc_one(&mut self) -> Option<usize> {
        for (word_idx, word) in self.words.iter_mut().enumerate() {
            if *word == 0 {
                continue;
            }
            let bit = word.trailing_zeros() as usize;
            let frame = word_idx * 32 + bit;
            if frame >= self.total_frames {
                continue;
            }
            *word &= !(1 << bit);
            self.free_frames.fetch_sub(1, Ordering::Release);
            return Some(frame);
        }
        None
    }

    fn free_one(&mut self, frame: usize) -> Result<(), PmmError> {
        if frame >= self.total_frames {
            return Err(PmmError::InvalidFrame);
        }
        if self.is_free(frame) {
            return Err(PmmError::DoubleFree);
        }
        self.mark_free(frame);
        self.free_frames.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Scans for `count` consecutive free frames and allocates them as a
    /// unit. Unlike `alloc_one`'s per-word `trailing_zeros` scan, this walks
    /// frame-by-frame since a run can straddle a word boundary.
    fn alloc_contig(&mut self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let mut run_start = 0usize;
        let mut run_len = 0usize;
        for frame in 0..self.total_frames {
            if self.is_free(frame) {
                if run_len == 0 {
                    run_start = frame;
                }
                run_len += 1;
                if run_len == count {
                    for f in run_start..run_start + count {
                        self.mark_used_bit(f);
                    }
                    self.free_frames.fetch_sub(count, Ordering::Release);
                    return Some(run_start);
                }
            } else {
                run_len = 0;
            }
        }
        None
    }

    fn free_contig(&mut self, start: usize, count: usize) -> Result<(), PmmError> {
        if count == 0 {
            return Ok(());
        }
        if start + count > self.total_frames {
            return Err(PmmError::InvalidFrame);
        }
        if (start..start + count).any(|f| self.is_free(f)) {
            return Err(PmmError::DoubleFree);
        }
        for f in start..start + count {
            self.mark_free(f);
        }
        self.free_frames.fetch_add(count, Ordering::Release);
        Ok(())
    }
}

static BITMAP: Mutex<Bitmap> = Mutex::new(Bitmap::new());

/// Scans the Multiboot memory map, marking every available region's frames
/// free and everything else (reserved regions, the kernel image itself,
/// frame 0, and everything below 1 MiB regardless of what the map claims)
/// used. The kernel image extent comes from the linker symbols
/// `_kernel_start`/`_kernel_end` the boot trampoline provides.
pub fn init(info: &MultibootInfo) {
    extern "C" {
        static _kernel_start: u8;
        static _kernel_end: u8;
    }

    let max_frames = BITMAP_WORDS * 32;
    let mut bitmap = BITMAP.lock();
    bitmap.total_frames = match info.mem_upper_kib() {
        Some(kib) => ((kib as usize * 1024) / PAGE_SIZE + 256).min(max_frames),
        None => max_frames,
    };

    const LOW_MEM_FRAMES: usize = 0x100000 / PAGE_SIZE;

    for region in info.memory_regions() {
        if !region.available {
            continue;
        }
        let start_frame = (region.base / PAGE_SIZE as u64) as usize;
        let end_frame = ((region.base + region.length) / PAGE_SIZE as u64) as usize;
        for frame in start_frame.max(LOW_MEM_FRAMES)..end_frame.min(bitmap.total_frames) {
            bitmap.mark_free(frame);
        }
    }
    bitmap.free_frames.store(
        (0..bitmap.total_frames).filter(|&f| bitmap.is_free(f)).count(),
        Ordering::Release,
    );

    // Reserve the zero page (BIOS/real-mode data) and the kernel image
    // itself so neither is ever handed out by the allocator.
    let kernel_start = unsafe { &_kernel_start as *const u8 as usize };
    let kernel_end = unsafe { &_kernel_end as *const u8 as usize };
    let kernel_start_frame = kernel_start / PAGE_SIZE;
    let kernel_end_frame = (kernel_end + PAGE_SIZE - 1) / PAGE_SIZE;
    for frame in 0..1.max(kernel_end_frame) {
        if frame == 0 || (frame >= kernel_start_frame && frame < kernel_end_frame) {
            if bitmap.mark_used_bit(frame) {
                bitmap.free_frames.fetch_sub(1, Ordering::Release);
            }
        }
    }
}

/// Allocates a single 4 KiB physical frame, returning its base address.
pub fn alloc_frame() -> Result<u32, PmmError> {
    let mut bitmap = BITMAP.lock();
    bitmap
        .alloc_one()
        .map(|frame| (frame * PAGE_SIZE) as u32)
        .ok_or(PmmError::OutOfMemory)
}

/// Returns a previously allocated frame to the free pool.
pub fn free_frame(addr: u32) -> Result<(), PmmError> {
    let frame = addr as usize / PAGE_SIZE;
    BITMAP.lock().free_one(frame)
}

/// Allocates `count` physically contiguous 4 KiB frames, returning the base
/// address of the first one.
pub fn alloc_contig(count: usize) -> Result<u32, PmmError> {
    BITMAP
        .lock()
        .alloc_contig(count)
        .map(|frame| (frame * PAGE_SIZE) as u32)
        .ok_or(PmmError::OutOfMemory)
}

/// Returns a `count`-frame run previously obtained from `alloc_contig` to
/// the free pool.
pub fn free_contig(addr: u32, count: usize) -> Result<(), PmmError> {
    let start = addr as usize / PAGE_SIZE;
    BITMAP.lock().free_contig(start, count)
}

pub fn free_frame_count() -> usize {
    BITMAP.lock().free_frames.load(Ordering::Acquire)
}

pub fn total_frame_count() -> usize {
    BITMAP.lock().total_frames
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    fn fresh_bitmap(total: usize) -> Bitmap {
        let mut b = Bitmap::new();
        b.total_frames = total;
        for f in 0..total {
            b.mark_free(f);
        }
        b.free_frames.store(total, Ordering::Release);
        b
    }

    #[test]
    fn alloc_and_free_round_trips() {
        let mut b = fresh_bitmap(64);
        let f0 = b.alloc_one().expect("fresh bitmap should yield a frame");
        assert_eq!(f0, 0);
        assert_eq!(b.free_frames.load(Ordering::Acquire), 63);
        b.free_one(f0).expect("freeing a just-allocated frame should succeed");
        assert_eq!(b.free_frames.load(Ordering::Acquire), 64);
    }

    #[test]
    fn double_free_is_rejected() {
        let mut b = fresh_bitmap(8);
        let f = b.alloc_one().unwrap();
        b.free_one(f).unwrap();
        assert_eq!(b.free_one(f), Err(PmmError::DoubleFree));
    }

    #[test]
    fn exhaustion_returns_out_of_memory() {
        let mut b = fresh_bitmap(2);
        b.alloc_one().unwrap();
        b.alloc_one().unwrap();
        assert!(b.alloc_one().is_none());
    }

    #[test]
    fn contig_finds_a_run_spanning_a_word_boundary() {
        let mut b = fresh_bitmap(64);
        b.mark_used_bit(30);
        b.mark_used_bit(31);
        let start = b.alloc_contig(4).expect("should find a 4-frame run");
        assert_eq!(start, 32);
        assert_eq!(b.free_frames.load(Ordering::Acquire), 58);
    }

    #[test]
    fn contig_round_trips_through_free() {
        let mut b = fresh_bitmap(16);
        let start = b.alloc_contig(5).unwrap();
        b.free_contig(start, 5).unwrap();
        assert_eq!(b.free_frames.load(Ordering::Acquire), 16);
    }
}
