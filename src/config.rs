//! Compile-time kernel configuration.
//!
//! The original C kernel scattered these constants across headers
//! (`process.h`, `heap.h`, `vmm.h`). A `#![no_std]` kernel with no runtime
//! config file collapses that into one module of `const`s.

/// Maximum number of live processes (including the idle/init process).
pub const MAX_PROCESSES: usize = 256;

/// Size in bytes of each process's kernel-mode stack.
pub const KERNEL_STACK_SIZE: usize = 16 * 1024;

/// Size in bytes of the user stack mapped for every process.
pub const USER_STACK_SIZE: usize = 8 * 1024;

/// Top of the user stack (exclusive), growing down. See DESIGN.md for the
/// address-space split this was resolved against.
pub const USER_STACK_TOP: u32 = 0xC000_0000;

/// Start of the user-mapped address range (loaded ELF segments, heap, mmap).
pub const USER_SPACE_START: u32 = 0x4000_0000;

/// End (exclusive) of the user-mapped address range.
pub const USER_SPACE_END: u32 = 0xC000_0000;

/// The kernel identity-maps `[0, KERNEL_IDENTITY_END)` in every address space.
pub const KERNEL_IDENTITY_END: u32 = 0x4000_0000;

/// Start of the kernel heap window (shared, part of the kernel half).
pub const KERNEL_HEAP_START: u32 = 0xF000_0000;

/// Size of the kernel heap window in bytes (4 MiB). The ceiling `heap::grow`
/// maps up to, not the amount mapped at boot.
pub const KERNEL_HEAP_SIZE: usize = 4 * 1024 * 1024;

/// Bytes mapped at boot; `heap::grow` maps further pages on demand as the
/// free list runs dry, up to `KERNEL_HEAP_SIZE`.
pub const KERNEL_HEAP_INITIAL_SIZE: usize = 64 * 1024;

/// Number of `u32` words backing the physical-frame bitmap: 16384 words *
/// 32 bits/word * 4 KiB/frame = 2 GiB of addressable physical memory.
pub const BITMAP_WORDS: usize = 16384;

/// Page size on i686 protected mode, non-PAE.
pub const PAGE_SIZE: usize = 4096;

/// Bytes in the keyboard scancode ring buffer.
pub const KEY_BUFFER_SIZE: usize = 256;

/// PIT frequency in Hz driving the scheduler's preemption tick.
pub const TIMER_HZ: u32 = 100;

/// Scheduler time slice, expressed in timer ticks.
pub const TIME_SLICE_TICKS: u32 = 5;

/// `int 0x80` vector used for the syscall ABI.
pub const SYSCALL_VECTOR: u8 = 0x80;
