//! Kernel-wide error types.
//!
//! One small `#[derive(Debug)]` enum per subsystem with a `Display` impl,
//! rather than the teacher's capability/IPC-era `KernelError` umbrella
//! (`error.rs`'s `CapError`/`IpcError`/`SchedError`/`SyscallError`/
//! `FsError` variants plus a `LegacyError` string-migration escape
//! hatch) — none of that surface exists here since there is no
//! capability system or IPC to report errors for, and this is a
//! from-scratch build rather than a migration needing a legacy fallback.

use core::fmt;

pub use crate::mm::pmm::PmmError;
pub use crate::mm::vmm::VmmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    BadMagic,
    UnsupportedClass,
    UnsupportedMachine,
    NotExecutable,
    TruncatedHeader,
    TruncatedProgramHeader,
    SegmentOutOfRange,
    MapFailed,
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElfError::BadMagic => write!(f, "not an ELF file"),
            ElfError::UnsupportedClass => write!(f, "not a 32-bit ELF file"),
            ElfError::UnsupportedMachine => write!(f, "not an i386 ELF file"),
            ElfError::NotExecutable => write!(f, "ELF file is not an executable"),
            ElfError::TruncatedHeader => write!(f, "ELF header truncated"),
            ElfError::TruncatedProgramHeader => write!(f, "program header table truncated"),
            ElfError::SegmentOutOfRange => write!(f, "segment falls outside user address space"),
            ElfError::MapFailed => write!(f, "failed to map a loadable segment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fat32Error {
    BadSignature,
    NotFat32,
    NoSuchFile,
    NotADirectory,
    EndOfClusterChain,
    ReadFailed,
}

impl fmt::Display for Fat32Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fat32Error::BadSignature => write!(f, "boot sector missing 0x55AA signature"),
            Fat32Error::NotFat32 => write!(f, "volume is not FAT32"),
            Fat32Error::NoSuchFile => write!(f, "no such file or directory"),
            Fat32Error::NotADirectory => write!(f, "not a directory"),
            Fat32Error::EndOfClusterChain => write!(f, "unexpected end of cluster chain"),
            Fat32Error::ReadFailed => write!(f, "underlying ATA read failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtaError {
    NoDrive,
    Timeout,
    DeviceFault,
    BadSectorCount,
}

impl fmt::Display for AtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtaError::NoDrive => write!(f, "no ATA drive present"),
            AtaError::Timeout => write!(f, "ATA command timed out waiting for BSY to clear"),
            AtaError::DeviceFault => write!(f, "ATA status register reported a device fault"),
            AtaError::BadSectorCount => write!(f, "sector count out of range for PIO transfer"),
        }
    }
}
