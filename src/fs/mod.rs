//! Minimal read-only filesystem: a [`vfs::Node`] capability set backed by
//! a single mounted [`fat32`] volume on ATA drive 0.
//!
//! Narrowed from the teacher's full VFS (`blockdev`/`blockfs`/`devfs`/
//! `file`/`procfs`/`pty`/`ramfs`, generic `NodeType`/`Permissions`) to the
//! one filesystem this kernel ever mounts, since there is no device-node,
//! pipe or socket support and disk writes/FAT32 mutation are out of scope.

pub mod fat32;
pub mod vfs;

use crate::error::Fat32Error;
pub use vfs::{DirEntry, Node};

/// Mounts the FAT32 volume on drive 0. Must run once, after
/// `drivers::ata::init`.
pub fn init() -> Result<(), Fat32Error> {
    fat32::mount()
}

/// Looks up `path` (a single path component, e.g. `"TEST"`) as a direct
/// child of the mounted root directory.
pub fn lookup(path: &str) -> Result<Node, Fat32Error> {
    fat32::root()?.find(path)
}
