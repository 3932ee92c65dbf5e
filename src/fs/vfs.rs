//! VFS node: a capability set, not a raw function-pointer table.
//!
//! Grounded on `original_source/src/vfs.c`'s `fs_node_t` (inode, length,
//! flags, and `read`/`write`/`readdir`/`finddir` callbacks dispatched
//! through `vfs_read`/`vfs_finddir`/etc. only when present and when the
//! node's type permits). Modeled here as an enum of node kinds holding the
//! operations each kind actually supports, per the guidance to treat the
//! node's callback set as a tagged interface rather than raw function
//! pointers.

use crate::error::Fat32Error;
use alloc::string::String;
use alloc::vec::Vec;

/// One entry found by a directory scan: name plus enough to build the
/// corresponding [`Node`] without re-reading the parent directory.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub inode: u32,
    pub is_dir: bool,
    pub length: u32,
}

/// A located filesystem object. `File` and `Directory` are the only
/// variants because this reader never Non-goal function: device nodes,
/// symlinks and pipes have no counterpart in a read-only FAT32 view.
#[derive(Debug, Clone, Copy)]
pub enum Node {
    File { inode: u32, length: u32 },
    Directory { inode: u32 },
}

impl Node {
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    pub fn length(&self) -> u32 {
        match self {
            Node::File { length, .. } => *length,
            Node::Directory { .. } => 0,
        }
    }

    /// Reads up to `buffer.len()` bytes starting at `offset`. Only valid on
    /// `File` nodes; directories return `NotADirectory`'s inverse error.
    pub fn read(&self, offset: u32, buffer: &mut [u8]) -> Result<u32, Fat32Error> {
        match self {
            Node::File { inode, .. } => super::fat32::read_file(*inode, offset, buffer),
            Node::Directory { .. } => Err(Fat32Error::NotADirectory),
        }
    }

    /// Lists every non-deleted, non-LFN, non-end-marker entry in a
    /// directory node.
    pub fn read_dir(&self) -> Result<Vec<DirEntry>, Fat32Error> {
        match self {
            Node::Directory { inode } => super::fat32::read_dir(*inode),
            Node::File { .. } => Err(Fat32Error::NotADirectory),
        }
    }

    /// Looks up `name` (already in normalized 8.3 form) as a direct child.
    pub fn find(&self, name: &str) -> Result<Node, Fat32Error> {
        match self {
            Node::Directory { inode } => super::fat32::find_in_dir(*inode, name),
            Node::File { .. } => Err(Fat32Error::NotADirectory),
        }
    }
}
