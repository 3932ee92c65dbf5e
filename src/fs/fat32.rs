//! Read-only FAT32 volume reader.
//!
//! Grounded on `original_source/src/fat32.c`: mount reads sector 0 into a
//! BPB, rejects it if any of `bytes_per_sector`/`sectors_per_cluster`/
//! `num_fats`/`fat_size_32` is zero, then derives `fat_start_sector`,
//! `data_start_sector` and `root_cluster`. Directory scan and cluster-chain
//! walking follow the same file's `fat32_readdir`/`fat32_finddir`/
//! `fat32_read`/`get_next_cluster`, narrowed to drive 0 (the only ATA
//! drive this kernel ever mounts) and returning `Result` instead of a bare
//! pointer/zero sentinel.

use super::vfs::{DirEntry, Node};
use crate::drivers::ata;
use crate::error::Fat32Error;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use spin::Mutex;

const ATTR_LONG_NAME: u8 = 0x0F;
const ATTR_DIRECTORY: u8 = 0x10;
const END_OF_CHAIN: u32 = 0x0FFF_FFF8;
const DIR_ENTRY_SIZE: usize = 32;
const DRIVE: u8 = 0;

#[derive(Debug, Clone, Copy, Default)]
struct Bpb {
    bytes_per_sector: u16,
    sectors_per_cluster: u8,
    reserved_sectors: u16,
    num_fats: u8,
    fat_size_32: u32,
    root_cluster: u32,
}

struct Volume {
    bpb: Bpb,
    fat_start_sector: u32,
    data_start_sector: u32,
}

static VOLUME: Mutex<Option<Volume>> = Mutex::new(None);

fn parse_bpb(sector: &[u8; 512]) -> Option<Bpb> {
    if sector[510] != 0x55 || sector[511] != 0xAA {
        return None;
    }
    let u16_at = |o: usize| u16::from_le_bytes([sector[o], sector[o + 1]]);
    let u32_at = |o: usize| u32::from_le_bytes([sector[o], sector[o + 1], sector[o + 2], sector[o + 3]]);

    Some(Bpb {
        bytes_per_sector: u16_at(11),
        sectors_per_cluster: sector[13],
        reserved_sectors: u16_at(14),
        num_fats: sector[16],
        fat_size_32: u32_at(36),
        root_cluster: u32_at(44),
    })
}

/// Reads sector 0 of drive 0, validates the BPB and installs the root
/// directory node. Must run once, after `drivers::ata::init`.
pub fn mount() -> Result<(), Fat32Error> {
    let mut sector = [0u8; 512];
    ata::read_sectors(DRIVE, 0, 1, &mut sector).map_err(|_| Fat32Error::ReadFailed)?;

    let bpb = parse_bpb(&sector).ok_or(Fat32Error::BadSignature)?;
    if bpb.bytes_per_sector == 0 || bpb.sectors_per_cluster == 0 {
        return Err(Fat32Error::NotFat32);
    }
    if bpb.fat_size_32 == 0 || bpb.num_fats == 0 {
        return Err(Fat32Error::NotFat32);
    }

    let fat_start_sector = bpb.reserved_sectors as u32;
    let data_start_sector = fat_start_sector + bpb.num_fats as u32 * bpb.fat_size_32;

    log::info!(
        "fat32: mounted, root cluster {}, {} bytes/cluster",
        bpb.root_cluster,
        bpb.sectors_per_cluster as u32 * bpb.bytes_per_sector as u32
    );

    *VOLUME.lock() = Some(Volume {
        bpb,
        fat_start_sector,
        data_start_sector,
    });
    Ok(())
}

pub fn root() -> Result<Node, Fat32Error> {
    let guard = VOLUME.lock();
    let vol = guard.as_ref().ok_or(Fat32Error::NotFat32)?;
    Ok(Node::Directory {
        inode: vol.bpb.root_cluster,
    })
}

fn cluster_size(vol: &Volume) -> u32 {
    vol.bpb.sectors_per_cluster as u32 * vol.bpb.bytes_per_sector as u32
}

fn read_cluster(vol: &Volume, cluster: u32, buffer: &mut [u8]) -> Result<(), Fat32Error> {
    let lba = vol.data_start_sector + (cluster - 2) * vol.bpb.sectors_per_cluster as u32;
    ata::read_sectors(DRIVE, lba, vol.bpb.sectors_per_cluster, buffer)
        .map_err(|_| Fat32Error::ReadFailed)
}

fn next_cluster(vol: &Volume, cluster: u32) -> Result<u32, Fat32Error> {
    let fat_offset = cluster * 4;
    let fat_sector = vol.fat_start_sector + fat_offset / vol.bpb.bytes_per_sector as u32;
    let ent_offset = (fat_offset % vol.bpb.bytes_per_sector as u32) as usize;

    let mut sector = [0u8; 512];
    ata::read_sectors(DRIVE, fat_sector, 1, &mut sector).map_err(|_| Fat32Error::ReadFailed)?;

    let raw = u32::from_le_bytes([
        sector[ent_offset],
        sector[ent_offset + 1],
        sector[ent_offset + 2],
        sector[ent_offset + 3],
    ]);
    Ok(raw & 0x0FFF_FFFF)
}

/// Normalizes an on-disk 8.3 name (11 bytes, space-padded) into `BASE.EXT`.
fn normalize_name(raw: &[u8; 11]) -> String {
    let mut name = String::with_capacity(12);
    for &b in &raw[0..8] {
        if b != b' ' {
            name.push(b as char);
        }
    }
    if raw[8] != b' ' {
        name.push('.');
        for &b in &raw[8..11] {
            if b != b' ' {
                name.push(b as char);
            }
        }
    }
    name
}

fn for_each_entry<F: FnMut(&[u8]) -> bool>(vol: &Volume, start_cluster: u32, mut f: F) -> Result<(), Fat32Error> {
    let csize = cluster_size(vol) as usize;
    let mut buffer = vec![0u8; csize];
    let mut cluster = start_cluster;

    while cluster < END_OF_CHAIN {
        read_cluster(vol, cluster, &mut buffer)?;
        for chunk in buffer.chunks_exact(DIR_ENTRY_SIZE) {
            if chunk[0] == 0x00 {
                return Ok(()); // end of directory
            }
            if chunk[0] == 0xE5 {
                continue; // deleted
            }
            if chunk[11] & ATTR_LONG_NAME == ATTR_LONG_NAME {
                continue; // long-filename entry, unsupported
            }
            if !f(chunk) {
                return Ok(());
            }
        }
        cluster = next_cluster(vol, cluster)?;
    }
    Ok(())
}

fn entry_to_dirent(chunk: &[u8]) -> DirEntry {
    let mut raw_name = [0u8; 11];
    raw_name.copy_from_slice(&chunk[0..11]);
    let attr = chunk[11];
    let fst_clus_hi = u16::from_le_bytes([chunk[20], chunk[21]]) as u32;
    let fst_clus_lo = u16::from_le_bytes([chunk[26], chunk[27]]) as u32;
    let file_size = u32::from_le_bytes([chunk[28], chunk[29], chunk[30], chunk[31]]);

    DirEntry {
        name: normalize_name(&raw_name),
        inode: (fst_clus_hi << 16) | fst_clus_lo,
        is_dir: attr & ATTR_DIRECTORY != 0,
        length: file_size,
    }
}

pub(super) fn read_dir(start_cluster: u32) -> Result<Vec<DirEntry>, Fat32Error> {
    let guard = VOLUME.lock();
    let vol = guard.as_ref().ok_or(Fat32Error::NotFat32)?;

    let mut entries = Vec::new();
    for_each_entry(vol, start_cluster, |chunk| {
        entries.push(entry_to_dirent(chunk));
        true
    })?;
    Ok(entries)
}

pub(super) fn find_in_dir(start_cluster: u32, name: &str) -> Result<Node, Fat32Error> {
    let guard = VOLUME.lock();
    let vol = guard.as_ref().ok_or(Fat32Error::NotFat32)?;

    let mut found = None;
    for_each_entry(vol, start_cluster, |chunk| {
        let dirent = entry_to_dirent(chunk);
        if dirent.name.eq_ignore_ascii_case(name) {
            found = Some(dirent);
            false
        } else {
            true
        }
    })?;

    match found {
        Some(d) if d.is_dir => Ok(Node::Directory { inode: d.inode }),
        Some(d) => Ok(Node::File {
            inode: d.inode,
            length: d.length,
        }),
        None => Err(Fat32Error::NoSuchFile),
    }
}

/// Reads `buffer.len()` bytes starting at `offset` from the file whose
/// first cluster is `start_cluster`. Skips whole clusters to reach
/// `offset`, then copies the intersection of each subsequent cluster with
/// the requested range. Returns the number of bytes actually read, which
/// is short at end-of-chain.
pub(super) fn read_file(start_cluster: u32, mut offset: u32, buffer: &mut [u8]) -> Result<u32, Fat32Error> {
    let guard = VOLUME.lock();
    let vol = guard.as_ref().ok_or(Fat32Error::NotFat32)?;

    let csize = cluster_size(vol);
    let mut cluster = start_cluster;

    while offset >= csize {
        cluster = next_cluster(vol, cluster)?;
        if cluster >= END_OF_CHAIN {
            return Ok(0);
        }
        offset -= csize;
    }

    let mut read_total = 0u32;
    let mut remaining = buffer.len() as u32;
    let mut cluster_buf = vec![0u8; csize as usize];

    while remaining > 0 {
        if read_cluster(vol, cluster, &mut cluster_buf).is_err() {
            break;
        }

        let chunk_size = (csize - offset).min(remaining);
        let src = &cluster_buf[offset as usize..offset as usize + chunk_size as usize];
        let dst = &mut buffer[read_total as usize..(read_total + chunk_size) as usize];
        dst.copy_from_slice(src);

        read_total += chunk_size;
        remaining -= chunk_size;
        offset = 0;

        if remaining > 0 {
            cluster = match next_cluster(vol, cluster) {
                Ok(c) if c < END_OF_CHAIN => c,
                _ => break,
            };
        }
    }

    Ok(read_total)
}
