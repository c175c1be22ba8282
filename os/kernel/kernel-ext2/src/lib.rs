//! # Read-only ext2 driver
//!
//! Mounts a revision-0 ext2 filesystem from an in-memory byte image and
//! reads inodes, directories and file contents out of it. Nothing is ever
//! written back.
//!
//! Scope matches what the boot flow needs:
//!
//! - 128-byte inodes, block size `1024 << s_log_block_size`,
//! - direct block pointers only (files are capped at twelve blocks),
//! - sparse blocks (pointer zero) read back as zeros.
//!
//! Mounting copies the block group descriptor table out of the image into
//! caller-provided storage. The kernel gets that storage from the sector
//! allocator, host tests pass a plain array; the driver itself never
//! allocates.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

use core::mem::size_of;
use core::ptr::read_unaligned;

/// Inode number of the root directory, fixed by the format.
pub const ROOT_INODE: u32 = 2;

/// On-disk inode size for revision-0 filesystems.
const INODE_SIZE: usize = 128;

/// Direct block pointers per inode; the driver reads nothing beyond them.
const DIRECT_BLOCKS: usize = 12;

const SUPERBLOCK_OFFSET: usize = 1024;
const EXT2_MAGIC: u16 = 0xEF53;
const DESCRIPTOR_SIZE: usize = 32;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Ext2Error {
    /// The image ends before the structure that was being read.
    #[error("image is truncated at byte {0}")]
    Truncated(usize),
    /// The superblock magic is not 0xEF53.
    #[error("bad superblock magic {0:#06x}")]
    BadMagic(u16),
    /// The caller-provided descriptor storage cannot hold the table.
    #[error("descriptor table needs {needed} bytes, storage holds {got}")]
    DescriptorStorage { needed: usize, got: usize },
    /// A superblock field holds a value no valid filesystem can carry.
    #[error("corrupt superblock: {0}")]
    Corrupt(&'static str),
}

/// Superblock fields through `s_def_resgid`; the rest is ignored.
#[repr(C)]
#[derive(Clone, Copy)]
struct Superblock {
    inodes_count: u32,
    blocks_count: u32,
    r_blocks_count: u32,
    free_blocks_count: u32,
    free_inodes_count: u32,
    first_data_block: u32,
    log_block_size: u32,
    log_frag_size: u32,
    blocks_per_group: u32,
    frags_per_group: u32,
    inodes_per_group: u32,
    mtime: u32,
    wtime: u32,
    mnt_count: u16,
    max_mnt_count: u16,
    magic: u16,
    state: u16,
    errors: u16,
    minor_rev_level: u16,
    lastcheck: u32,
    checkinterval: u32,
    creator_os: u32,
    rev_level: u32,
    def_resuid: u16,
    def_resgid: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct GroupDescriptor {
    block_bitmap: u32,
    inode_bitmap: u32,
    inode_table: u32,
    free_blocks_count: u16,
    free_inodes_count: u16,
    used_dirs_count: u16,
    pad: u16,
    reserved: [u8; 12],
}

#[repr(C)]
#[derive(Clone, Copy)]
struct DirEntryHeader {
    inode: u32,
    rec_len: u16,
    name_len: u8,
    file_type: u8,
}

/// On-disk inode, revision-0 layout.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Inode {
    pub mode: u16,
    pub uid: u16,
    pub size: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub gid: u16,
    pub links_count: u16,
    /// Allocated size in 512-byte units, holes excluded.
    pub blocks: u32,
    pub flags: u32,
    pub osd1: u32,
    pub block: [u32; 15],
    pub generation: u32,
    pub file_acl: u32,
    pub dir_acl: u32,
    pub faddr: u32,
    pub osd2: [u8; 12],
}

const _: () = {
    assert!(size_of::<Superblock>() == 84);
    assert!(size_of::<GroupDescriptor>() == DESCRIPTOR_SIZE);
    assert!(size_of::<DirEntryHeader>() == 8);
    assert!(size_of::<Inode>() == INODE_SIZE);
};

/// Copy a `T` out of `bytes` at `offset`, or `None` past the end.
///
/// Only used with plain-integer `#[repr(C)]` structs for which every bit
/// pattern is a value.
fn read_at<T: Copy>(bytes: &[u8], offset: usize) -> Option<T> {
    let end = offset.checked_add(size_of::<T>())?;
    if end > bytes.len() {
        return None;
    }
    // SAFETY: bounds checked above; read_unaligned because on-disk
    // structures carry no alignment guarantee.
    Some(unsafe { read_unaligned(bytes.as_ptr().add(offset).cast::<T>()) })
}

/// A mounted filesystem borrowing the raw image.
#[derive(Debug)]
pub struct Ext2Volume<'a> {
    image: &'a [u8],
    descriptors: &'a [u8],
    block_size: usize,
    inodes_per_group: u32,
}

impl<'a> Ext2Volume<'a> {
    /// Byte length of the image's block group descriptor table.
    ///
    /// Callers size the storage for [`Self::mount`] with this before
    /// mounting; it validates the superblock the same way `mount` does.
    ///
    /// # Errors
    /// [`Ext2Error::Truncated`], [`Ext2Error::BadMagic`] or
    /// [`Ext2Error::Corrupt`].
    pub fn descriptor_table_len(image: &[u8]) -> Result<usize, Ext2Error> {
        let superblock = Self::superblock(image)?;
        let group_count = superblock
            .blocks_count
            .div_ceil(superblock.blocks_per_group) as usize;
        Ok(group_count * DESCRIPTOR_SIZE)
    }

    /// Mount the filesystem.
    ///
    /// `descriptors` receives a copy of the block group descriptor table
    /// and must hold at least [`Self::descriptor_table_len`] bytes; the
    /// volume reads group metadata from the copy afterwards, not from the
    /// image.
    ///
    /// # Errors
    /// [`Ext2Error::BadMagic`] for a non-ext2 image, [`Ext2Error::Truncated`]
    /// for one that ends mid-structure, [`Ext2Error::Corrupt`] for group
    /// sizes no filesystem can have, [`Ext2Error::DescriptorStorage`] when
    /// the storage is too small.
    pub fn mount(image: &'a [u8], descriptors: &'a mut [u8]) -> Result<Self, Ext2Error> {
        let superblock = Self::superblock(image)?;
        let block_size = 1024 << superblock.log_block_size;

        // With 1 KiB blocks the superblock occupies block 1 and the
        // descriptor table starts at block 2; with larger blocks both
        // share block 0 and the table starts at block 1.
        let table_offset = block_size * if block_size == 1024 { 2 } else { 1 };
        let group_count = superblock
            .blocks_count
            .div_ceil(superblock.blocks_per_group) as usize;
        let table_len = group_count * DESCRIPTOR_SIZE;

        let Some(table) = image.get(table_offset..table_offset + table_len) else {
            return Err(Ext2Error::Truncated(table_offset + table_len));
        };
        if descriptors.len() < table_len {
            return Err(Ext2Error::DescriptorStorage {
                needed: table_len,
                got: descriptors.len(),
            });
        }
        descriptors[..table_len].copy_from_slice(table);

        Ok(Self {
            image,
            descriptors: &descriptors[..table_len],
            block_size,
            inodes_per_group: superblock.inodes_per_group,
        })
    }

    fn superblock(image: &[u8]) -> Result<Superblock, Ext2Error> {
        let superblock: Superblock = read_at(image, SUPERBLOCK_OFFSET)
            .ok_or(Ext2Error::Truncated(SUPERBLOCK_OFFSET))?;
        if superblock.magic != EXT2_MAGIC {
            return Err(Ext2Error::BadMagic(superblock.magic));
        }
        // Both counts divide later lookups; zero would mean a filesystem
        // with no groups at all.
        if superblock.blocks_per_group == 0 {
            return Err(Ext2Error::Corrupt("zero blocks per group"));
        }
        if superblock.inodes_per_group == 0 {
            return Err(Ext2Error::Corrupt("zero inodes per group"));
        }
        Ok(superblock)
    }

    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Load an inode by its 1-based number.
    ///
    /// Returns `None` for inode 0, a group past the descriptor table, or
    /// a table slot beyond the image.
    #[must_use]
    pub fn read_inode(&self, number: u32) -> Option<Inode> {
        if number == 0 {
            return None;
        }
        let index = (number - 1) % self.inodes_per_group;
        let group = (number - 1) / self.inodes_per_group;

        let descriptor: GroupDescriptor =
            read_at(self.descriptors, group as usize * DESCRIPTOR_SIZE)?;
        let inodes_per_block = self.block_size / INODE_SIZE;
        let block = descriptor.inode_table as usize + index as usize / inodes_per_block;
        let offset = block * self.block_size + (index as usize % inodes_per_block) * INODE_SIZE;
        read_at(self.image, offset)
    }

    /// Iterate the entries of a directory inode.
    ///
    /// Walks the direct blocks the inode actually occupies (its allocated
    /// 512-byte count over the block size, at most twelve), skips holes
    /// and erased entries and stops at a zero `rec_len`. Early stop is the
    /// consumer's: drop the iterator.
    #[must_use]
    pub fn dir_entries(&self, inode: &Inode) -> DirEntries<'a> {
        let per_block = (self.block_size / 512) as u32;
        let occupied = (inode.blocks / per_block) as usize;
        let mut blocks = [0u32; DIRECT_BLOCKS];
        blocks.copy_from_slice(&inode.block[..DIRECT_BLOCKS]);
        DirEntries {
            image: self.image,
            block_size: self.block_size,
            blocks,
            bound: occupied.min(DIRECT_BLOCKS),
            block: 0,
            offset: 0,
        }
    }

    /// Read file contents starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes produced: the buffer length clamped to
    /// what the file still has past `offset`, and further capped by the
    /// direct-block limit. Sparse blocks produce zeros. An offset at or
    /// past the file size reads nothing.
    pub fn read_file(&self, inode: &Inode, offset: usize, buf: &mut [u8]) -> usize {
        let size = inode.size as usize;
        if offset >= size {
            return 0;
        }
        let len = buf.len().min(size - offset);
        let first = offset / self.block_size;
        let bound = (offset + len).div_ceil(self.block_size).min(DIRECT_BLOCKS);

        let mut produced = 0;
        for index in first..bound {
            if produced >= len {
                break;
            }
            let skip = if index == first {
                offset % self.block_size
            } else {
                0
            };
            let take = (self.block_size - skip).min(len - produced);
            let out = &mut buf[produced..produced + take];
            match inode.block[index] {
                0 => out.fill(0),
                pointer => {
                    let at = pointer as usize * self.block_size + skip;
                    let Some(source) = self.image.get(at..at + take) else {
                        break;
                    };
                    out.copy_from_slice(source);
                }
            }
            produced += take;
        }
        produced
    }
}

/// One directory entry: the inode number and the raw name bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DirEntry<'a> {
    pub inode: u32,
    pub name: &'a [u8],
}

/// Lazy directory walk, produced by [`Ext2Volume::dir_entries`].
pub struct DirEntries<'a> {
    image: &'a [u8],
    block_size: usize,
    blocks: [u32; DIRECT_BLOCKS],
    bound: usize,
    block: usize,
    offset: usize,
}

impl<'a> Iterator for DirEntries<'a> {
    type Item = DirEntry<'a>;

    fn next(&mut self) -> Option<DirEntry<'a>> {
        while self.block < self.bound {
            let pointer = self.blocks[self.block];
            if pointer == 0 || self.offset >= self.block_size {
                self.block += 1;
                self.offset = 0;
                continue;
            }

            let at = pointer as usize * self.block_size + self.offset;
            let header: DirEntryHeader = read_at(self.image, at)?;

            // Advance before filtering so erased entries are stepped over
            // and a zero rec_len moves to the next block instead of
            // spinning in place.
            if header.rec_len == 0 {
                self.block += 1;
                self.offset = 0;
            } else {
                self.offset += header.rec_len as usize;
            }

            if header.inode == 0 {
                continue;
            }
            let name = self
                .image
                .get(at + size_of::<DirEntryHeader>()..)?
                .get(..header.name_len as usize)?;
            return Some(DirEntry {
                inode: header.inode,
                name,
            });
        }
        None
    }
}
