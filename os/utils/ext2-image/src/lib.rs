//! # Minimal ext2 image builder
//!
//! Produces small revision-0 ext2 images (1 KiB blocks, 128-byte inodes,
//! one block group) holding a flat set of files in the root directory.
//! `mkfs` uses it to pack user programs into the image the kernel embeds,
//! and the filesystem driver's tests use it to build fixtures in memory.
//!
//! Fixed on-disk layout:
//!
//! Block | Contents
//! ------|--------------------------
//! 0     | boot area (zeros)
//! 1     | superblock
//! 2     | block group descriptor table
//! 3     | block bitmap
//! 4     | inode bitmap
//! 5-12  | inode table (64 inodes)
//! 13    | root directory
//! 14+   | file data
//!
//! Files use direct block pointers only, so each is capped at 12 KiB.
//! All-zero blocks are written as holes (pointer zero, no block
//! allocated), the way a sparse-aware writer would.

/// Bytes per filesystem block.
pub const BLOCK_SIZE: usize = 1024;

/// Inode number of the root directory.
pub const ROOT_INODE: u32 = 2;

const EXT2_MAGIC: u16 = 0xEF53;
const INODE_SIZE: usize = 128;
const INODE_COUNT: u32 = 64;
const RESERVED_INODES: u32 = 10;

const BLOCK_BITMAP_BLOCK: u32 = 3;
const INODE_BITMAP_BLOCK: u32 = 4;
const INODE_TABLE_BLOCK: u32 = 5;
const INODE_TABLE_BLOCKS: u32 = (INODE_COUNT * INODE_SIZE as u32).div_ceil(BLOCK_SIZE as u32);
const ROOT_DIR_BLOCK: u32 = INODE_TABLE_BLOCK + INODE_TABLE_BLOCKS;
const FIRST_FILE_BLOCK: u32 = ROOT_DIR_BLOCK + 1;
const FIRST_FILE_INODE: u32 = RESERVED_INODES + 1;

const MAX_DIRECT_BLOCKS: usize = 12;
const MAX_FILE_SIZE: usize = MAX_DIRECT_BLOCKS * BLOCK_SIZE;

const MODE_DIRECTORY: u16 = 0x41ED; // drwxr-xr-x
const MODE_REGULAR: u16 = 0x81A4; // -rw-r--r--

const FILE_TYPE_REGULAR: u8 = 1;
const FILE_TYPE_DIRECTORY: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("file name {0:?} is empty or longer than 255 bytes")]
    BadName(String),
    #[error("file {name:?} is {size} bytes; direct blocks allow at most {MAX_FILE_SIZE}")]
    FileTooLarge { name: String, size: usize },
    #[error("too many files for one block group")]
    TooManyFiles,
    #[error("root directory block is full")]
    DirectoryFull,
}

/// Builder for a single-group ext2 image.
#[derive(Default)]
pub struct ImageBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl ImageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the root directory.
    #[must_use]
    pub fn file(mut self, name: &str, contents: &[u8]) -> Self {
        self.files.push((name.to_string(), contents.to_vec()));
        self
    }

    /// Serialize the filesystem.
    ///
    /// # Errors
    /// See [`BuildError`]; nothing is written on failure.
    pub fn build(self) -> Result<Vec<u8>, BuildError> {
        for (name, contents) in &self.files {
            if name.is_empty() || name.len() > 255 {
                return Err(BuildError::BadName(name.clone()));
            }
            if contents.len() > MAX_FILE_SIZE {
                return Err(BuildError::FileTooLarge {
                    name: name.clone(),
                    size: contents.len(),
                });
            }
        }
        if self.files.len() as u32 > INODE_COUNT - RESERVED_INODES {
            return Err(BuildError::TooManyFiles);
        }

        // "." and ".." followed by one entry per file, all 4-aligned; the
        // writer later stretches the final rec_len to the block end.
        let dir_bytes: usize = 24 + self
            .files
            .iter()
            .map(|(name, _)| dir_entry_len(name.len()))
            .sum::<usize>();
        if dir_bytes > BLOCK_SIZE {
            return Err(BuildError::DirectoryFull);
        }

        // Lay out data blocks, leaving holes where a whole block is zero.
        let mut next_block = FIRST_FILE_BLOCK;
        let mut layouts = Vec::with_capacity(self.files.len());
        for (_, contents) in &self.files {
            let mut pointers = [0u32; MAX_DIRECT_BLOCKS];
            for (index, chunk) in contents.chunks(BLOCK_SIZE).enumerate() {
                if chunk.iter().any(|&byte| byte != 0) {
                    pointers[index] = next_block;
                    next_block += 1;
                }
            }
            layouts.push(pointers);
        }

        let total_blocks = next_block;
        let mut image = vec![0u8; total_blocks as usize * BLOCK_SIZE];

        self.write_superblock(&mut image, total_blocks);
        self.write_group_desc(&mut image);
        self.write_block_bitmap(&mut image, total_blocks);
        self.write_inode_bitmap(&mut image);
        self.write_root_inode(&mut image);
        self.write_root_dir(&mut image);

        for (index, ((_, contents), pointers)) in self.files.iter().zip(&layouts).enumerate() {
            self.write_file_inode(&mut image, FIRST_FILE_INODE + index as u32, contents, pointers);
            for (chunk, &pointer) in contents.chunks(BLOCK_SIZE).zip(pointers.iter()) {
                if pointer != 0 {
                    let offset = pointer as usize * BLOCK_SIZE;
                    image[offset..offset + chunk.len()].copy_from_slice(chunk);
                }
            }
        }

        Ok(image)
    }

    fn write_superblock(&self, image: &mut [u8], total_blocks: u32) {
        let sb = BLOCK_SIZE; // superblock sits at byte 1024
        put_u32(image, sb, INODE_COUNT); // s_inodes_count
        put_u32(image, sb + 4, total_blocks); // s_blocks_count
        put_u32(image, sb + 8, 0); // s_r_blocks_count
        put_u32(image, sb + 12, 0); // s_free_blocks_count
        let free_inodes = INODE_COUNT - RESERVED_INODES - self.files.len() as u32;
        put_u32(image, sb + 16, free_inodes); // s_free_inodes_count
        put_u32(image, sb + 20, 1); // s_first_data_block
        put_u32(image, sb + 24, 0); // s_log_block_size (1024)
        put_u32(image, sb + 28, 0); // s_log_frag_size
        put_u32(image, sb + 32, 8192); // s_blocks_per_group
        put_u32(image, sb + 36, 8192); // s_frags_per_group
        put_u32(image, sb + 40, INODE_COUNT); // s_inodes_per_group
        put_u16(image, sb + 52, 0); // s_mnt_count
        put_u16(image, sb + 54, u16::MAX); // s_max_mnt_count
        put_u16(image, sb + 56, EXT2_MAGIC); // s_magic
        put_u16(image, sb + 58, 1); // s_state: clean
        put_u16(image, sb + 60, 1); // s_errors: continue
        put_u32(image, sb + 76, 0); // s_rev_level
    }

    fn write_group_desc(&self, image: &mut [u8]) {
        let gd = 2 * BLOCK_SIZE;
        put_u32(image, gd, BLOCK_BITMAP_BLOCK);
        put_u32(image, gd + 4, INODE_BITMAP_BLOCK);
        put_u32(image, gd + 8, INODE_TABLE_BLOCK);
        put_u16(image, gd + 12, 0); // bg_free_blocks_count
        let free_inodes = INODE_COUNT - RESERVED_INODES - self.files.len() as u32;
        put_u16(image, gd + 14, free_inodes as u16);
        put_u16(image, gd + 16, 1); // bg_used_dirs_count
    }

    fn write_block_bitmap(&self, image: &mut [u8], total_blocks: u32) {
        let base = BLOCK_BITMAP_BLOCK as usize * BLOCK_SIZE;
        // bit n covers block n + s_first_data_block
        for block in 1..total_blocks {
            let bit = block - 1;
            image[base + bit as usize / 8] |= 1 << (bit % 8);
        }
    }

    fn write_inode_bitmap(&self, image: &mut [u8]) {
        let base = INODE_BITMAP_BLOCK as usize * BLOCK_SIZE;
        let used = RESERVED_INODES + self.files.len() as u32;
        for inode in 0..used {
            image[base + inode as usize / 8] |= 1 << (inode % 8);
        }
        // pad bits past the inode count are conventionally set
        for bit in INODE_COUNT..BLOCK_SIZE as u32 * 8 {
            image[base + bit as usize / 8] |= 1 << (bit % 8);
        }
    }

    fn write_root_inode(&self, image: &mut [u8]) {
        let at = inode_offset(ROOT_INODE);
        put_u16(image, at, MODE_DIRECTORY);
        put_u32(image, at + 4, BLOCK_SIZE as u32); // i_size_lo
        put_u16(image, at + 26, 2); // i_links_count: "." and parent
        put_u32(image, at + 28, (BLOCK_SIZE / 512) as u32); // i_blocks
        put_u32(image, at + 40, ROOT_DIR_BLOCK); // i_block[0]
    }

    fn write_file_inode(
        &self,
        image: &mut [u8],
        inode: u32,
        contents: &[u8],
        pointers: &[u32; MAX_DIRECT_BLOCKS],
    ) {
        let at = inode_offset(inode);
        put_u16(image, at, MODE_REGULAR);
        put_u32(image, at + 4, contents.len() as u32); // i_size_lo
        put_u16(image, at + 26, 1); // i_links_count
        let allocated = pointers.iter().filter(|&&p| p != 0).count();
        put_u32(image, at + 28, (allocated * BLOCK_SIZE / 512) as u32); // i_blocks
        for (index, &pointer) in pointers.iter().enumerate() {
            put_u32(image, at + 40 + index * 4, pointer); // i_block[index]
        }
    }

    fn write_root_dir(&self, image: &mut [u8]) {
        let base = ROOT_DIR_BLOCK as usize * BLOCK_SIZE;
        let mut offset = 0;

        let mut remaining = self.files.len();
        let mut entry = |offset: &mut usize, inode: u32, name: &[u8], file_type: u8, last: bool| {
            let len = if last {
                BLOCK_SIZE - *offset
            } else {
                dir_entry_len(name.len())
            };
            let at = base + *offset;
            put_u32(image, at, inode);
            put_u16(image, at + 4, len as u16); // rec_len
            image[at + 6] = name.len() as u8;
            image[at + 7] = file_type;
            image[at + 8..at + 8 + name.len()].copy_from_slice(name);
            *offset += len;
        };

        entry(&mut offset, ROOT_INODE, b".", FILE_TYPE_DIRECTORY, false);
        entry(
            &mut offset,
            ROOT_INODE,
            b"..",
            FILE_TYPE_DIRECTORY,
            remaining == 0,
        );
        for (index, (name, _)) in self.files.iter().enumerate() {
            remaining -= 1;
            entry(
                &mut offset,
                FIRST_FILE_INODE + index as u32,
                name.as_bytes(),
                FILE_TYPE_REGULAR,
                remaining == 0,
            );
        }
    }
}

/// Size of a directory entry for a name, 4-aligned.
const fn dir_entry_len(name_len: usize) -> usize {
    (8 + name_len + 3) & !3
}

/// Byte offset of an inode (1-based numbering) in the inode table.
fn inode_offset(inode: u32) -> usize {
    INODE_TABLE_BLOCK as usize * BLOCK_SIZE + (inode as usize - 1) * INODE_SIZE
}

fn put_u16(image: &mut [u8], offset: usize, value: u16) {
    image[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(image: &mut [u8], offset: usize, value: u32) {
    image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
