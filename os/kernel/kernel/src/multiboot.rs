//! # Multiboot2 boot information parsing
//!
//! The boot loader leaves a magic value in `eax` and the address of its
//! information structure in `ebx`. The structure is a sequence of
//! `(type, size)` tags, each padded to 8 bytes, terminated by a type-0 tag.
//! The kernel only cares about one of them: the memory map (type 6), whose
//! available entries are summed into the machine's usable memory total.

/// Value the boot loader leaves in `eax` for a Multiboot2 handoff.
pub const MULTIBOOT2_MAGIC: u32 = 0x36D7_6289;

const TAG_END: u32 = 0;
const TAG_MMAP: u32 = 6;
const MEMORY_AVAILABLE: u32 = 1;

#[repr(C)]
#[derive(Copy, Clone)]
struct TagHeader {
    tag_type: u32,
    size: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
struct MmapTagHeader {
    tag_type: u32,
    size: u32,
    entry_size: u32,
    entry_version: u32,
}

#[repr(C, packed)]
#[derive(Copy, Clone)]
struct MmapEntry {
    addr: u64,
    len: u64,
    entry_type: u32,
    zero: u32,
}

/// Sums the available-memory map entries of the boot information at `info`.
///
/// Returns 0 when `magic` is not the Multiboot2 magic or when no memory map
/// tag is present. Only the first memory map tag is consulted.
///
/// # Safety
///
/// - `info` must point to a complete Multiboot2 information structure:
///   readable tags terminated by an end tag, sizes that stay within the
///   structure.
#[must_use]
pub unsafe fn total_available_memory(magic: u32, info: usize) -> u64 {
    if magic != MULTIBOOT2_MAGIC {
        return 0;
    }

    // Tags start past the 8-byte (total_size, reserved) prologue.
    let mut tag = info + 8;
    let mut available: u64 = 0;

    loop {
        // SAFETY: per contract, `tag` walks readable tag headers until the
        // end tag; read_unaligned because only 8-byte alignment is given.
        let header = unsafe { core::ptr::read_unaligned(tag as *const TagHeader) };
        if header.tag_type == TAG_END {
            break;
        }

        if header.tag_type == TAG_MMAP {
            // SAFETY: a type-6 tag begins with the mmap tag header.
            let mmap = unsafe { core::ptr::read_unaligned(tag as *const MmapTagHeader) };
            if mmap.entry_size == 0 {
                break;
            }
            let mut entry = tag + size_of::<MmapTagHeader>();
            let end = tag + mmap.size as usize;
            while entry < end {
                // SAFETY: entries lie inside the tag per its size field.
                let record = unsafe { core::ptr::read_unaligned(entry as *const MmapEntry) };
                if record.entry_type == MEMORY_AVAILABLE {
                    available += record.len;
                }
                entry += mmap.entry_size as usize;
            }
            break;
        }

        tag += (header.size as usize + 7) & !7;
    }

    available
}

#[cfg(test)]
mod tests {
    use super::{total_available_memory, MULTIBOOT2_MAGIC};

    struct InfoBuilder {
        bytes: Vec<u8>,
    }

    impl InfoBuilder {
        fn new() -> Self {
            // total_size and reserved; the walker does not read them.
            Self { bytes: vec![0; 8] }
        }

        fn tag(mut self, tag_type: u32, payload: &[u8]) -> Self {
            let size = 8 + payload.len() as u32;
            self.bytes.extend_from_slice(&tag_type.to_le_bytes());
            self.bytes.extend_from_slice(&size.to_le_bytes());
            self.bytes.extend_from_slice(payload);
            while self.bytes.len() % 8 != 0 {
                self.bytes.push(0);
            }
            self
        }

        fn mmap_tag(self, entries: &[(u64, u64, u32)]) -> Self {
            let mut payload = Vec::new();
            payload.extend_from_slice(&24u32.to_le_bytes()); // entry_size
            payload.extend_from_slice(&0u32.to_le_bytes()); // entry_version
            for &(addr, len, entry_type) in entries {
                payload.extend_from_slice(&addr.to_le_bytes());
                payload.extend_from_slice(&len.to_le_bytes());
                payload.extend_from_slice(&entry_type.to_le_bytes());
                payload.extend_from_slice(&0u32.to_le_bytes());
            }
            self.tag(6, &payload)
        }

        fn finish(self) -> Vec<u8> {
            self.tag(0, &[]).bytes
        }
    }

    #[test]
    fn wrong_magic_reports_no_memory() {
        let info = InfoBuilder::new()
            .mmap_tag(&[(0, 0x10_0000, 1)])
            .finish();
        let total = unsafe { total_available_memory(0xDEAD_BEEF, info.as_ptr() as usize) };
        assert_eq!(total, 0);
    }

    #[test]
    fn available_entries_are_summed() {
        let info = InfoBuilder::new()
            .mmap_tag(&[
                (0, 0x0009_FC00, 1),
                (0x000F_0000, 0x1_0000, 2),
                (0x0010_0000, 0x3FF0_0000, 1),
            ])
            .finish();
        let total = unsafe { total_available_memory(MULTIBOOT2_MAGIC, info.as_ptr() as usize) };
        assert_eq!(total, 0x0009_FC00 + 0x3FF0_0000);
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let info = InfoBuilder::new()
            .tag(21, &[0xAA; 12])
            .tag(1, b"cmdline\0")
            .mmap_tag(&[(0, 0x20_0000, 1)])
            .finish();
        let total = unsafe { total_available_memory(MULTIBOOT2_MAGIC, info.as_ptr() as usize) };
        assert_eq!(total, 0x20_0000);
    }

    #[test]
    fn missing_memory_map_reports_zero() {
        let info = InfoBuilder::new().tag(1, b"cmdline\0").finish();
        let total = unsafe { total_available_memory(MULTIBOOT2_MAGIC, info.as_ptr() as usize) };
        assert_eq!(total, 0);
    }

    #[test]
    fn only_the_first_memory_map_counts() {
        let info = InfoBuilder::new()
            .mmap_tag(&[(0, 0x10_0000, 1)])
            .mmap_tag(&[(0, 0xFFFF_0000, 1)])
            .finish();
        let total = unsafe { total_available_memory(MULTIBOOT2_MAGIC, info.as_ptr() as usize) };
        assert_eq!(total, 0x10_0000);
    }
}
