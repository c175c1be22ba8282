//! # Global Descriptor Table manager
//!
//! The table layout is fixed for the whole kernel lifetime:
//!
//! | idx | selector | descriptor                          | access | gran |
//! |-----|----------|-------------------------------------|--------|------|
//! | 0   | 0x00     | null                                | 0x00   | 0x00 |
//! | 1   | 0x08     | kernel code, base 0, limit 0xFFFFF  | 0x9A   | 0xCF |
//! | 2   | 0x10     | kernel data                         | 0x92   | 0xCF |
//! | 3   | 0x18     | user code (ring 3)                  | 0xFA   | 0xCF |
//! | 4   | 0x20     | user data (ring 3)                  | 0xF2   | 0xCF |
//! | 5   | 0x28     | TSS, base = &tss, limit = size - 1  | 0x89   | 0x00 |
//!
//! [`Gdt::setup`] installs all six entries, loads the table into the CPU and
//! captures a rolling checksum over the 48 descriptor bytes. The checksum is
//! taken *after* the load so CPU-induced mutation (the accessed bit on the
//! segments the load refreshes) is part of the baseline.
//! [`Gdt::verify_integrity`] recomputes it on demand; a mismatch means some
//! code scribbled over the table.

pub mod descriptors;
pub mod selectors;

use crate::platform::{Platform, TablePointer};
use crate::tss::Tss;
use descriptors::SegmentDescriptor;
use thiserror::Error;

/// Number of descriptors in the fixed layout.
pub const ENTRY_COUNT: usize = 6;

/// Index of the TSS descriptor slot.
pub const TSS_INDEX: usize = 5;

/// Access byte of the ring-0 code segment.
pub const KERNEL_CODE_ACCESS: u8 = 0x9A;
/// Access byte of the ring-0 data segment.
pub const KERNEL_DATA_ACCESS: u8 = 0x92;
/// Access byte of the ring-3 code segment.
pub const USER_CODE_ACCESS: u8 = 0xFA;
/// Access byte of the ring-3 data segment.
pub const USER_DATA_ACCESS: u8 = 0xF2;
/// Access byte of an available 32-bit TSS descriptor.
pub const TSS_ACCESS: u8 = 0x89;

/// 20-bit limit of the flat 4 GiB segments (page granular).
const FLAT_LIMIT: u32 = 0x000F_FFFF;
/// Granularity byte of the flat segments: 4 KiB pages, 32-bit.
const FLAT_GRANULARITY: u8 = 0xCF;
/// Granularity byte of the TSS descriptor: byte granular.
const TSS_GRANULARITY: u8 = 0x00;

/// Ways [`Gdt::verify_integrity`] can fail.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum IntegrityError {
    /// The table was never set up and loaded.
    #[error("descriptor table was never loaded")]
    NotLoaded,
    /// The rolling checksum over the descriptor bytes changed.
    #[error("descriptor checksum mismatch: captured {captured:#010x}, recomputed {recomputed:#010x}")]
    ChecksumMismatch { captured: u32, recomputed: u32 },
    /// The null descriptor is no longer all zeroes.
    #[error("null descriptor has been overwritten")]
    NullDescriptorClobbered,
    /// A fixed segment's access byte no longer matches the layout.
    #[error("segment {index} access byte changed: expected {expected:#04x}, found {found:#04x}")]
    AccessChanged {
        index: usize,
        expected: u8,
        found: u8,
    },
    /// The loaded table pointer no longer matches the table.
    #[error("descriptor table pointer is stale")]
    PointerMismatch,
}

/// The descriptor table plus the state needed to re-verify it.
pub struct Gdt {
    entries: [SegmentDescriptor; ENTRY_COUNT],
    pointer: TablePointer,
    checksum: u32,
    loaded: bool,
}

impl Gdt {
    /// An empty, unloaded table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [SegmentDescriptor::new(); ENTRY_COUNT],
            pointer: TablePointer { limit: 0, base: 0 },
            checksum: 0,
            loaded: false,
        }
    }

    /// Writes one descriptor. An out-of-range index is a silent no-op.
    pub fn set_entry(&mut self, index: usize, base: u32, limit: u32, access: u8, granularity: u8) {
        if index >= ENTRY_COUNT {
            return;
        }
        self.entries[index] = SegmentDescriptor::from_parts(base, limit, access, granularity);
    }

    /// Installs the fixed layout, loads the table and captures the checksum.
    ///
    /// The TSS descriptor is encoded from `tss`'s address up front so the
    /// checksum covers the final table bytes. The TSS *contents* are still
    /// all zeroes at this point; they are filled in by the trap-table setup,
    /// which does not touch these descriptor bytes.
    ///
    /// Finishes with a [`Self::verify_integrity`] pass and returns its
    /// result.
    ///
    /// # Errors
    ///
    /// Returns the first integrity violation found after the load.
    pub fn setup<P: Platform>(&mut self, platform: &mut P, tss: &Tss) -> Result<(), IntegrityError> {
        self.entries = [SegmentDescriptor::new(); ENTRY_COUNT];

        self.set_entry(0, 0, 0, 0, 0);
        self.set_entry(1, 0, FLAT_LIMIT, KERNEL_CODE_ACCESS, FLAT_GRANULARITY);
        self.set_entry(2, 0, FLAT_LIMIT, KERNEL_DATA_ACCESS, FLAT_GRANULARITY);
        self.set_entry(3, 0, FLAT_LIMIT, USER_CODE_ACCESS, FLAT_GRANULARITY);
        self.set_entry(4, 0, FLAT_LIMIT, USER_DATA_ACCESS, FLAT_GRANULARITY);
        self.set_entry(
            TSS_INDEX,
            tss_descriptor_base(tss),
            Tss::LIMIT,
            TSS_ACCESS,
            TSS_GRANULARITY,
        );

        self.pointer = self.table_pointer();
        platform.load_gdt(self.pointer);

        self.checksum = self.compute_checksum();
        self.loaded = true;

        self.verify_integrity()
    }

    /// Re-registers the TSS descriptor, slot 5 of the fixed layout.
    ///
    /// Writes the same bytes [`Self::setup`] already installed for the same
    /// `tss`, so the captured checksum stays valid.
    pub fn register_tss(&mut self, tss: &Tss) {
        self.set_entry(
            TSS_INDEX,
            tss_descriptor_base(tss),
            Tss::LIMIT,
            TSS_ACCESS,
            TSS_GRANULARITY,
        );
    }

    /// Checks the table against the state captured at setup.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: never loaded, checksum drift, a
    /// clobbered null descriptor, a changed access byte on one of the four
    /// fixed segments (the accessed bit is masked out), or a stale table
    /// pointer.
    pub fn verify_integrity(&self) -> Result<(), IntegrityError> {
        if !self.loaded {
            return Err(IntegrityError::NotLoaded);
        }

        let recomputed = self.compute_checksum();
        if recomputed != self.checksum {
            return Err(IntegrityError::ChecksumMismatch {
                captured: self.checksum,
                recomputed,
            });
        }

        if self.entries[0].into_bits() != 0 {
            return Err(IntegrityError::NullDescriptorClobbered);
        }

        let expected = [
            (1, KERNEL_CODE_ACCESS),
            (2, KERNEL_DATA_ACCESS),
            (3, USER_CODE_ACCESS),
            (4, USER_DATA_ACCESS),
        ];
        for (index, access) in expected {
            let found = self.entries[index].access() & SegmentDescriptor::ACCESSED_CLEAR;
            if found != access {
                return Err(IntegrityError::AccessChanged {
                    index,
                    expected: access,
                    found,
                });
            }
        }

        if self.pointer != self.table_pointer() {
            return Err(IntegrityError::PointerMismatch);
        }

        Ok(())
    }

    /// The descriptor at `index`, if in range.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<SegmentDescriptor> {
        self.entries.get(index).copied()
    }

    fn table_pointer(&self) -> TablePointer {
        TablePointer {
            limit: (size_of::<[SegmentDescriptor; ENTRY_COUNT]>() - 1) as u16,
            base: core::ptr::from_ref(&self.entries).addr(),
        }
    }

    fn compute_checksum(&self) -> u32 {
        let mut sum: u32 = 0;
        for entry in &self.entries {
            for byte in entry.to_bytes() {
                sum = sum.wrapping_add(u32::from(byte)).rotate_left(1);
            }
        }
        sum
    }
}

impl Default for Gdt {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn tss_descriptor_base(tss: &Tss) -> u32 {
    core::ptr::from_ref(tss).addr() as u32
}
