//! # 32-bit GDT segment descriptor encoding
//!
//! Protected-mode descriptors pack a 32-bit base, a 20-bit limit, an access
//! byte and a flag nibble into one 8-byte entry. Unlike long mode, every
//! field matters here: the CPU uses base and limit on each segmented access,
//! so the flat segments must really span the full 4 GiB.
//!
//! Layout (low to high bits):
//!
//! | Bits  | Field       | Notes                          |
//! |-------|-------------|--------------------------------|
//! | 15:0  | limit 15:0  |                                |
//! | 31:16 | base 15:0   |                                |
//! | 39:32 | base 23:16  |                                |
//! | 47:40 | access      | P, DPL, S, type                |
//! | 51:48 | limit 19:16 |                                |
//! | 55:52 | flags       | G, D/B, L, AVL (high to low)   |
//! | 63:56 | base 31:24  |                                |

use bitfield_struct::bitfield;

/// Bit layout of a protected-mode segment descriptor.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct SegmentDescriptor {
    pub limit_lo: u16, // [15:0]   limit 15:0
    pub base_lo: u16,  // [31:16]  base 15:0
    pub base_mid: u8,  // [39:32]  base 23:16
    pub access: u8,    // [47:40]  P/DPL/S/type
    #[bits(4)]
    pub limit_hi: u8, // [51:48]  limit 19:16
    #[bits(4)]
    pub flags: u8, // [55:52]  G/DB/L/AVL
    pub base_hi: u8,   // [63:56]  base 31:24
}

impl SegmentDescriptor {
    /// Mask that clears the descriptor's accessed bit (type bit 0).
    ///
    /// The CPU sets that bit on first use of the segment, so integrity checks
    /// must compare access bytes with it cleared.
    pub const ACCESSED_CLEAR: u8 = 0xFE;

    /// Encodes `base`, a 20-bit `limit`, an access byte and a granularity
    /// byte into descriptor form.
    ///
    /// Only the high nibble of `granularity` is used; the limit's upper four
    /// bits take the low nibble's place in the packed entry.
    #[must_use]
    pub const fn from_parts(base: u32, limit: u32, access: u8, granularity: u8) -> Self {
        Self::new()
            .with_limit_lo((limit & 0xFFFF) as u16)
            .with_base_lo((base & 0xFFFF) as u16)
            .with_base_mid(((base >> 16) & 0xFF) as u8)
            .with_access(access)
            .with_limit_hi(((limit >> 16) & 0x0F) as u8)
            .with_flags((granularity >> 4) & 0x0F)
            .with_base_hi((base >> 24) as u8)
    }

    /// Reassembles the 32-bit base address.
    #[must_use]
    pub const fn base(self) -> u32 {
        self.base_lo() as u32
            | ((self.base_mid() as u32) << 16)
            | ((self.base_hi() as u32) << 24)
    }

    /// Reassembles the 20-bit limit.
    #[must_use]
    pub const fn limit(self) -> u32 {
        self.limit_lo() as u32 | ((self.limit_hi() as u32) << 16)
    }

    /// Returns the eight descriptor bytes in table order.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 8] {
        self.into_bits().to_le_bytes()
    }
}
