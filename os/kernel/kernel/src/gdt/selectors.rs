//! # Segment selectors for the fixed GDT layout
//!
//! Selectors are the 16-bit values loaded into CS/DS/ES/FS/GS/SS (and TR for
//! the TSS). A selector encodes:
//!
//! ```text
//!  15            3 2  1  0
//! +----------------+--+----+
//! |   Index[12:0]  |TI| RPL|
//! +----------------+--+----+  (TI=0 → GDT, TI=1 → LDT; RPL=0..3)
//! ```
//!
//! The descriptor table is fixed at six entries, so all selectors the kernel
//! ever loads are known constants. They are defined here once and checked
//! against their raw encodings at compile time.

use bitfield_struct::bitfield;

/// Requested Privilege Level, the low two bits of a selector.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Rpl {
    Ring0 = 0,
    Ring1 = 1,
    Ring2 = 2,
    Ring3 = 3,
}

impl Rpl {
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Ring0,
            1 => Self::Ring1,
            2 => Self::Ring2,
            _ => Self::Ring3,
        }
    }

    #[inline]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// Which descriptor table a selector addresses.
///
/// Only the GDT is used here; the LDT variant exists for completeness.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Table {
    Gdt = 0,
    Ldt = 1,
}

impl Table {
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        if bits == 0 { Self::Gdt } else { Self::Ldt }
    }

    #[inline]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// A 16-bit segment selector (index/TI/RPL).
#[bitfield(u16)]
#[derive(Eq, PartialEq)]
pub struct Selector {
    /// Requested Privilege Level (bits 0..1).
    #[bits(2)]
    pub rpl: Rpl,
    /// Table Indicator (bit 2): 0 = GDT, 1 = LDT.
    #[bits(1)]
    pub ti: Table,
    /// Descriptor index (bits 3..15).
    #[bits(13)]
    pub index: u16,
}

impl Selector {
    /// Creates a GDT selector from a descriptor index and RPL.
    #[inline]
    #[must_use]
    pub const fn gdt(index: u16, rpl: Rpl) -> Self {
        Self::new().with_index(index).with_ti(Table::Gdt).with_rpl(rpl)
    }

    /// Encodes as `u16` for iret frames, segment loads and `ltr`.
    #[inline]
    #[must_use]
    pub const fn encode(self) -> u16 {
        self.into_bits()
    }
}

/// Ring-0 code selector (GDT entry 1).
pub const KERNEL_CODE: Selector = Selector::gdt(1, Rpl::Ring0);
/// Ring-0 data/stack selector (GDT entry 2).
pub const KERNEL_DATA: Selector = Selector::gdt(2, Rpl::Ring0);
/// Ring-3 code selector (GDT entry 3, RPL 3).
pub const USER_CODE: Selector = Selector::gdt(3, Rpl::Ring3);
/// Ring-3 data/stack selector (GDT entry 4, RPL 3).
pub const USER_DATA: Selector = Selector::gdt(4, Rpl::Ring3);
/// Task register selector (GDT entry 5).
pub const TSS: Selector = Selector::gdt(5, Rpl::Ring0);

// The raw encodings are load-bearing: they appear in descriptor access
// checks, the iret frame and the hardware task register. Pin them.
const _: () = {
    assert!(KERNEL_CODE.encode() == 0x08);
    assert!(KERNEL_DATA.encode() == 0x10);
    assert!(USER_CODE.encode() == 0x1B);
    assert!(USER_DATA.encode() == 0x23);
    assert!(TSS.encode() == 0x28);
};

#[cfg(test)]
mod tests {
    use super::{Rpl, Selector, Table};

    #[test]
    fn selector_encoding_round_trips() {
        let sel = Selector::gdt(3, Rpl::Ring3);
        assert_eq!(sel.encode(), 0x1B);
        assert_eq!(sel.index(), 3);
        assert_eq!(sel.rpl(), Rpl::Ring3);
        assert_eq!(sel.ti(), Table::Gdt);
    }

    #[test]
    fn rpl_lives_in_the_low_two_bits() {
        assert_eq!(Selector::gdt(5, Rpl::Ring0).encode() & 0b11, 0);
        assert_eq!(Selector::gdt(5, Rpl::Ring3).encode() & 0b11, 3);
    }
}
