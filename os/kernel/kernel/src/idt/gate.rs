//! # Interrupt gate descriptor encoding
//!
//! Each of the 256 IDT slots is an 8-byte gate. The handler address is split
//! across the first and last words; the type/attribute byte carries the gate
//! kind, the DPL that may invoke it with `int`, and the present bit.
//!
//! | Bits  | Field        | Notes                                |
//! |-------|--------------|--------------------------------------|
//! | 15:0  | handler 15:0 |                                      |
//! | 31:16 | selector     | code segment the handler runs in     |
//! | 39:32 | reserved     | always 0                             |
//! | 43:40 | gate type    | 0xE interrupt gate, 0xF trap gate    |
//! | 44    | storage      | 0 for interrupt/trap gates           |
//! | 46:45 | DPL          | ring allowed to `int` this vector    |
//! | 47    | present      |                                      |
//! | 63:48 | handler 31:16|                                      |

use bitfield_struct::bitfield;

/// Ring-0 interrupt gate: present, DPL 0, gate type 0xE.
///
/// Interrupt gates clear IF on entry, so handlers run with interrupts off.
pub const INTERRUPT_GATE: u8 = 0x8E;

/// Ring-0 trap gate: present, DPL 0, gate type 0xF.
pub const TRAP_GATE: u8 = 0x8F;

/// DPL-3 attribute bits. OR into a gate byte to make the vector reachable
/// from user mode via `int`.
pub const RING3: u8 = 0x60;

/// Bit layout of an IDT gate.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct GateDescriptor {
    pub handler_lo: u16, // [15:0]   handler 15:0
    pub selector: u16,   // [31:16]  target code segment
    pub reserved: u8,    // [39:32]  always 0
    #[bits(4)]
    pub gate_type: u8, // [43:40]  0xE interrupt, 0xF trap
    #[bits(1)]
    pub storage: u8, // [44]     0 for interrupt/trap gates
    #[bits(2)]
    pub dpl: u8, // [46:45]
    pub present: bool,   // [47]
    pub handler_hi: u16, // [63:48]  handler 31:16
}

impl GateDescriptor {
    /// Encodes a gate from a handler address, a selector and a raw
    /// type/attribute byte such as [`INTERRUPT_GATE`].
    #[must_use]
    pub const fn from_parts(handler: u32, selector: u16, type_attr: u8) -> Self {
        Self::new()
            .with_handler_lo((handler & 0xFFFF) as u16)
            .with_selector(selector)
            .with_reserved(0)
            .with_gate_type(type_attr & 0x0F)
            .with_storage((type_attr >> 4) & 0x01)
            .with_dpl((type_attr >> 5) & 0x03)
            .with_present(type_attr & 0x80 != 0)
            .with_handler_hi((handler >> 16) as u16)
    }

    /// Reassembles the 32-bit handler address.
    #[must_use]
    pub const fn handler(self) -> u32 {
        self.handler_lo() as u32 | ((self.handler_hi() as u32) << 16)
    }

    /// Reassembles the raw type/attribute byte.
    #[must_use]
    pub const fn type_attr(self) -> u8 {
        self.gate_type()
            | (self.storage() << 4)
            | (self.dpl() << 5)
            | if self.present() { 0x80 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::{GateDescriptor, INTERRUPT_GATE, RING3, TRAP_GATE};

    #[test]
    fn interrupt_gate_attributes_decode() {
        let gate = GateDescriptor::from_parts(0x0010_2030, 0x08, INTERRUPT_GATE);
        assert_eq!(gate.selector(), 0x08);
        assert_eq!(gate.gate_type(), 0xE);
        assert_eq!(gate.dpl(), 0);
        assert!(gate.present());
        assert_eq!(gate.type_attr(), 0x8E);
    }

    #[test]
    fn user_callable_trap_gate_is_0xef() {
        let gate = GateDescriptor::from_parts(0xDEAD_0000, 0x08, TRAP_GATE | RING3);
        assert_eq!(gate.type_attr(), 0xEF);
        assert_eq!(gate.dpl(), 3);
        assert_eq!(gate.gate_type(), 0xF);
    }

    #[test]
    fn handler_address_splits_and_reassembles() {
        let gate = GateDescriptor::from_parts(0x1234_5678, 0x08, INTERRUPT_GATE);
        assert_eq!(gate.handler_lo(), 0x5678);
        assert_eq!(gate.handler_hi(), 0x1234);
        assert_eq!(gate.handler(), 0x1234_5678);
    }

    #[test]
    fn empty_gate_is_absent() {
        let gate = GateDescriptor::new();
        assert!(!gate.present());
        assert_eq!(gate.handler(), 0);
    }
}
