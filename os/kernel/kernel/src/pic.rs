//! # 8259 programmable interrupt controller
//!
//! The two cascaded PICs power-on mapped over the CPU exception vectors, so
//! init remaps them: primary to vectors 0x20..0x27, secondary to
//! 0x28..0x2F. The standard four-word init sequence runs on both chips,
//! then the masks open only the PIT timer (IRQ 0) and keyboard (IRQ 1)
//! lines.
//!
//! All chip state lives in the hardware; this module is plain functions
//! over [`Platform`] port I/O.

use crate::platform::Platform;

/// Command port of the primary PIC.
pub const PRIMARY_COMMAND: u16 = 0x20;
/// Data/mask port of the primary PIC.
pub const PRIMARY_DATA: u16 = 0x21;
/// Command port of the secondary PIC.
pub const SECONDARY_COMMAND: u16 = 0xA0;
/// Data/mask port of the secondary PIC.
pub const SECONDARY_DATA: u16 = 0xA1;

/// First vector of the remapped primary PIC.
pub const PRIMARY_OFFSET: u8 = 0x20;
/// First vector of the remapped secondary PIC.
pub const SECONDARY_OFFSET: u8 = 0x28;

/// ICW1: begin initialization, ICW4 follows.
const CMD_INIT: u8 = 0x11;
/// ICW4: 8086 mode.
const MODE_8086: u8 = 0x01;
/// OCW2: non-specific end of interrupt.
const CMD_END_OF_INTERRUPT: u8 = 0x20;

/// Initial primary mask: everything off except IRQ 0 and IRQ 1.
const PRIMARY_MASK: u8 = 0xFC;
/// Initial secondary mask: everything off.
const SECONDARY_MASK: u8 = 0xFF;

/// Remaps both PICs and applies the initial masks.
pub fn init<P: Platform>(platform: &mut P) {
    // Mask ports are read before init; the values are not restored, the
    // fixed masks below are authoritative.
    let _ = platform.port_read(PRIMARY_DATA);
    let _ = platform.port_read(SECONDARY_DATA);

    platform.port_write(PRIMARY_COMMAND, CMD_INIT);
    platform.port_write(SECONDARY_COMMAND, CMD_INIT);

    platform.port_write(PRIMARY_DATA, PRIMARY_OFFSET);
    platform.port_write(SECONDARY_DATA, SECONDARY_OFFSET);

    // Cascade wiring: secondary on the primary's IRQ 2 line.
    platform.port_write(PRIMARY_DATA, 0x04);
    platform.port_write(SECONDARY_DATA, 0x02);

    platform.port_write(PRIMARY_DATA, MODE_8086);
    platform.port_write(SECONDARY_DATA, MODE_8086);

    platform.port_write(PRIMARY_DATA, PRIMARY_MASK);
    platform.port_write(SECONDARY_DATA, SECONDARY_MASK);
}

/// Unmasks one IRQ line.
pub fn irq_enable<P: Platform>(platform: &mut P, irq: u8) {
    let (port, line) = mask_port(irq);
    let value = platform.port_read(port) & !(1 << line);
    platform.port_write(port, value);
}

/// Masks one IRQ line.
pub fn irq_disable<P: Platform>(platform: &mut P, irq: u8) {
    let (port, line) = mask_port(irq);
    let value = platform.port_read(port) | (1 << line);
    platform.port_write(port, value);
}

/// Acknowledges a serviced IRQ on the chip(s) that raised it.
///
/// Vectors at or past the secondary offset involve both chips; the primary
/// always gets the EOI because the cascade runs through it.
pub fn end_of_interrupt<P: Platform>(platform: &mut P, vector: u8) {
    if vector >= SECONDARY_OFFSET {
        platform.port_write(SECONDARY_COMMAND, CMD_END_OF_INTERRUPT);
    }
    platform.port_write(PRIMARY_COMMAND, CMD_END_OF_INTERRUPT);
}

fn mask_port(irq: u8) -> (u16, u8) {
    if irq < 8 {
        (PRIMARY_DATA, irq)
    } else {
        (SECONDARY_DATA, irq - 8)
    }
}

#[cfg(test)]
mod tests {
    use super::{end_of_interrupt, init, irq_disable, irq_enable};
    use crate::platform::test_support::FakePlatform;

    #[test]
    fn init_runs_the_full_remap_sequence() {
        let mut platform = FakePlatform::new();
        init(&mut platform);

        assert_eq!(platform.port_reads, vec![0x21, 0xA1]);
        assert_eq!(
            platform.port_writes,
            vec![
                (0x20, 0x11),
                (0xA0, 0x11),
                (0x21, 0x20),
                (0xA1, 0x28),
                (0x21, 0x04),
                (0xA1, 0x02),
                (0x21, 0x01),
                (0xA1, 0x01),
                (0x21, 0xFC),
                (0xA1, 0xFF),
            ]
        );
    }

    #[test]
    fn enable_clears_one_primary_mask_bit() {
        let mut platform = FakePlatform::new();
        init(&mut platform);
        irq_enable(&mut platform, 3);
        assert_eq!(platform.port_state[&0x21], 0xF4);
    }

    #[test]
    fn disable_restores_the_mask_bit() {
        let mut platform = FakePlatform::new();
        init(&mut platform);
        irq_enable(&mut platform, 3);
        irq_disable(&mut platform, 3);
        assert_eq!(platform.port_state[&0x21], 0xFC);
    }

    #[test]
    fn secondary_lines_use_the_secondary_mask_port() {
        let mut platform = FakePlatform::new();
        init(&mut platform);
        irq_enable(&mut platform, 8);
        assert_eq!(platform.port_state[&0xA1], 0xFE);
        assert_eq!(platform.port_state[&0x21], 0xFC);
    }

    #[test]
    fn primary_irq_eoi_goes_to_the_primary_only() {
        let mut platform = FakePlatform::new();
        end_of_interrupt(&mut platform, 33);
        assert_eq!(platform.port_writes, vec![(0x20, 0x20)]);
    }

    #[test]
    fn secondary_irq_eoi_goes_to_both_chips() {
        let mut platform = FakePlatform::new();
        end_of_interrupt(&mut platform, 40);
        assert_eq!(platform.port_writes, vec![(0xA0, 0x20), (0x20, 0x20)]);
    }
}
