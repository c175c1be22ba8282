//! # Interrupt Descriptor Table manager
//!
//! Builds the 256-vector table out of [`gate::GateDescriptor`] entries and
//! loads it into the CPU. Setup registers:
//!
//! - the architecturally defined exception vectors (0 through 8, 10 through
//!   14, and 16) as ring-0 interrupt gates,
//! - vector 32 (PIT timer) and 33 (keyboard) for the remapped PIC,
//! - vector 0x80 as a trap gate callable from ring 3, the system-call door.
//!
//! All gates target the ring-0 code segment. Setup also fills the TSS and
//! re-registers its GDT descriptor, so one call brings the whole trap path
//! up.
//!
//! Verification is cheaper than the GDT's checksum: it confirms the table
//! pointer still matches the table and that two sentinel gates setup wrote
//! (division error and general protection fault) are still present.

pub mod gate;

use crate::gdt::{selectors, Gdt};
use crate::platform::{Platform, TablePointer};
use crate::tss::Tss;
use gate::GateDescriptor;
use thiserror::Error;

/// Number of vectors in the table.
pub const ENTRY_COUNT: usize = 256;

/// Vector the remapped primary PIC raises for the PIT timer.
pub const TIMER_VECTOR: u8 = 32;
/// Vector the remapped primary PIC raises for the keyboard controller.
pub const KEYBOARD_VECTOR: u8 = 33;

pub use syscall_abi::SYSCALL_VECTOR;

/// Exception vectors the kernel installs handlers for.
const EXCEPTION_VECTORS: [u8; 15] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 16];

/// Sentinel vectors re-checked by [`Idt::verify_integrity`].
const DIVISION_ERROR: usize = 0;
const GENERAL_PROTECTION_FAULT: usize = 13;

/// Ways [`Idt::verify_integrity`] can fail.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum IntegrityError {
    /// The table was never set up and loaded.
    #[error("interrupt table was never loaded")]
    NotLoaded,
    /// The loaded table pointer no longer matches the table.
    #[error("interrupt table pointer is stale")]
    PointerMismatch,
    /// A sentinel gate lost its handler.
    #[error("vector {vector} gate is empty")]
    MissingGate { vector: u8 },
}

/// The gate table plus the pointer handed to the CPU.
pub struct Idt {
    gates: [GateDescriptor; ENTRY_COUNT],
    pointer: TablePointer,
    initialized: bool,
}

impl Idt {
    /// An empty, unloaded table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            gates: [GateDescriptor::new(); ENTRY_COUNT],
            pointer: TablePointer { limit: 0, base: 0 },
            initialized: false,
        }
    }

    /// Writes one gate. An out-of-range index is a silent no-op.
    pub fn set_entry(&mut self, index: usize, handler: u32, selector: u16, type_attr: u8) {
        if index >= ENTRY_COUNT {
            return;
        }
        self.gates[index] = GateDescriptor::from_parts(handler, selector, type_attr);
    }

    /// Builds the trap path: gates, TSS contents, TSS descriptor, and the
    /// privileged table load.
    ///
    /// Handler addresses come from the platform, which knows where its trap
    /// entry stubs live. The task register itself is loaded later, once boot
    /// has both tables live.
    pub fn setup<P: Platform>(&mut self, platform: &mut P, tss: &mut Tss, gdt: &mut Gdt) {
        self.pointer = self.table_pointer();
        self.gates = [GateDescriptor::new(); ENTRY_COUNT];

        let kernel_code = selectors::KERNEL_CODE.encode();
        for vector in EXCEPTION_VECTORS {
            self.set_entry(
                vector as usize,
                platform.trap_entry(vector),
                kernel_code,
                gate::INTERRUPT_GATE,
            );
        }
        self.set_entry(
            TIMER_VECTOR as usize,
            platform.trap_entry(TIMER_VECTOR),
            kernel_code,
            gate::INTERRUPT_GATE,
        );
        self.set_entry(
            KEYBOARD_VECTOR as usize,
            platform.trap_entry(KEYBOARD_VECTOR),
            kernel_code,
            gate::INTERRUPT_GATE,
        );
        self.set_entry(
            SYSCALL_VECTOR as usize,
            platform.trap_entry(SYSCALL_VECTOR),
            kernel_code,
            gate::TRAP_GATE | gate::RING3,
        );

        tss.setup();
        gdt.register_tss(tss);

        platform.load_idt(self.pointer);
        self.initialized = true;
    }

    /// Checks the table pointer and the sentinel gates setup installed.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: never loaded, a stale pointer, or
    /// an empty division-error or general-protection gate.
    pub fn verify_integrity(&self) -> Result<(), IntegrityError> {
        if !self.initialized {
            return Err(IntegrityError::NotLoaded);
        }
        if self.pointer != self.table_pointer() {
            return Err(IntegrityError::PointerMismatch);
        }
        for sentinel in [DIVISION_ERROR, GENERAL_PROTECTION_FAULT] {
            if self.gates[sentinel].handler() == 0 {
                return Err(IntegrityError::MissingGate {
                    vector: sentinel as u8,
                });
            }
        }
        Ok(())
    }

    /// The gate at `index`, if in range.
    #[must_use]
    pub fn gate(&self, index: usize) -> Option<GateDescriptor> {
        self.gates.get(index).copied()
    }

    fn table_pointer(&self) -> TablePointer {
        TablePointer {
            limit: (size_of::<[GateDescriptor; ENTRY_COUNT]>() - 1) as u16,
            base: core::ptr::from_ref(&self.gates).addr(),
        }
    }
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}
