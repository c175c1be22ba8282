//! # Trap Frame Layout
//!
//! The exact stack image the low-level trap stubs build before calling into
//! Rust, bottom (lowest address) first:
//!
//! Offset | Field      | Pushed by
//! -------|------------|------------------------------------------
//! 0      | `gs`       | stub (`push gs`, zero-extended)
//! 4      | `fs`       | stub
//! 8      | `es`       | stub
//! 12     | `ds`       | stub
//! 16     | `edi`      | stub (`pushad`)
//! 20     | `esi`      | stub
//! 24     | `ebp`      | stub
//! 28     | `esp`      | stub (value before `pushad`; ignored on pop)
//! 32     | `ebx`      | stub
//! 36     | `edx`      | stub
//! 40     | `ecx`      | stub
//! 44     | `eax`      | stub
//! 48     | `int_no`   | stub (vector number)
//! 52     | `err_code` | CPU for faulting vectors, else a stub-pushed 0
//! 56     | `eip`      | CPU
//! 60     | `cs`       | CPU
//! 64     | `eflags`   | CPU
//! 68     | `useresp`  | CPU, only on a ring change
//! 72     | `ss`       | CPU, only on a ring change
//!
//! Every offset is load-bearing: the stubs address fields by these numbers
//! and the handler mutates `eax`, `eip`, `cs` and friends in place before
//! `iretd` consumes the tail of the frame. [`TRAP_FRAME_VERSION`] must be
//! bumped on any layout change so the two sides cannot silently disagree.

use core::mem::{offset_of, size_of};

/// Layout revision of [`TrapFrame`].
pub const TRAP_FRAME_VERSION: u16 = 1;

/// Size of the frame in bytes.
pub const TRAP_FRAME_SIZE: usize = size_of::<TrapFrame>();

/// Saved machine state at the moment a trap entered the kernel.
///
/// The `useresp`/`ss` tail is only meaningful when the trap arrived from
/// ring 3; on a same-ring trap the CPU pushes neither and those fields
/// alias whatever sat above the frame.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TrapFrame {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub int_no: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub useresp: u32,
    pub ss: u32,
}

impl TrapFrame {
    /// Privilege ring the trap arrived from, taken from the saved code
    /// selector's RPL bits.
    #[must_use]
    pub const fn ring(&self) -> u32 {
        self.cs & 0b11
    }

    /// Whether the trap interrupted ring-3 code.
    #[must_use]
    pub const fn from_user(&self) -> bool {
        self.ring() == 3
    }
}

// The stubs hard-code these offsets; any drift is a compile error here
// rather than a corrupted register file at runtime.
const _: () = {
    assert!(size_of::<TrapFrame>() == 19 * 4);
    assert!(offset_of!(TrapFrame, gs) == 0);
    assert!(offset_of!(TrapFrame, fs) == 4);
    assert!(offset_of!(TrapFrame, es) == 8);
    assert!(offset_of!(TrapFrame, ds) == 12);
    assert!(offset_of!(TrapFrame, edi) == 16);
    assert!(offset_of!(TrapFrame, esi) == 20);
    assert!(offset_of!(TrapFrame, ebp) == 24);
    assert!(offset_of!(TrapFrame, esp) == 28);
    assert!(offset_of!(TrapFrame, ebx) == 32);
    assert!(offset_of!(TrapFrame, edx) == 36);
    assert!(offset_of!(TrapFrame, ecx) == 40);
    assert!(offset_of!(TrapFrame, eax) == 44);
    assert!(offset_of!(TrapFrame, int_no) == 48);
    assert!(offset_of!(TrapFrame, err_code) == 52);
    assert!(offset_of!(TrapFrame, eip) == 56);
    assert!(offset_of!(TrapFrame, cs) == 60);
    assert!(offset_of!(TrapFrame, eflags) == 64);
    assert!(offset_of!(TrapFrame, useresp) == 68);
    assert!(offset_of!(TrapFrame, ss) == 72);
};
