//! # System Call ABI
//!
//! The register-level contract between ring-3 programs and the kernel's
//! `int 0x80` trap handler. Both sides of the boundary (the userland
//! wrappers in `stdlib` and the kernel's dispatcher) compile against this
//! crate, so the numbers and the trap-frame layout can never drift apart.
//!
//! ## Register convention
//!
//! Register | Role
//! ---------|--------------------------------------
//! `eax`    | syscall number in, return value out
//! `ebx`    | first argument (stream id)
//! `ecx`    | second argument (buffer pointer)
//! `edx`    | third argument (length)

#![no_std]

mod frame;

pub use frame::{TRAP_FRAME_SIZE, TRAP_FRAME_VERSION, TrapFrame};

/// Software interrupt vector used for system calls.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// System call numbers.
///
/// Gaps are intentional; the values follow the classic Unix numbering the
/// original user programs were written against.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Sysno {
    /// Terminate the calling program; control returns to the kernel idle path.
    Exit = 0x01,
    /// Read buffered keyboard input into a user buffer.
    Read = 0x03,
    /// Append bytes from a user buffer to a kernel stream.
    Write = 0x04,
    /// Report the fixed process id.
    GetPid = 0x14,
}

impl Sysno {
    /// Decode a raw `eax` value. Unknown numbers stay raw so the kernel can
    /// log them.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x01 => Some(Self::Exit),
            0x03 => Some(Self::Read),
            0x04 => Some(Self::Write),
            0x14 => Some(Self::GetPid),
            _ => None,
        }
    }
}

/// Stream identifiers understood by `read`/`write`.
pub mod stream {
    /// Keyboard input buffer.
    pub const STDIN: u32 = 0;
    /// Regular console output.
    pub const STDOUT: u32 = 1;
    /// Error output; rendered highlighted.
    pub const STDERR: u32 = 2;
}

/// Base address user program images are loaded at (and jump to).
pub const USER_CODE_BASE: u32 = 0x40_0000;

/// Initial user stack pointer.
pub const USER_STACK_TOP: u32 = 0x80_0000;

/// First address past the user window.
pub const USER_WINDOW_END: u32 = 0x90_0000;

/// Whether a buffer pointer passed by ring-3 code starts inside the user
/// address window. Only the start address is checked.
#[must_use]
pub const fn user_window_contains(ptr: u32) -> bool {
    ptr >= USER_CODE_BASE && ptr < USER_WINDOW_END
}
