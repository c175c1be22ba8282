//! # Userland support library
//!
//! The thin layer a ring-3 program links against: `int 0x80` wrappers for
//! the kernel's system calls ([`syscall`]) and `print!`/`println!` macros
//! that format onto stdout through the `write` call ([`stdlib`]).
//!
//! The call numbers and register convention come from the shared
//! `syscall-abi` crate, the same one the kernel's dispatcher compiles
//! against.

#![no_std]
#![cfg_attr(not(feature = "syscall"), forbid(unsafe_code))]
#![cfg_attr(feature = "syscall", allow(unsafe_code))]

#[cfg(feature = "stdlib")]
#[macro_use]
pub mod stdlib;

#[cfg(feature = "syscall")]
pub mod syscall;

#[cfg(feature = "stdlib")]
pub use stdlib::*;

#[cfg(all(feature = "stdlib", target_arch = "x86", target_os = "none"))]
mod panic {
    /// A panicking user program has nothing better to do than leave; the
    /// exit code distinguishes it from a clean return.
    #[panic_handler]
    fn panic(_: &core::panic::PanicInfo) -> ! {
        crate::syscall::sys_exit(101)
    }
}
