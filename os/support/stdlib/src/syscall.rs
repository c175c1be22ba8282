//! `int 0x80` wrappers.
//!
//! The kernel expects the call number in `eax` and the arguments in `ebx`,
//! `ecx` and `edx`; the return value comes back in `eax`. `ebx` cannot be
//! named as an inline-asm operand on x86, so the first argument travels in
//! `esi` and is swapped into place around the interrupt.

use syscall_abi::Sysno;
pub use syscall_abi::stream;

#[inline(always)]
#[allow(clippy::inline_always)]
fn syscall3(number: u32, arg1: u32, arg2: u32, arg3: u32) -> i32 {
    let ret: u32;
    unsafe {
        core::arch::asm!(
            "xchg esi, ebx",
            "int 0x80",
            "xchg esi, ebx",
            inlateout("eax") number => ret,
            in("esi") arg1,
            in("ecx") arg2,
            in("edx") arg3,
            options(nostack)
        );
    }
    ret as i32
}

/// Terminates the calling program. The kernel redirects execution to its
/// idle path; the instruction after the interrupt never runs.
pub fn sys_exit(code: i32) -> ! {
    syscall3(Sysno::Exit as u32, code as u32, 0, 0);
    loop {
        core::hint::spin_loop();
    }
}

/// Reads buffered keyboard input into `buf`, up to its length.
///
/// Returns the number of bytes copied, or -1 when the kernel rejects the
/// buffer pointer.
pub fn sys_read(buf: &mut [u8]) -> i32 {
    syscall3(
        Sysno::Read as u32,
        stream::STDIN,
        buf.as_mut_ptr() as u32,
        buf.len() as u32,
    )
}

/// Appends `buf` to the stream named by `stream_id`.
///
/// Returns the number of bytes written, or -1 when the kernel rejects the
/// buffer pointer.
pub fn sys_write(stream_id: u32, buf: &[u8]) -> i32 {
    syscall3(
        Sysno::Write as u32,
        stream_id,
        buf.as_ptr() as u32,
        buf.len() as u32,
    )
}

/// Reports the process id. The kernel runs a single process, so this is
/// always 1.
#[must_use]
pub fn sys_getpid() -> i32 {
    syscall3(Sysno::GetPid as u32, 0, 0, 0)
}
