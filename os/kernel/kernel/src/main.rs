//! # Kernel image entry
//!
//! The boot stub between the multiboot2 loader and the kernel proper:
//! it plants the header the loader scans for, points `esp` at the boot
//! stack and forwards the handoff registers to
//! [`kernel_entry`](kernel::platform::x86::kernel_entry).

#![cfg_attr(all(target_arch = "x86", target_os = "none"), no_std)]
#![cfg_attr(all(target_arch = "x86", target_os = "none"), no_main)]
#![allow(unsafe_code)]

/// Multiboot2 header: magic, architecture (i386 protected mode), header
/// length and checksum, followed by the end tag. The loader scans the
/// first 32 KiB of the image for this; the linker script pins it to the
/// front.
#[cfg(all(target_arch = "x86", target_os = "none"))]
#[used]
#[unsafe(link_section = ".multiboot2")]
static MULTIBOOT2_HEADER: [u32; 6] = [
    0xE852_50D6,                          // magic
    0,                                    // architecture: i386
    24,                                   // header length
    0u32.wrapping_sub(0xE852_50D6 + 24),  // checksum
    0,                                    // end tag: type 0, flags 0
    8,                                    // end tag: size
];

/// Boot stack size.
#[cfg(all(target_arch = "x86", target_os = "none"))]
const BOOT_STACK_SIZE: usize = 16 * 1024;

/// 16-byte aligned stack
#[cfg(all(target_arch = "x86", target_os = "none"))]
#[repr(align(16))]
struct Aligned<const N: usize>([u8; N]);

#[cfg(all(target_arch = "x86", target_os = "none"))]
#[unsafe(link_section = ".bss.boot")]
#[unsafe(no_mangle)]
static mut BOOT_STACK: Aligned<BOOT_STACK_SIZE> = Aligned([0; BOOT_STACK_SIZE]);

/// The loader jumps here in protected mode with paging off, the magic in
/// `eax` and the information area in `ebx`.
///
/// # Naked function & Stack
/// There is no stack yet, so this must be a naked function: it builds
/// `esp` itself, then passes magic, info area and the fresh stack top to
/// [`kernel_entry`](kernel::platform::x86::kernel_entry) as ordinary
/// arguments. The entry never returns; the trailing halt loop only
/// catches a runaway.
#[cfg(all(target_arch = "x86", target_os = "none"))]
#[unsafe(no_mangle)]
#[unsafe(naked)]
extern "C" fn _start() -> ! {
    core::arch::naked_asm!(
        "cli",
        "lea esp, [{stack} + {stack_size}]",
        "xor ebp, ebp",
        "mov ecx, esp",
        "push ecx",    // stack top
        "push ebx",    // multiboot2 information area
        "push eax",    // multiboot2 magic
        "call {entry}",
        "2:",
        "hlt",
        "jmp 2b",
        stack = sym BOOT_STACK,
        stack_size = const BOOT_STACK_SIZE,
        entry = sym kernel::platform::x86::kernel_entry,
    )
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
fn main() {
    println!("kernel: build for a bare-metal i686 target to produce a bootable image");
}
