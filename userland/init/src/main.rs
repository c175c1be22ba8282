//! The bundled ring-3 program.
//!
//! Built for a bare i686 target, converted to a flat binary with
//! `objcopy -O binary` and packed into the boot image by `tools/mkfs`.
//! The kernel stages the raw bytes at `0x400000` and jumps to the first
//! one, which the linker script guarantees is `_start`.

#![cfg_attr(all(target_arch = "x86", target_os = "none"), no_std)]
#![cfg_attr(all(target_arch = "x86", target_os = "none"), no_main)]

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod program {
    use stdlib::{print, println, syscall};

    #[unsafe(no_mangle)]
    #[unsafe(link_section = ".text.start")]
    pub extern "C" fn _start() -> ! {
        println!("Init process started successfully!");

        let pid = syscall::sys_getpid();
        println!("Running as pid {pid}.");

        print!("> ");
        let mut line = [0u8; 64];
        let got = syscall::sys_read(&mut line);
        if got > 0 {
            let echoed = &line[..got as usize];
            syscall::sys_write(syscall::stream::STDOUT, echoed);
            println!("");
        }

        syscall::sys_exit(0)
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
fn main() {
    println!("init: build for a bare-metal i686 target and pack with tools/mkfs");
}
