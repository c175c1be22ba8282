//! # Protected-Mode Kernel
//!
//! A small 32-bit x86 kernel: it brings the CPU from the boot loader's
//! handoff to ring 3 and services the traps that come back.
//!
//! ## Boot path
//!
//! [`boot::run`] drives the whole sequence:
//!
//! 1. Build and load the GDT and IDT, then re-read both tables and check
//!    them against recorded checksums ([`gdt`], [`idt`]).
//! 2. Remap the 8259 cascade away from the exception range ([`pic`]).
//! 3. Point the TSS at the boot stack and load the task register ([`tss`]).
//! 4. Walk the Multiboot2 memory map and hand the total to the sector
//!    allocator ([`multiboot`]).
//! 5. Mount the embedded ext2 image, stage a program at the fixed user
//!    window and drop to ring 3 ([`usermode`]).
//!
//! ## Trap path
//!
//! Every interrupt funnels into [`interrupts::handle_trap`]: exceptions
//! are reported and halt the machine, hardware interrupts are acknowledged
//! and dispatched, and `int 0x80` lands in the [`syscall`] handler.
//!
//! ## Hardware seam
//!
//! Privileged instructions live behind the [`platform::Platform`] trait.
//! The freestanding build wires in the real `lgdt`/`lidt`/`iret` sequences
//! under `platform::x86`; everything above that trait runs as ordinary
//! host tests.

#![cfg_attr(all(target_arch = "x86", target_os = "none"), no_std)]
#![allow(unsafe_code)]

pub mod boot;
pub mod gdt;
pub mod idt;
pub mod interrupts;
pub mod multiboot;
pub mod pic;
pub mod platform;
pub mod process;
pub mod syscall;
pub mod tss;
pub mod usermode;
