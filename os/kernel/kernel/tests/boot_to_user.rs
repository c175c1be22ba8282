//! Full bring-up against the recording platform: boot from a packed image,
//! a program staged at the user window, syscalls through the dispatcher,
//! and the fatal-exception path back out.

use ext2_image::ImageBuilder;
use kernel::boot::{self, BootInfo, KernelState};
use kernel::interrupts::{TrapContext, TrapOutcome, handle_trap};
use kernel::platform::UserEntry;
use kernel::platform::test_support::FakePlatform;
use kernel_console::{ArrayTarget, Console, VGA_HEIGHT, VGA_WIDTH};
use syscall_abi::{TrapFrame, USER_CODE_BASE, USER_STACK_TOP};

const GRID: usize = VGA_WIDTH * VGA_HEIGHT;
type TestConsole = Console<ArrayTarget<GRID>>;

const IDLE_ENTRY: u32 = 0x11_2233;
const BOOT_STACK_TOP: u32 = 0x9_F000;

/// A multiboot2 information area advertising 64 MiB above the 1 MiB line.
fn info_area() -> Vec<u8> {
    let mut bytes = vec![0u8; 8];
    bytes.extend_from_slice(&6u32.to_le_bytes());
    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&24u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0x10_0000u64.to_le_bytes());
    bytes.extend_from_slice(&0x400_0000u64.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&8u32.to_le_bytes());
    let total = bytes.len() as u32;
    bytes[0..4].copy_from_slice(&total.to_le_bytes());
    bytes
}

fn console() -> TestConsole {
    Console::new(ArrayTarget::new(), VGA_WIDTH, VGA_HEIGHT)
}

fn row_text(console: &TestConsole, row: usize) -> String {
    console.target().cells()[row * VGA_WIDTH..(row + 1) * VGA_WIDTH]
        .iter()
        .map(|cell| cell.glyph as char)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Boots the machine with `payload` packed as `example.bin`.
fn booted(payload: &[u8]) -> (KernelState, FakePlatform) {
    let image = ImageBuilder::new()
        .file("example.bin", payload)
        .build()
        .unwrap();
    let info = info_area();
    let mut state = KernelState::new();
    let mut platform = FakePlatform::new();

    boot::run(
        &mut state,
        &mut platform,
        BootInfo {
            magic: kernel::multiboot::MULTIBOOT2_MAGIC,
            info: info.as_ptr() as usize,
            kernel_stack_top: BOOT_STACK_TOP,
        },
        &image,
        "example.bin",
    )
    .unwrap();

    (state, platform)
}

fn user_frame(number: u32) -> TrapFrame {
    TrapFrame {
        eax: number,
        int_no: 0x80,
        cs: 0x1B,
        ss: 0x23,
        useresp: USER_STACK_TOP,
        ..TrapFrame::default()
    }
}

#[test]
fn boot_stages_the_program_and_drops_to_ring_three() {
    let payload = b"\xb8\x01\x00\x00\x00\xcd\x80";
    let (state, platform) = booted(payload);

    assert!(state.gdt.verify_integrity().is_ok());
    assert!(state.idt.verify_integrity().is_ok());
    assert_eq!(platform.task_register, Some(0x28));
    assert!(platform.interrupts_enabled);

    // The whole file, byte for byte, at the fixed window base.
    assert_eq!(platform.memory[&USER_CODE_BASE], payload);
    assert_eq!(
        platform.user_entry,
        Some(UserEntry {
            eip: USER_CODE_BASE,
            esp: USER_STACK_TOP,
            cs: 0x1B,
            ss: 0x23,
            eflags: 0x202,
        })
    );
}

#[test]
fn staged_program_can_write_to_stdout() {
    let (_state, mut platform) = booted(b"hello");
    let mut console = console();
    let mut frame = user_frame(0x04);
    frame.ebx = 1;
    frame.ecx = USER_CODE_BASE;
    frame.edx = 5;

    let outcome = handle_trap(
        &mut frame,
        &mut TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: IDLE_ENTRY,
            kernel_stack_top: BOOT_STACK_TOP,
        },
    );

    assert_eq!(outcome, TrapOutcome::Resume);
    assert_eq!(frame.eax, 5);
    assert_eq!(row_text(&console, 0), "hello");
}

#[test]
fn exit_lands_the_frame_on_the_idle_path() {
    let (_state, mut platform) = booted(b"\xcd\x80");
    let mut console = console();
    let mut frame = user_frame(0x01);
    frame.ebx = 0;

    let outcome = handle_trap(
        &mut frame,
        &mut TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: IDLE_ENTRY,
            kernel_stack_top: BOOT_STACK_TOP,
        },
    );

    assert_eq!(outcome, TrapOutcome::Resume);
    assert_eq!(row_text(&console, 0), "Exited with code 0");
    assert_eq!(frame.cs, 0x08);
    assert_eq!(frame.ss, 0x10);
    assert_eq!(frame.eip, IDLE_ENTRY);
    assert_eq!(frame.useresp, BOOT_STACK_TOP);
}

#[test]
fn ring_three_division_error_reports_and_halts() {
    let (_state, mut platform) = booted(b"\x31\xc9\xf7\xf1");
    let mut console = console();
    let mut frame = TrapFrame {
        int_no: 0,
        cs: 0x1B,
        eip: USER_CODE_BASE + 2,
        ..TrapFrame::default()
    };

    let outcome = handle_trap(
        &mut frame,
        &mut TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: IDLE_ENTRY,
            kernel_stack_top: BOOT_STACK_TOP,
        },
    );

    assert_eq!(outcome, TrapOutcome::Halt);
    assert_eq!(row_text(&console, 0), "EXCEPTION: Division By Zero (0x0)");
    assert_eq!(row_text(&console, 3), "Exception occurred in user mode!");
}
