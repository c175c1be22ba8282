//! # System calls
//!
//! The `int 0x80` entry point. [`handle`] decodes the number from `eax`,
//! dispatches, and leaves the result in `eax`; arguments travel in `ebx`,
//! `ecx` and `edx` as laid out in [`syscall_abi`].
//!
//! Ring-3 buffer pointers are trusted only after the user-window check; a
//! pointer outside `[0x400000, 0x900000)` produces a diagnostic and a −1
//! result without any memory access. Calls arriving from ring 0 are logged
//! and ignored, with the return register left untouched.

use crate::gdt::selectors::{KERNEL_CODE, KERNEL_DATA};
use crate::interrupts::TrapContext;
use crate::platform::Platform;
use core::fmt::Write as _;
use core::slice;
use kernel_console::TextTarget;
use syscall_abi::{Sysno, TrapFrame, user_window_contains};

/// Decodes and executes one system call, mutating `frame` in place.
pub fn handle<T: TextTarget, P: Platform>(frame: &mut TrapFrame, ctx: &mut TrapContext<'_, T, P>) {
    if !frame.from_user() {
        let _ = writeln!(
            ctx.console.stderr(),
            "System call from kernel mode - ignoring"
        );
        return;
    }

    let number = frame.eax;
    match Sysno::from_raw(number) {
        Some(Sysno::Exit) => exit(frame, ctx),
        Some(Sysno::Read) => read(frame, ctx),
        Some(Sysno::Write) => write(frame, ctx),
        Some(Sysno::GetPid) => frame.eax = 1,
        None => {
            let _ = writeln!(ctx.console.stderr(), "Unknown system call: {number}");
            frame.eax = u32::MAX;
        }
    }
}

/// `write(stream, buffer, length)`: appends `length` bytes at `buffer` to
/// the stream named in `ebx`.
///
/// The reported count is the requested length, even when the stream id is
/// unknown and the bytes go nowhere.
fn write<T: TextTarget, P: Platform>(frame: &mut TrapFrame, ctx: &mut TrapContext<'_, T, P>) {
    let ptr = frame.ecx;
    if !user_window_contains(ptr) {
        let _ = writeln!(ctx.console.stderr(), "Invalid string pointer: 0x{ptr:x}");
        frame.eax = u32::MAX;
        return;
    }

    let len = frame.edx as usize;
    let data = ctx.platform.physical_memory(ptr, len);
    // SAFETY: the window check passed, so per the platform contract `len`
    // bytes at `ptr` are readable RAM.
    let bytes = unsafe { slice::from_raw_parts(data, len) };
    let _ = ctx.console.write_stream(frame.ebx, bytes);
    frame.eax = frame.edx;
}

/// `read(_, buffer, length)`: drains buffered keyboard input into `buffer`
/// and reports the count copied.
///
/// The stream id in `ebx` is not consulted; input only ever comes from
/// stdin.
#[allow(clippy::cast_possible_truncation)]
fn read<T: TextTarget, P: Platform>(frame: &mut TrapFrame, ctx: &mut TrapContext<'_, T, P>) {
    let ptr = frame.ecx;
    if !user_window_contains(ptr) {
        let _ = writeln!(ctx.console.stderr(), "Invalid buffer pointer: 0x{ptr:x}");
        frame.eax = u32::MAX;
        return;
    }

    let len = frame.edx as usize;
    let data = ctx.platform.physical_memory(ptr, len);
    // SAFETY: the window check passed, so per the platform contract `len`
    // bytes at `ptr` are writable RAM.
    let buf = unsafe { slice::from_raw_parts_mut(data, len) };
    frame.eax = ctx.console.read_input(buf) as u32;
}

/// `exit(code)`: logs the code and redirects the pending `iretd` onto the
/// kernel idle path.
///
/// The frame tail is rewritten in place: kernel code and data selectors,
/// the idle entry as the return address, the boot kernel stack as the
/// stack to land on. The finished program is never resumed.
fn exit<T: TextTarget, P>(frame: &mut TrapFrame, ctx: &mut TrapContext<'_, T, P>) {
    let _ = writeln!(
        ctx.console.stdout(),
        "Exited with code {}",
        frame.ebx.cast_signed()
    );

    let code = u32::from(KERNEL_CODE.encode());
    let data = u32::from(KERNEL_DATA.encode());
    frame.eax = 0;
    frame.cs = code;
    frame.ss = data;
    frame.eip = ctx.idle_entry;
    frame.useresp = ctx.kernel_stack_top;
    frame.ds = data;
    frame.es = data;
    frame.fs = data;
    frame.gs = data;
}

#[cfg(test)]
mod tests {
    use super::handle;
    use crate::interrupts::TrapContext;
    use crate::platform::test_support::FakePlatform;
    use kernel_console::{ArrayTarget, Console, VGA_HEIGHT, VGA_WIDTH};
    use syscall_abi::{TrapFrame, USER_CODE_BASE};

    const GRID: usize = VGA_WIDTH * VGA_HEIGHT;
    type TestConsole = Console<ArrayTarget<GRID>>;

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

    fn user_frame(number: u32) -> TrapFrame {
        TrapFrame {
            eax: number,
            int_no: 0x80,
            cs: 0x1B,
            ..TrapFrame::default()
        }
    }

    #[test]
    fn kernel_mode_calls_are_ignored() {
        let mut console = console();
        let mut platform = FakePlatform::new();
        let mut frame = user_frame(0x04);
        frame.cs = 0x08;
        frame.ecx = USER_CODE_BASE;
        frame.edx = 5;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, 0x04);
        assert_eq!(
            row_text(&console, 0),
            "System call from kernel mode - ignoring"
        );
        assert!(platform.memory.is_empty());
    }

    #[test]
    fn write_appends_and_reports_the_requested_length() {
        let mut console = console();
        let mut platform = FakePlatform::new();
        platform.seed_memory(USER_CODE_BASE, b"hello");
        let mut frame = user_frame(0x04);
        frame.ebx = 1;
        frame.ecx = USER_CODE_BASE;
        frame.edx = 5;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, 5);
        assert_eq!(row_text(&console, 0), "hello");
    }

    #[test]
    fn write_to_stderr_renders_highlighted() {
        let mut console = console();
        let mut platform = FakePlatform::new();
        platform.seed_memory(USER_CODE_BASE, b"err");
        let mut frame = user_frame(0x04);
        frame.ebx = 2;
        frame.ecx = USER_CODE_BASE;
        frame.edx = 3;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, 3);
        assert_eq!(row_text(&console, 0), "err");
        // Red on black, the stderr rendering attribute.
        assert_eq!(console.target().cells()[0].color, 0x04);
    }

    #[test]
    fn write_to_an_unknown_stream_still_reports_the_length() {
        let mut console = console();
        let mut platform = FakePlatform::new();
        platform.seed_memory(USER_CODE_BASE, b"gone");
        let mut frame = user_frame(0x04);
        frame.ebx = 9;
        frame.ecx = USER_CODE_BASE;
        frame.edx = 4;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, 4);
        assert_eq!(row_text(&console, 0), "");
    }

    #[test]
    fn write_with_an_out_of_window_pointer_is_refused() {
        let mut console = console();
        let mut platform = FakePlatform::new();
        let mut frame = user_frame(0x04);
        frame.ebx = 1;
        frame.ecx = 0x10_0000;
        frame.edx = 5;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, u32::MAX);
        assert_eq!(row_text(&console, 0), "Invalid string pointer: 0x100000");
        assert!(platform.memory.is_empty());
    }

    #[test]
    fn write_window_check_rejects_the_end_address() {
        let mut console = console();
        let mut platform = FakePlatform::new();
        let mut frame = user_frame(0x04);
        frame.ebx = 1;
        frame.ecx = 0x90_0000;
        frame.edx = 1;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, u32::MAX);
        assert_eq!(row_text(&console, 0), "Invalid string pointer: 0x900000");
    }

    #[test]
    fn read_copies_buffered_input_and_reports_the_count() {
        let mut console = console();
        console.push_input(b'h');
        console.push_input(b'i');
        let mut platform = FakePlatform::new();
        let mut frame = user_frame(0x03);
        frame.ecx = 0x50_0000;
        frame.edx = 8;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, 2);
        assert_eq!(&platform.memory[&0x50_0000][..2], b"hi");

        let mut rest = [0u8; 4];
        assert_eq!(console.read_input(&mut rest), 0);
    }

    #[test]
    fn read_ignores_the_stream_id_argument() {
        let mut console = console();
        console.push_input(b'x');
        let mut platform = FakePlatform::new();
        let mut frame = user_frame(0x03);
        frame.ebx = 5;
        frame.ecx = USER_CODE_BASE;
        frame.edx = 1;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, 1);
        assert_eq!(platform.memory[&USER_CODE_BASE][0], b'x');
    }

    #[test]
    fn read_with_an_out_of_window_pointer_is_refused() {
        let mut console = console();
        console.push_input(b'x');
        let mut platform = FakePlatform::new();
        let mut frame = user_frame(0x03);
        frame.ecx = 0x3F_FFFF;
        frame.edx = 4;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, u32::MAX);
        assert_eq!(row_text(&console, 0), "Invalid buffer pointer: 0x3fffff");

        let mut buf = [0u8; 4];
        assert_eq!(console.read_input(&mut buf), 1);
    }

    #[test]
    fn exit_rewrites_the_frame_for_the_idle_path() {
        let mut console = console();
        let mut platform = FakePlatform::new();
        let mut frame = user_frame(0x01);
        frame.ebx = 42;
        frame.ss = 0x23;
        frame.useresp = 0x7F_FFF0;
        frame.ds = 0x23;
        frame.es = 0x23;
        frame.fs = 0x23;
        frame.gs = 0x23;
        frame.eflags = 0x202;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0x12_3456,
            kernel_stack_top: 0x9000,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(row_text(&console, 0), "Exited with code 42");
        assert_eq!(frame.eax, 0);
        assert_eq!(frame.cs, 0x08);
        assert_eq!(frame.ss, 0x10);
        assert_eq!(frame.eip, 0x12_3456);
        assert_eq!(frame.useresp, 0x9000);
        assert_eq!(frame.ds, 0x10);
        assert_eq!(frame.es, 0x10);
        assert_eq!(frame.fs, 0x10);
        assert_eq!(frame.gs, 0x10);
        assert_eq!(frame.eflags, 0x202);
    }

    #[test]
    fn exit_logs_the_code_signed() {
        let mut console = console();
        let mut platform = FakePlatform::new();
        let mut frame = user_frame(0x01);
        frame.ebx = u32::MAX;

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(row_text(&console, 0), "Exited with code -1");
    }

    #[test]
    fn getpid_always_reports_one() {
        let mut console = console();
        let mut platform = FakePlatform::new();
        let mut frame = user_frame(0x14);

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, 1);
        assert_eq!(row_text(&console, 0), "");
    }

    #[test]
    fn unknown_numbers_are_logged_and_fail() {
        let mut console = console();
        let mut platform = FakePlatform::new();
        let mut frame = user_frame(0x99);

        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: 0,
            kernel_stack_top: 0,
        };
        handle(&mut frame, &mut ctx);

        assert_eq!(frame.eax, u32::MAX);
        assert_eq!(row_text(&console, 0), "Unknown system call: 153");
    }
}
