//! # Trap dispatcher
//!
//! Every trap funnels through two entry points: [`handle_trap`] for CPU
//! exceptions, the syscall vector and anything unknown, and [`handle_irq`]
//! for the remapped hardware interrupts. One trap moves through
//! classify → report/dispatch → resume-or-halt; nothing is deferred.
//!
//! Policy: exception vectors below 32 are fatal and park the machine, with
//! breakpoint (vector 3) as the one survivable exception. The syscall
//! vector and hardware interrupts always resume.
//!
//! The dispatcher owns no state. Everything it touches arrives in a
//! [`TrapContext`]: the console for diagnostics and stream data, the
//! platform for port I/O, and the two addresses the `exit` syscall rewrites
//! a frame with.

pub mod keyboard;

use crate::idt::{KEYBOARD_VECTOR, TIMER_VECTOR};
use crate::pic;
use crate::platform::Platform;
use crate::syscall;
use core::fmt::Write as _;
use kernel_console::{Console, TextTarget};
use syscall_abi::{SYSCALL_VECTOR, TrapFrame};

/// Vector numbers below this have symbolic names.
const NAMED_EXCEPTIONS: u32 = 17;

/// Breakpoint is reported but never fatal.
const BREAKPOINT: u32 = 3;

/// First vector of the remapped hardware interrupt range.
const IRQ_BASE: u32 = 32;

/// Symbolic names of the architecturally defined exceptions handled here.
const EXCEPTION_NAMES: [&str; NAMED_EXCEPTIONS as usize] = [
    "Division By Zero",
    "Debug",
    "Non Maskable Interrupt",
    "Breakpoint",
    "Into Detected Overflow",
    "Out of Bounds",
    "Invalid Opcode",
    "No Coprocessor",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Bad TSS",
    "Segment Not Present",
    "Stack Fault",
    "General Protection Fault",
    "Page Fault",
    "Unknown Interrupt",
    "Coprocessor Fault",
];

/// What the low-level trap glue does after the handler returns.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TrapOutcome {
    /// Return to the interrupted context.
    Resume,
    /// The trap is fatal; the caller parks the CPU.
    Halt,
}

/// Everything a trap handler may touch, threaded in per trap.
pub struct TrapContext<'a, T, P> {
    /// Diagnostics sink and stream storage.
    pub console: &'a mut Console<T>,
    /// Port I/O and the other privileged operations.
    pub platform: &'a mut P,
    /// Kernel code address the `exit` syscall resumes at.
    pub idle_entry: u32,
    /// Boot kernel stack top, restored as the stack of the idle path.
    pub kernel_stack_top: u32,
}

/// Handles a software-side trap: exception, syscall, or unknown vector.
pub fn handle_trap<T: TextTarget, P: Platform>(
    frame: &mut TrapFrame,
    ctx: &mut TrapContext<'_, T, P>,
) -> TrapOutcome {
    let vector = frame.int_no;

    if vector < NAMED_EXCEPTIONS {
        report_exception(frame, ctx.console);
    } else if vector == u32::from(SYSCALL_VECTOR) {
        syscall::handle(frame, ctx);
    } else {
        let _ = writeln!(ctx.console.stderr(), "Unknown interrupt: 0x{vector:x}");
    }

    if vector < IRQ_BASE && vector != BREAKPOINT {
        TrapOutcome::Halt
    } else {
        TrapOutcome::Resume
    }
}

/// Handles a hardware interrupt and acknowledges it at the controller.
///
/// The timer does no work yet. The keyboard drains one scancode from the
/// data port and buffers its ASCII translation on stdin; release codes and
/// unmapped keys produce nothing. Unexpected lines are logged.
pub fn handle_irq<T: TextTarget, P: Platform>(frame: &TrapFrame, ctx: &mut TrapContext<'_, T, P>) {
    let vector = frame.int_no;

    if vector == u32::from(TIMER_VECTOR) {
        // PIT tick; nothing consumes it yet.
    } else if vector == u32::from(KEYBOARD_VECTOR) {
        let scancode = ctx.platform.port_read(keyboard::DATA_PORT);
        if let Some(byte) = keyboard::ascii_for(scancode) {
            ctx.console.push_input(byte);
        }
    } else {
        let _ = writeln!(
            ctx.console.stdout(),
            "Hardware interrupt: IRQ{} (INT 0x{:x})",
            vector - IRQ_BASE,
            vector
        );
    }

    pic::end_of_interrupt(ctx.platform, vector as u8);
}

fn report_exception<T: TextTarget>(frame: &TrapFrame, console: &mut Console<T>) {
    let name = EXCEPTION_NAMES[frame.int_no as usize];
    let _ = writeln!(console.stderr(), "EXCEPTION: {} (0x{:x})", name, frame.int_no);
    let _ = writeln!(console.stderr(), "Error Code: 0x{:x}", frame.err_code);
    let _ = writeln!(console.stderr(), "EIP: 0x{:x}, CS: 0x{:x}", frame.eip, frame.cs);
    if frame.from_user() {
        let _ = writeln!(console.stderr(), "Exception occurred in user mode!");
    }
}
