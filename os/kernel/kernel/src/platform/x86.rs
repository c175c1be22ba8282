//! # Bare-metal platform
//!
//! The one real [`Platform`] implementation. Descriptor-table loads,
//! port I/O and the ring-3 drop become the actual privileged
//! instructions here, the console renders into VGA text memory, and the
//! naked trap stubs push the frame layout [`TrapFrame`] mirrors.
//!
//! The module also owns the long-lived kernel statics. [`kernel_entry`]
//! is called once by the boot stub with the multiboot2 handoff;
//! [`trap_dispatch`] is entered by `trap_common` for every interrupt
//! after that.

use crate::boot::{self, BootInfo, KernelState};
use crate::gdt::selectors;
use crate::interrupts::{self, TrapContext, TrapOutcome};
use crate::pic;
use crate::platform::{Platform, TablePointer, UserEntry};
use kernel_console::{Cell, Console, ConsoleLogger, TextTarget, VGA_HEIGHT, VGA_WIDTH};
use kernel_sync::{SpinLock, SyncOnceCell};
use log::{LevelFilter, info};
use syscall_abi::TrapFrame;

/// Base of the VGA text window.
const VGA_BASE: usize = 0xB8000;

/// First hardware interrupt vector after the PIC remap.
const IRQ_FIRST: u32 = 32;
/// Last hardware interrupt vector of the cascaded pair.
const IRQ_LAST: u32 = 47;

/// Raw kernel data selector, for the segment reloads in assembly.
const KERNEL_DATA_SELECTOR: u16 = selectors::KERNEL_DATA.encode();

/// The ext2 image the boot sequence mounts, produced by `tools/mkfs`.
static DISK_IMAGE: &[u8] = include_bytes!("../../disk.img");

/// Program the boot sequence stages into ring 3.
const INIT_PROGRAM: &str = "example.bin";

static CONSOLE: SyncOnceCell<SpinLock<Console<VgaTarget>>> = SyncOnceCell::new();
static LOGGER: ConsoleLogger<VgaTarget> = ConsoleLogger::new(&CONSOLE);
static STATE: SpinLock<KernelState> = SpinLock::new(KernelState::new());
static BOOT_STACK_TOP: SyncOnceCell<u32> = SyncOnceCell::new();

/// Cell grid backed by the VGA text window at `0xB8000`.
pub struct VgaTarget;

impl VgaTarget {
    fn cell(index: usize) -> *mut Cell {
        (VGA_BASE as *mut Cell).wrapping_add(index)
    }
}

impl TextTarget for VgaTarget {
    fn load(&self, index: usize) -> Cell {
        // SAFETY: the window is identity-mapped RAM and the console keeps
        // `index` inside the 80x25 grid it was constructed with.
        unsafe { core::ptr::read_volatile(Self::cell(index)) }
    }

    fn store(&mut self, index: usize, cell: Cell) {
        // SAFETY: as for `load`.
        unsafe { core::ptr::write_volatile(Self::cell(index), cell) }
    }
}

/// The machine itself. Zero-sized; every operation is an instruction.
pub struct X86Platform;

impl Platform for X86Platform {
    fn load_gdt(&mut self, pointer: TablePointer) {
        // SAFETY: `pointer` describes the fully built table the caller
        // keeps resident, and the selectors below match its fixed layout.
        unsafe {
            core::arch::asm!(
                "lgdt [{}]",
                in(reg) &raw const pointer,
                options(readonly, nostack, preserves_flags)
            );

            // Refresh the data segments against the new table.
            core::arch::asm!(
                "mov ds, {0:x}",
                "mov es, {0:x}",
                "mov fs, {0:x}",
                "mov gs, {0:x}",
                "mov ss, {0:x}",
                in(reg) u32::from(KERNEL_DATA_SELECTOR),
                options(nostack, preserves_flags)
            );

            // CS needs a far transfer; push the target and far-return to it.
            core::arch::asm!(
                "push {cs}",
                "lea {tmp}, [2f]",
                "push {tmp}",
                "retf",
                "2:",
                cs = in(reg) u32::from(selectors::KERNEL_CODE.encode()),
                tmp = out(reg) _,
                options(nostack)
            );
        }
    }

    fn load_idt(&mut self, pointer: TablePointer) {
        // SAFETY: `pointer` describes the caller's resident gate table.
        unsafe {
            core::arch::asm!(
                "lidt [{}]",
                in(reg) &raw const pointer,
                options(readonly, nostack, preserves_flags)
            );
        }
    }

    fn load_task_register(&mut self, selector: u16) {
        // SAFETY: the GDT loaded above holds a present TSS descriptor at
        // `selector`, and the TSS it points at stays resident.
        unsafe {
            core::arch::asm!(
                "ltr {0:x}",
                in(reg) selector,
                options(nostack, preserves_flags)
            );
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn trap_entry(&self, vector: u8) -> u32 {
        let stub: extern "C" fn() = match vector {
            0 => divide_error,
            1 => debug_trap,
            2 => non_maskable_interrupt,
            3 => breakpoint,
            4 => overflow,
            5 => bound_range,
            6 => invalid_opcode,
            7 => device_not_available,
            8 => double_fault,
            10 => invalid_tss,
            11 => segment_not_present,
            12 => stack_fault,
            13 => general_protection,
            14 => page_fault,
            16 => coprocessor_error,
            32 => timer,
            33 => keyboard,
            0x80 => system_call,
            _ => return 0,
        };
        stub as usize as u32
    }

    fn port_read(&mut self, port: u16) -> u8 {
        let value: u8;
        // SAFETY: ring 0; the kernel only reads ports of devices it drives.
        unsafe {
            core::arch::asm!(
                "in al, dx",
                in("dx") port,
                out("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
        value
    }

    fn port_write(&mut self, port: u16, value: u8) {
        // SAFETY: ring 0; the kernel only writes ports of devices it drives.
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") port,
                in("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
    }

    fn physical_memory(&mut self, addr: u32, _len: usize) -> *mut u8 {
        // No paging; physical addresses are the address space.
        addr as *mut u8
    }

    fn enable_interrupts(&mut self) {
        // SAFETY: the IDT and PIC are set up before the boot path calls this.
        unsafe {
            core::arch::asm!("sti", options(nostack, preserves_flags));
        }
    }

    fn enter_user_mode(&mut self, entry: UserEntry) {
        // SAFETY: the selectors come from the loaded GDT and the staged
        // program sits at `entry.eip`. The data segments take the stack
        // selector, then `iretd` consumes the five-slot frame.
        unsafe {
            core::arch::asm!(
                "mov ds, {ss:x}",
                "mov es, {ss:x}",
                "mov fs, {ss:x}",
                "mov gs, {ss:x}",
                "push {ss}",
                "push {esp}",
                "push {eflags}",
                "push {cs}",
                "push {eip}",
                "iretd",
                ss = in(reg) u32::from(entry.ss),
                esp = in(reg) entry.esp,
                eflags = in(reg) entry.eflags,
                cs = in(reg) u32::from(entry.cs),
                eip = in(reg) entry.eip,
                options(noreturn)
            )
        }
    }
}

/// Trap stubs. The CPU pushes an error code for some exceptions; for the
/// rest a dummy keeps the frame layout uniform. Each stub then records
/// its vector and joins `trap_common`.
macro_rules! trap_stub {
    ($name:ident, $vector:literal) => {
        #[unsafe(naked)]
        extern "C" fn $name() {
            core::arch::naked_asm!(
                "push 0",
                concat!("push ", stringify!($vector)),
                "jmp {common}",
                common = sym trap_common,
            );
        }
    };
    ($name:ident, $vector:literal, cpu_pushes_error_code) => {
        #[unsafe(naked)]
        extern "C" fn $name() {
            core::arch::naked_asm!(
                concat!("push ", stringify!($vector)),
                "jmp {common}",
                common = sym trap_common,
            );
        }
    };
}

trap_stub!(divide_error, 0);
trap_stub!(debug_trap, 1);
trap_stub!(non_maskable_interrupt, 2);
trap_stub!(breakpoint, 3);
trap_stub!(overflow, 4);
trap_stub!(bound_range, 5);
trap_stub!(invalid_opcode, 6);
trap_stub!(device_not_available, 7);
trap_stub!(double_fault, 8, cpu_pushes_error_code);
trap_stub!(invalid_tss, 10, cpu_pushes_error_code);
trap_stub!(segment_not_present, 11, cpu_pushes_error_code);
trap_stub!(stack_fault, 12, cpu_pushes_error_code);
trap_stub!(general_protection, 13, cpu_pushes_error_code);
trap_stub!(page_fault, 14, cpu_pushes_error_code);
trap_stub!(coprocessor_error, 16);
trap_stub!(timer, 32);
trap_stub!(keyboard, 33);

/// The syscall gate is a trap gate, so IF is still set on entry; clear it
/// before touching any shared state.
#[unsafe(naked)]
extern "C" fn system_call() {
    core::arch::naked_asm!(
        "cli",
        "push 0",
        "push 0x80",
        "jmp {common}",
        common = sym trap_common,
    );
}

/// Saves the interrupted context in [`TrapFrame`] order, switches to the
/// kernel data segments and hands the frame to [`trap_dispatch`]. The
/// unwind mirrors the save exactly; `add esp, 8` drops the vector and
/// error code the stub pushed.
#[unsafe(naked)]
extern "C" fn trap_common() {
    core::arch::naked_asm!(
        "pusha",
        "push ds",
        "push es",
        "push fs",
        "push gs",
        "mov ax, {kernel_data}",
        "mov ds, ax",
        "mov es, ax",
        "mov fs, ax",
        "mov gs, ax",
        "cld",
        "mov eax, esp",
        "push eax",
        "call {dispatch}",
        "add esp, 4",
        "pop gs",
        "pop fs",
        "pop es",
        "pop ds",
        "popa",
        "add esp, 8",
        "iretd",
        kernel_data = const KERNEL_DATA_SELECTOR,
        dispatch = sym trap_dispatch,
    );
}

/// Routes one trap through the dispatcher and parks the CPU on a fatal
/// outcome.
///
/// The console can be mid-line when an interrupt arrives, so the lock is
/// only tried. A trap that loses that race still acknowledges the PIC;
/// its diagnostics are dropped, exactly as the logger drops records under
/// contention.
#[allow(clippy::cast_possible_truncation)]
extern "C" fn trap_dispatch(frame: &mut TrapFrame) {
    let vector = frame.int_no;
    let mut platform = X86Platform;

    let Some(mut console) = CONSOLE.get().and_then(SpinLock::try_lock) else {
        if (IRQ_FIRST..=IRQ_LAST).contains(&vector) {
            pic::end_of_interrupt(&mut platform, vector as u8);
        }
        return;
    };

    let outcome = {
        let mut ctx = TrapContext {
            console: &mut console,
            platform: &mut platform,
            idle_entry: idle_entry as usize as u32,
            kernel_stack_top: BOOT_STACK_TOP.get().copied().unwrap_or(0),
        };
        if (IRQ_FIRST..=IRQ_LAST).contains(&vector) {
            interrupts::handle_irq(frame, &mut ctx);
            TrapOutcome::Resume
        } else {
            interrupts::handle_trap(frame, &mut ctx)
        }
    };
    drop(console);

    if outcome == TrapOutcome::Halt {
        halt();
    }
}

/// First Rust code after the boot stub: brings up the console and logger,
/// records the boot stack, runs the boot sequence and idles.
///
/// Returning here means ring 3 was never entered; the syscall path
/// resumes at [`idle_entry`] instead.
pub extern "C" fn kernel_entry(magic: u32, info: u32, stack_top: u32) -> ! {
    CONSOLE
        .set(SpinLock::new(Console::new(VgaTarget, VGA_WIDTH, VGA_HEIGHT)))
        .ok();
    LOGGER.install(LevelFilter::Info).ok();
    BOOT_STACK_TOP.set(stack_top).ok();

    let boot = BootInfo {
        magic,
        info: info as usize,
        kernel_stack_top: stack_top,
    };

    let mut platform = X86Platform;
    let mut state = STATE.lock();
    let _ = boot::run(&mut state, &mut platform, boot, DISK_IMAGE, INIT_PROGRAM);
    drop(state);

    halt()
}

/// Where the `exit` syscall sends the CPU once its process is gone.
pub extern "C" fn idle_entry() -> ! {
    info!("Idling...");
    halt()
}

fn halt() -> ! {
    loop {
        // SAFETY: waking only for interrupts is the desired end state.
        unsafe {
            core::arch::asm!("hlt", options(nomem, nostack, preserves_flags));
        }
    }
}
