//! # Boot sequence
//!
//! [`run`] carries the machine from the multiboot2 handoff to its resting
//! state: descriptor tables built and verified, interrupt controller
//! remapped, TSS loaded, physical memory fenced off, the embedded
//! filesystem mounted and, when the configured program can be staged, one
//! privilege drop into ring 3. Whatever happens after that arrives through
//! the trap path; `run` itself returns to the caller's idle loop.
//!
//! All long-lived kernel state sits in one [`KernelState`] value so the
//! bare-metal entry can park it in a static and hosted tests can hold it
//! on the stack.

use crate::gdt::{self, Gdt, selectors};
use crate::idt::{self, Idt};
use crate::multiboot;
use crate::pic;
use crate::platform::Platform;
use crate::process::ProcessTable;
use crate::tss::Tss;
use crate::usermode;
use core::slice;
use kernel_alloc::{SECTOR_SIZE, SectorAllocator};
use kernel_ext2::Ext2Volume;
use log::{error, info};
use thiserror::Error;

/// First byte the sector allocator manages. Everything below 1 MiB belongs
/// to firmware, the kernel image and the VGA window.
pub const ALLOCATOR_BASE: u32 = 0x10_0000;

/// The values the boot stub captures before any Rust code runs.
#[derive(Debug, Copy, Clone)]
pub struct BootInfo {
    /// Magic the bootloader left in `eax`.
    pub magic: u32,
    /// Address of the multiboot2 information area, from `ebx`.
    pub info: usize,
    /// Top of the boot stack; the TSS points here until the first process
    /// brings its own kernel stack.
    pub kernel_stack_top: u32,
}

/// Boot-time failures that leave the machine unusable.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum BootError {
    /// The GDT failed setup or its post-load verification.
    #[error("global descriptor table: {0}")]
    Gdt(#[from] gdt::IntegrityError),
    /// The IDT failed its post-load verification.
    #[error("interrupt descriptor table: {0}")]
    Idt(#[from] idt::IntegrityError),
}

/// Every piece of kernel state that outlives the boot sequence.
pub struct KernelState {
    pub gdt: Gdt,
    pub idt: Idt,
    pub tss: Tss,
    pub allocator: SectorAllocator,
    pub processes: ProcessTable,
}

impl KernelState {
    /// Unloaded tables, an uninitialized allocator, an empty process table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            gdt: Gdt::new(),
            idt: Idt::new(),
            tss: Tss::new(),
            allocator: SectorAllocator::new(),
            processes: ProcessTable::new(),
        }
    }
}

impl Default for KernelState {
    fn default() -> Self {
        Self::new()
    }
}

/// Brings the machine up, by way of ring 3 when a program can be staged.
///
/// The sequence is fixed: GDT with its integrity check, IDT likewise, PIC
/// remap, TSS and task register, interrupts on, memory discovery, physical
/// allocator, filesystem mount, program staging, privilege drop. Mount and
/// staging failures are logged and skipped; the machine then idles in
/// ring 0, which is a working outcome and returns `Ok`.
///
/// # Errors
/// [`BootError`] when a descriptor table fails verification. Nothing can
/// be trusted at that point; the caller should halt.
pub fn run<P: Platform>(
    state: &mut KernelState,
    platform: &mut P,
    boot: BootInfo,
    image: &[u8],
    program: &str,
) -> Result<(), BootError> {
    if let Err(error) = state
        .gdt
        .setup(platform, &state.tss)
        .and_then(|()| state.gdt.verify_integrity())
    {
        error!("FATAL: Failed to initialize GDT!");
        return Err(BootError::Gdt(error));
    }

    state.idt.setup(platform, &mut state.tss, &mut state.gdt);
    if let Err(error) = state.idt.verify_integrity() {
        error!("FATAL: Failed to initialize IDT!");
        return Err(BootError::Idt(error));
    }

    pic::init(platform);

    state.tss.set_kernel_stack(boot.kernel_stack_top);
    platform.load_task_register(selectors::TSS.encode());
    platform.enable_interrupts();

    // SAFETY: the pair comes straight from the handoff registers, and the
    // walker validates the magic before touching the info area.
    let total = unsafe { multiboot::total_available_memory(boot.magic, boot.info) };
    info!("Booted with {} MB of Memory.", total / (1024 * 1024));

    let managed =
        u32::try_from(total.saturating_sub(u64::from(ALLOCATOR_BASE))).unwrap_or(u32::MAX);
    state.allocator.init(ALLOCATOR_BASE, managed);

    let Some(volume) = mount_volume(image, &mut state.allocator, platform) else {
        error!("Failed to mount EXT2 filesystem from embedded image.");
        return Ok(());
    };
    info!(
        "EXT2 filesystem mounted successfully! Block size: {} bytes",
        volume.block_size()
    );

    let staged = usermode::setup_env(
        program,
        platform,
        &volume,
        &mut state.processes,
        &mut state.allocator,
        &mut state.tss,
    );
    if staged.is_ok() {
        usermode::switch(platform);
    }
    Ok(())
}

/// Mounts the embedded image, parking the driver's descriptor-table copy
/// in freshly allocated physical sectors.
fn mount_volume<'a, P: Platform>(
    image: &'a [u8],
    allocator: &mut SectorAllocator,
    platform: &mut P,
) -> Option<Ext2Volume<'a>> {
    let needed = Ext2Volume::descriptor_table_len(image).ok()?;
    let sectors = needed.div_ceil(SECTOR_SIZE as usize).max(1);
    let base = allocator.alloc_sectors(sectors).ok()?;
    let storage = platform.physical_memory(base, needed);
    // SAFETY: the sectors at `base` were allocated for this copy alone and
    // are never handed out again, so the slice stays exclusive for the
    // volume's lifetime.
    let storage = unsafe { slice::from_raw_parts_mut(storage, needed) };
    Ext2Volume::mount(image, storage).ok()
}
