//! # User mode transition
//!
//! The one-shot path from kernel setup into ring 3. [`setup_env`] stages
//! everything a program needs before the drop: a process record with its
//! ring-0 trap stack, the TSS pointing at that stack, and the program's
//! contents copied from the filesystem to the fixed user code base.
//! [`switch`] performs the drop itself and does not return.
//!
//! Each failure along the way is logged and leaves the kernel in ring 0;
//! the caller skips the switch and falls through to the idle loop.

use crate::gdt::selectors::{USER_CODE, USER_DATA};
use crate::platform::{Platform, UserEntry};
use crate::process::ProcessTable;
use crate::tss::Tss;
use core::slice;
use kernel_alloc::SectorAllocator;
use kernel_ext2::{Ext2Volume, ROOT_INODE};
use log::{error, info, warn};
use syscall_abi::{USER_CODE_BASE, USER_STACK_TOP};
use thiserror::Error;

/// Initial ring-3 flags: IF (bit 9) set, plus the always-one reserved bit.
const USER_EFLAGS: u32 = 0x202;

/// Why the user environment could not be prepared.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SetupError {
    /// No free slot in the process table.
    #[error("process table exhausted")]
    NoProcessSlot,
    /// The program name did not resolve to a readable inode.
    #[error("program not present in the root directory")]
    ProgramNotFound,
    /// The root directory inode could not be read.
    #[error("root directory unreadable")]
    RootUnreadable,
    /// The file claims more bytes than its blocks produced.
    #[error("short program read: {read} of {size} bytes")]
    ShortRead { read: usize, size: usize },
}

/// Prepares a ring-3 environment running `name` from the volume's root
/// directory.
///
/// Creates the process record, points the TSS at its kernel stack, lists
/// the root directory, resolves `name` by exact match and copies the whole
/// file to [`USER_CODE_BASE`]. Every failure is logged; none of them is
/// fatal to the kernel.
///
/// # Errors
/// See [`SetupError`]; the caller's only obligation is to skip the switch.
pub fn setup_env<P: Platform>(
    name: &str,
    platform: &mut P,
    volume: &Ext2Volume<'_>,
    processes: &mut ProcessTable,
    allocator: &mut SectorAllocator,
    tss: &mut Tss,
) -> Result<(), SetupError> {
    let Some(process) = processes.create(allocator) else {
        error!("Failed to create process");
        return Err(SetupError::NoProcessSlot);
    };
    // When a trap later drops the CPU out of ring 3 it must land on this
    // process's ring-0 stack.
    tss.set_kernel_stack(process.kernel_stack_top);

    let Some(root) = volume.read_inode(ROOT_INODE) else {
        error!("EXT2: Can't read root inode");
        error!("Failed to find program: {name}");
        return Err(SetupError::RootUnreadable);
    };

    info!("Disk Contents:");
    for entry in volume.dir_entries(&root) {
        info!(" - {}", core::str::from_utf8(entry.name).unwrap_or("?"));
    }

    let found = volume
        .dir_entries(&root)
        .find(|entry| entry.name == name.as_bytes());
    let Some(entry) = found else {
        warn!("DEBUG: '{name}' not found in root (tried exact match)");
        error!("Failed to find program: {name}");
        return Err(SetupError::ProgramNotFound);
    };
    let Some(inode) = volume.read_inode(entry.inode) else {
        error!("Failed to find program: {name}");
        return Err(SetupError::ProgramNotFound);
    };

    let size = inode.size as usize;
    let destination = platform.physical_memory(USER_CODE_BASE, size);
    // SAFETY: per the platform contract the user window is writable RAM,
    // and `size` bytes starting at its base are ours to fill.
    let buf = unsafe { slice::from_raw_parts_mut(destination, size) };
    let read = volume.read_file(&inode, 0, buf);
    if read != size {
        error!("Failed to read complete program (read {read} of {size} bytes)");
        return Err(SetupError::ShortRead { read, size });
    }
    Ok(())
}

/// Drops to ring 3 at the fixed program entry. Never returns; control
/// comes back to the kernel only through a trap.
pub fn switch<P: Platform>(platform: &mut P) {
    platform.enter_user_mode(UserEntry {
        eip: USER_CODE_BASE,
        esp: USER_STACK_TOP,
        cs: USER_CODE.encode(),
        ss: USER_DATA.encode(),
        eflags: USER_EFLAGS,
    });
}

#[cfg(test)]
mod tests {
    use super::{SetupError, setup_env, switch};
    use crate::platform::UserEntry;
    use crate::platform::test_support::FakePlatform;
    use crate::process::{MAX_PROCESSES, ProcessTable};
    use crate::tss::Tss;
    use ext2_image::ImageBuilder;
    use kernel_alloc::SectorAllocator;
    use kernel_ext2::Ext2Volume;
    use syscall_abi::USER_CODE_BASE;

    const ALLOC_BASE: u32 = 0x10_0000;

    fn allocator() -> SectorAllocator {
        let mut allocator = SectorAllocator::new();
        allocator.init(ALLOC_BASE, 0x10_0000);
        allocator
    }

    #[test]
    fn setup_env_loads_the_program_at_the_user_code_base() {
        let payload = b"\xb8\x01\x00\x00\x00\xcd\x80";
        let image = ImageBuilder::new()
            .file("example.bin", payload)
            .build()
            .unwrap();
        let mut storage = [0u8; 64];
        let volume = Ext2Volume::mount(&image, &mut storage).unwrap();

        let mut platform = FakePlatform::new();
        let mut processes = ProcessTable::new();
        let mut allocator = allocator();
        let mut tss = Tss::new();

        setup_env(
            "example.bin",
            &mut platform,
            &volume,
            &mut processes,
            &mut allocator,
            &mut tss,
        )
        .unwrap();

        assert_eq!(platform.memory[&USER_CODE_BASE], payload);
        assert_eq!(tss.esp0, ALLOC_BASE);
        assert!(processes.current().is_some());
    }

    #[test]
    fn setup_env_fails_for_a_missing_program() {
        let image = ImageBuilder::new()
            .file("other.bin", b"x")
            .build()
            .unwrap();
        let mut storage = [0u8; 64];
        let volume = Ext2Volume::mount(&image, &mut storage).unwrap();

        let mut platform = FakePlatform::new();
        let mut processes = ProcessTable::new();
        let mut allocator = allocator();
        let mut tss = Tss::new();

        let err = setup_env(
            "example.bin",
            &mut platform,
            &volume,
            &mut processes,
            &mut allocator,
            &mut tss,
        )
        .unwrap_err();

        assert_eq!(err, SetupError::ProgramNotFound);
        assert!(platform.memory.is_empty());
    }

    #[test]
    fn setup_env_fails_when_the_process_table_is_full() {
        let image = ImageBuilder::new()
            .file("example.bin", b"x")
            .build()
            .unwrap();
        let mut storage = [0u8; 64];
        let volume = Ext2Volume::mount(&image, &mut storage).unwrap();

        let mut platform = FakePlatform::new();
        let mut processes = ProcessTable::new();
        let mut allocator = allocator();
        let mut tss = Tss::new();
        for _ in 0..MAX_PROCESSES {
            processes.create(&mut allocator).unwrap();
        }

        let err = setup_env(
            "example.bin",
            &mut platform,
            &volume,
            &mut processes,
            &mut allocator,
            &mut tss,
        )
        .unwrap_err();

        assert_eq!(err, SetupError::NoProcessSlot);
    }

    #[test]
    fn setup_env_reports_a_short_read() {
        // Truncating the image chops off the file's last content block;
        // the inode still claims the full size.
        let payload = vec![0xAB; 3000];
        let mut image = ImageBuilder::new()
            .file("example.bin", &payload)
            .build()
            .unwrap();
        image.truncate(image.len() - 1024);
        let mut storage = [0u8; 64];
        let volume = Ext2Volume::mount(&image, &mut storage).unwrap();

        let mut platform = FakePlatform::new();
        let mut processes = ProcessTable::new();
        let mut allocator = allocator();
        let mut tss = Tss::new();

        let err = setup_env(
            "example.bin",
            &mut platform,
            &volume,
            &mut processes,
            &mut allocator,
            &mut tss,
        )
        .unwrap_err();

        assert_eq!(
            err,
            SetupError::ShortRead {
                read: 2048,
                size: 3000
            }
        );
    }

    #[test]
    fn switch_enters_ring_three_at_the_fixed_entry() {
        let mut platform = FakePlatform::new();

        switch(&mut platform);

        assert_eq!(
            platform.user_entry,
            Some(UserEntry {
                eip: 0x40_0000,
                esp: 0x80_0000,
                cs: 0x1B,
                ss: 0x23,
                eflags: 0x202,
            })
        );
    }
}
