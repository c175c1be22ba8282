//! # Process table
//!
//! A fixed table of 64 process records. There is no scheduler; the table
//! exists so the privilege-transition path has somewhere to record the one
//! program it runs, and so a later scheduler has a structure to grow into.
//!
//! Creating a process claims the first unused slot and allocates one
//! physical sector for its ring-0 trap stack. Nothing is released on exit;
//! the slot stays claimed for the kernel's lifetime.

use kernel_alloc::SectorAllocator;
use syscall_abi::USER_STACK_TOP;

/// Number of slots in the table.
pub const MAX_PROCESSES: usize = 64;

/// Lifecycle state of one table slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum ProcessState {
    Unused = 0,
    Running = 1,
    Paused = 2,
}

/// One process record.
#[derive(Debug, Copy, Clone)]
pub struct Process {
    /// Slot id, assigned once at table construction.
    pub id: u16,
    pub state: ProcessState,
    /// Ring-0 stack address handed to the TSS before the transition.
    pub kernel_stack_top: u32,
    /// Initial ring-3 stack pointer.
    pub user_stack_top: u32,
    /// General-register snapshot slot; unused until preemption exists.
    pub registers: [u32; 16],
}

impl Process {
    const fn empty(id: u16) -> Self {
        Self {
            id,
            state: ProcessState::Unused,
            kernel_stack_top: 0,
            user_stack_top: 0,
            registers: [0; 16],
        }
    }
}

/// The fixed process table.
pub struct ProcessTable {
    slots: [Process; MAX_PROCESSES],
    current: Option<usize>,
}

impl ProcessTable {
    /// A table of unused slots with sequential ids.
    #[must_use]
    pub const fn new() -> Self {
        let mut slots = [Process::empty(0); MAX_PROCESSES];
        let mut index = 0;
        while index < MAX_PROCESSES {
            slots[index].id = index as u16;
            index += 1;
        }
        Self {
            slots,
            current: None,
        }
    }

    /// Claims the first unused slot for a new running process.
    ///
    /// One sector is allocated for the process's kernel stack before the
    /// slot is touched, so a failed allocation (like a full table) leaves
    /// every record exactly as it was.
    pub fn create(&mut self, allocator: &mut SectorAllocator) -> Option<&mut Process> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.state == ProcessState::Unused)?;
        let kernel_stack = allocator.alloc().ok()?;

        let slot = &mut self.slots[index];
        slot.state = ProcessState::Running;
        slot.kernel_stack_top = kernel_stack;
        slot.user_stack_top = USER_STACK_TOP;
        self.current = Some(index);
        Some(slot)
    }

    /// The record most recently created, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Process> {
        self.current.map(|index| &self.slots[index])
    }

    /// The record at `index`, if in range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Process> {
        self.slots.get(index)
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_PROCESSES, ProcessState, ProcessTable};
    use kernel_alloc::{SECTOR_SIZE, SectorAllocator};

    const BASE: u32 = 0x10_0000;

    fn allocator() -> SectorAllocator {
        let mut alloc = SectorAllocator::new();
        alloc.init(BASE, 128 * SECTOR_SIZE);
        alloc
    }

    #[test]
    fn fresh_table_is_all_unused_with_sequential_ids() {
        let table = ProcessTable::new();
        for index in 0..MAX_PROCESSES {
            let slot = table.get(index).unwrap();
            assert_eq!(slot.id, index as u16);
            assert_eq!(slot.state, ProcessState::Unused);
        }
        assert!(table.current().is_none());
    }

    #[test]
    fn create_claims_the_first_slot_and_a_stack_sector() {
        let mut table = ProcessTable::new();
        let mut alloc = allocator();

        let process = table.create(&mut alloc).unwrap();
        assert_eq!(process.id, 0);
        assert_eq!(process.state, ProcessState::Running);
        assert_eq!(process.kernel_stack_top, BASE);
        assert_eq!(process.user_stack_top, 0x80_0000);

        assert_eq!(table.current().unwrap().id, 0);
    }

    #[test]
    fn successive_creates_take_distinct_slots_and_sectors() {
        let mut table = ProcessTable::new();
        let mut alloc = allocator();

        let first = table.create(&mut alloc).unwrap().id;
        let second_stack = {
            let second = table.create(&mut alloc).unwrap();
            assert_eq!(second.id, first + 1);
            second.kernel_stack_top
        };
        assert_eq!(second_stack, BASE + SECTOR_SIZE);
        assert_eq!(table.current().unwrap().id, 1);
    }

    #[test]
    fn a_full_table_rejects_creation_without_side_effects() {
        let mut table = ProcessTable::new();
        let mut alloc = allocator();

        for _ in 0..MAX_PROCESSES {
            assert!(table.create(&mut alloc).is_some());
        }
        let last_stack = table.get(MAX_PROCESSES - 1).unwrap().kernel_stack_top;

        assert!(table.create(&mut alloc).is_none());
        assert_eq!(table.current().unwrap().id, (MAX_PROCESSES - 1) as u16);
        assert_eq!(
            table.get(MAX_PROCESSES - 1).unwrap().kernel_stack_top,
            last_stack
        );
    }

    #[test]
    fn a_failed_stack_allocation_leaves_the_slot_unused() {
        let mut table = ProcessTable::new();
        let mut uninitialized = SectorAllocator::new();

        assert!(table.create(&mut uninitialized).is_none());
        assert_eq!(table.get(0).unwrap().state, ProcessState::Unused);
        assert!(table.current().is_none());
    }
}
