//! # Privileged platform operations
//!
//! Everything the kernel does that only works on a real (or emulated) CPU is
//! funneled through the [`Platform`] trait: descriptor table loads, port
//! I/O, the interrupt flag and the final jump to ring 3. The table managers,
//! the dispatcher and the boot sequence only ever talk to this trait, which
//! keeps them runnable as plain host tests against [`test_support::FakePlatform`].
//!
//! The freestanding kernel provides the one real implementation in
//! [`x86`], where these calls become `lgdt`, `lidt`, `ltr`, `in`/`out`,
//! `sti` and an `iret` frame.

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod x86;

/// Operand for `lgdt`/`lidt`: a limit and a linear base address.
///
/// On the 32-bit target this is exactly the six-byte descriptor-table
/// operand the CPU expects.
#[repr(C, packed)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct TablePointer {
    /// Table size in bytes, minus one.
    pub limit: u16,
    /// Linear address of the first entry.
    pub base: usize,
}

/// Register state for the initial drop to ring 3.
///
/// The data segments are loaded with `ss` before the jump, so one selector
/// covers DS/ES/FS/GS/SS.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct UserEntry {
    /// First instruction to execute in ring 3.
    pub eip: u32,
    /// Initial user stack pointer.
    pub esp: u32,
    /// Ring-3 code selector.
    pub cs: u16,
    /// Ring-3 stack/data selector.
    pub ss: u16,
    /// Flags to enter with; bit 9 keeps interrupts enabled in ring 3.
    pub eflags: u32,
}

/// The privileged operations backing the kernel's hardware touchpoints.
pub trait Platform {
    /// Loads the GDT register and refreshes the segment registers.
    fn load_gdt(&mut self, pointer: TablePointer);

    /// Loads the IDT register.
    fn load_idt(&mut self, pointer: TablePointer);

    /// Loads the task register with a TSS selector.
    fn load_task_register(&mut self, selector: u16);

    /// Linear address of the trap entry stub for `vector`.
    fn trap_entry(&self, vector: u8) -> u32;

    /// Reads one byte from an I/O port.
    fn port_read(&mut self, port: u16) -> u8;

    /// Writes one byte to an I/O port.
    fn port_write(&mut self, port: u16, value: u8);

    /// Raw pointer to `len` bytes of physical memory at `addr`.
    ///
    /// The platform guarantees the range is plain RAM the kernel may read
    /// and write: program windows, allocator-handed sectors.
    fn physical_memory(&mut self, addr: u32, len: usize) -> *mut u8;

    /// Sets the interrupt flag.
    fn enable_interrupts(&mut self);

    /// Drops to ring 3 at `entry`. On hardware this never returns; control
    /// comes back to the kernel only through a trap.
    fn enter_user_mode(&mut self, entry: UserEntry);
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub mod test_support {
    use super::{Platform, TablePointer, UserEntry};
    use std::collections::HashMap;

    /// Records every privileged operation instead of performing it.
    ///
    /// Port reads are served from [`Self::port_state`], which tests pre-load
    /// with mask bytes or scancodes; port writes update it as well, so
    /// read-modify-write sequences behave like a device register would.
    #[derive(Default)]
    pub struct FakePlatform {
        pub loaded_gdt: Option<TablePointer>,
        pub loaded_idt: Option<TablePointer>,
        pub task_register: Option<u16>,
        pub interrupts_enabled: bool,
        pub user_entry: Option<UserEntry>,
        pub port_writes: Vec<(u16, u8)>,
        pub port_reads: Vec<u16>,
        pub port_state: HashMap<u16, u8>,
        pub memory: HashMap<u32, Vec<u8>>,
    }

    impl FakePlatform {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-loads `bytes` at `addr` so a later [`Platform::physical_memory`]
        /// call hands them back.
        pub fn seed_memory(&mut self, addr: u32, bytes: &[u8]) {
            self.memory.insert(addr, bytes.to_vec());
        }

        /// The synthetic stub address [`Platform::trap_entry`] reports.
        #[must_use]
        pub fn trap_entry_addr(&self, vector: u8) -> u32 {
            0x0010_0000 + u32::from(vector) * 16
        }

        /// All values written to `port`, in order.
        #[must_use]
        pub fn writes_to(&self, port: u16) -> Vec<u8> {
            self.port_writes
                .iter()
                .filter(|(p, _)| *p == port)
                .map(|(_, v)| *v)
                .collect()
        }
    }

    impl Platform for FakePlatform {
        fn load_gdt(&mut self, pointer: TablePointer) {
            self.loaded_gdt = Some(pointer);
        }

        fn load_idt(&mut self, pointer: TablePointer) {
            self.loaded_idt = Some(pointer);
        }

        fn load_task_register(&mut self, selector: u16) {
            self.task_register = Some(selector);
        }

        fn trap_entry(&self, vector: u8) -> u32 {
            self.trap_entry_addr(vector)
        }

        fn port_read(&mut self, port: u16) -> u8 {
            self.port_reads.push(port);
            self.port_state.get(&port).copied().unwrap_or(0)
        }

        fn port_write(&mut self, port: u16, value: u8) {
            self.port_writes.push((port, value));
            self.port_state.insert(port, value);
        }

        fn physical_memory(&mut self, addr: u32, len: usize) -> *mut u8 {
            let buffer = self.memory.entry(addr).or_insert_with(|| vec![0; len]);
            if buffer.len() < len {
                buffer.resize(len, 0);
            }
            buffer.as_mut_ptr()
        }

        fn enable_interrupts(&mut self) {
            self.interrupts_enabled = true;
        }

        fn enter_user_mode(&mut self, entry: UserEntry) {
            self.user_entry = Some(entry);
        }
    }
}
