//! # Task State Segment
//!
//! Protected mode uses the TSS for exactly one thing here: when a trap drops
//! the CPU from ring 3 to ring 0, the hardware pulls the privileged stack
//! from `ss0:esp0`. Everything else in the 104-byte structure is legacy
//! hardware task switching state and stays zero.
//!
//! The segment's descriptor lives in GDT slot 5 and the task register is
//! loaded with selector 0x28 once both tables are live.

use crate::gdt::selectors;

/// The hardware-defined 32-bit Task State Segment.
///
/// Field order and widths are dictated by the CPU. All fields are naturally
/// aligned, so `repr(C)` already yields the exact 104-byte layout; the size
/// is pinned below.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Tss {
    pub prev_tss: u32,
    /// Ring-0 stack pointer loaded on a privilege-raising trap.
    pub esp0: u32,
    /// Ring-0 stack segment loaded together with `esp0`.
    pub ss0: u32,
    pub esp1: u32,
    pub ss1: u32,
    pub esp2: u32,
    pub ss2: u32,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub es: u32,
    pub cs: u32,
    pub ss: u32,
    pub ds: u32,
    pub fs: u32,
    pub gs: u32,
    pub ldt: u32,
    pub trap: u16,
    pub iomap_base: u16,
}

const _: () = {
    assert!(size_of::<Tss>() == 104);
    assert!(core::mem::offset_of!(Tss, esp0) == 4);
    assert!(core::mem::offset_of!(Tss, ss0) == 8);
    assert!(core::mem::offset_of!(Tss, iomap_base) == 102);
};

impl Tss {
    /// Descriptor limit for GDT slot 5: the segment size minus one.
    pub const LIMIT: u32 = (size_of::<Self>() - 1) as u32;

    /// An all-zero segment.
    #[must_use]
    pub const fn new() -> Self {
        // SAFETY: Tss is plain integers; the all-zero bit pattern is valid.
        unsafe { core::mem::zeroed() }
    }

    /// Clears the segment and fills in the fixed selector fields.
    ///
    /// `esp0` stays zero until a process provides its kernel stack via
    /// [`Self::set_kernel_stack`].
    pub fn setup(&mut self) {
        *self = Self::new();
        self.ss0 = u32::from(selectors::KERNEL_DATA.encode());
        self.esp0 = 0;
        self.cs = u32::from(selectors::KERNEL_CODE.encode());
        self.ss = u32::from(selectors::KERNEL_DATA.encode());
        self.ds = u32::from(selectors::KERNEL_DATA.encode());
        self.es = u32::from(selectors::KERNEL_DATA.encode());
        self.fs = u32::from(selectors::KERNEL_DATA.encode());
        self.gs = u32::from(selectors::KERNEL_DATA.encode());
    }

    /// Points `esp0` at a new ring-0 stack top.
    ///
    /// Called before each privilege transition so the next trap out of
    /// ring 3 lands on the transitioning process's kernel stack.
    pub fn set_kernel_stack(&mut self, stack_top: u32) {
        self.esp0 = stack_top;
    }
}

impl Default for Tss {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Tss;

    #[test]
    fn setup_fills_the_fixed_selectors() {
        let mut tss = Tss::new();
        tss.setup();
        assert_eq!(tss.ss0, 0x10);
        assert_eq!(tss.esp0, 0);
        assert_eq!(tss.cs, 0x08);
        assert_eq!(tss.ss, 0x10);
        assert_eq!(tss.ds, 0x10);
        assert_eq!(tss.es, 0x10);
        assert_eq!(tss.fs, 0x10);
        assert_eq!(tss.gs, 0x10);
    }

    #[test]
    fn setup_clears_stale_state() {
        let mut tss = Tss::new();
        tss.eax = 0xFFFF_FFFF;
        tss.cr3 = 0x1000;
        tss.setup();
        assert_eq!(tss.eax, 0);
        assert_eq!(tss.cr3, 0);
    }

    #[test]
    fn set_kernel_stack_only_touches_esp0() {
        let mut tss = Tss::new();
        tss.setup();
        tss.set_kernel_stack(0x0050_0000);
        assert_eq!(tss.esp0, 0x0050_0000);
        assert_eq!(tss.ss0, 0x10);
    }

    #[test]
    fn descriptor_limit_is_size_minus_one() {
        assert_eq!(Tss::LIMIT, 103);
    }
}
