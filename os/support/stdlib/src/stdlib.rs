//! Formatting helpers layered over the syscall surface.

#[macro_use]
pub mod fmt;

use crate::syscall::sys_write;
use syscall_abi::stream;

const fn hex_digit(n: u8) -> u8 {
    if n < 10 { b'0' + n } else { b'A' + (n - 10) }
}

/// Writes `x` to stdout as eight uppercase hex digits.
pub fn print_hex(mut x: u32) {
    let mut digits = [0u8; 8];
    for digit in &mut digits {
        x = x.rotate_left(4);
        *digit = hex_digit((x as u8) & 0x0F);
    }
    sys_write(stream::STDOUT, &digits);
}
