//! # PS/2 keyboard scancode translation
//!
//! Set-1 make codes from port 0x60 mapped to ASCII through a fixed US
//! layout table. No modifier tracking: shift, ctrl and alt occupy table
//! slots but translate to nothing, and break codes (bit 7 set) are
//! discarded before the table is consulted.

/// Keyboard controller data port.
pub const DATA_PORT: u16 = 0x60;
/// Keyboard controller status/command port.
pub const STATUS_PORT: u16 = 0x64;

/// US layout, scancode set 1. Zero means "no translation".
const KEYMAP: [u8; 128] = [
    0, 27, b'1', b'2', b'3', b'4', b'5', b'6', // 0x00: esc, digits
    b'7', b'8', b'9', b'0', b'-', b'=', 0x08, // backspace
    b'\t', b'q', b'w', b'e', b'r', b't', b'y', b'u', // 0x0F: top row
    b'i', b'o', b'p', b'[', b']', b'\n', // enter
    0, // 0x1D: left ctrl
    b'a', b's', b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', // home row
    b'\'', b'`', 0, // 0x2A: left shift
    b'\\', b'z', b'x', b'c', b'v', b'b', b'n', b'm', b',', b'.', b'/', // bottom row
    0,    // 0x36: right shift
    b'*', // keypad
    0,    // 0x38: left alt
    b' ', 0, // 0x3A: caps lock
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0x3B: F1..F10
    0, 0, // 0x45: num lock, scroll lock
    0, 0, 0, // 0x47: keypad home, up, page up
    b'-', 0, 0, 0, // 0x4A: keypad minus, left, centre, right
    b'+', 0, 0, 0, 0, 0, // 0x4E: keypad end through delete
    0, 0, 0, // 0x54
    0, 0, // 0x57: F11, F12
    0, 0, 0, 0, 0, 0, 0, // 0x59
    0, 0, 0, 0, 0, 0, 0, 0, // 0x60
    0, 0, 0, 0, 0, 0, 0, 0, // 0x68
    0, 0, 0, 0, 0, 0, 0, 0, // 0x70
    0, 0, 0, 0, 0, 0, 0, 0, // 0x78
];

const _: () = {
    assert!(KEYMAP[0x1C] == b'\n');
    assert!(KEYMAP[0x39] == b' ');
    assert!(KEYMAP[0x4A] == b'-');
    assert!(KEYMAP[0x4E] == b'+');
};

/// ASCII byte for a raw scancode, if it is a mapped make code.
#[must_use]
pub const fn ascii_for(scancode: u8) -> Option<u8> {
    if scancode >= 128 {
        return None;
    }
    match KEYMAP[scancode as usize] {
        0 => None,
        byte => Some(byte),
    }
}
