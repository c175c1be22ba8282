use crate::syscall::sys_write;
use core::fmt::{self, Write};
use syscall_abi::stream;

/// `core::fmt` sink that forwards to the `write` syscall, one fragment per
/// call.
pub struct StdoutSink;

impl Write for StdoutSink {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        sys_write(stream::STDOUT, s.as_bytes());
        Ok(())
    }

    #[inline]
    fn write_char(&mut self, c: char) -> fmt::Result {
        // UTF-8 encode without allocation.
        let mut buf = [0u8; 4];
        let s = c.encode_utf8(&mut buf);
        self.write_str(s)
    }
}

#[doc(hidden)]
#[inline(always)]
#[allow(clippy::inline_always)]
pub fn stdout_write(args: fmt::Arguments) {
    // Best-effort output; the sink never reports failure anyway.
    fmt::write(&mut StdoutSink, args).ok();
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        $crate::stdlib::fmt::stdout_write(core::format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        $crate::stdlib::fmt::stdout_write(core::format_args!($($arg)*));
        $crate::syscall::sys_write($crate::stdlib::fmt::STDOUT, b"\n");
    }};
}

#[doc(hidden)]
pub use syscall_abi::stream::STDOUT;
