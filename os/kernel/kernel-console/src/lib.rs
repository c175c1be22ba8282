//! # Text console and byte streams
//!
//! Everything the kernel prints, and everything the keyboard feeds it, goes
//! through three byte streams: stdin, stdout and stderr. The [`Console`]
//! owns the streams plus an 80x25 cell grid and knows how to drain the
//! output streams onto the grid, stderr in red.
//!
//! The grid writes go through the [`TextTarget`] trait so the same console
//! logic runs against VGA text memory on the machine and against a plain
//! array under the test harness.
//!
//! [`ConsoleLogger`] adapts the `log` facade onto a shared console:
//! `error!`/`warn!` lines land on stderr, everything else on stdout.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod console;
mod logger;
mod stream;

pub use console::{ArrayTarget, Cell, Console, StreamWriter, TextTarget, VGA_HEIGHT, VGA_WIDTH};
pub use logger::ConsoleLogger;
pub use stream::{ByteStream, STREAM_CAPACITY};
