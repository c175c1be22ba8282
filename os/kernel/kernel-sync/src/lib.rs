//! # Kernel synchronization primitives
//!
//! The kernel is single-core and single-flow: state is mutated either during
//! sequential boot or inside a trap handler that runs to completion. These
//! primitives exist to make that discipline explicit in the type system
//! rather than to arbitrate real contention.
//!
//! - [`SpinLock`] wraps state that is shared between the boot path and trap
//!   handlers (the console, the process table).
//! - [`SyncOnceCell`] holds state that is written exactly once during boot
//!   and read-only afterwards, with "not yet initialized" as a first-class
//!   observable state.
//!
//! Both are plain atomics over `UnsafeCell`, so they also work under the
//! hosted test harness where actual threads exercise them.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod once_cell;
mod spin;

pub use once_cell::SyncOnceCell;
pub use spin::{SpinLock, SpinLockGuard};
