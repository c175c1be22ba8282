use crate::console::{Console, TextTarget};
use core::fmt::Write as _;
use kernel_sync::{SpinLock, SyncOnceCell};
use log::{Level, LevelFilter, Log, Metadata, Record};
use syscall_abi::stream::{STDERR, STDOUT};

/// `log` facade backend that prints onto a shared [`Console`].
///
/// `error!` and `warn!` records go to stderr (rendered red), everything
/// else to stdout. Records are dropped while the console is still
/// uninitialized or currently locked; a logger that waited on the lock
/// could spin forever if the holder is the very code being interrupted.
pub struct ConsoleLogger<T: 'static> {
    console: &'static SyncOnceCell<SpinLock<Console<T>>>,
}

impl<T> ConsoleLogger<T> {
    #[must_use]
    pub const fn new(console: &'static SyncOnceCell<SpinLock<Console<T>>>) -> Self {
        Self { console }
    }
}

impl<T: TextTarget + Send> ConsoleLogger<T> {
    /// Register as the global logger.
    ///
    /// # Errors
    /// Fails if another logger was installed first.
    pub fn install(&'static self, level: LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(level);
        Ok(())
    }
}

impl<T: TextTarget + Send> Log for ConsoleLogger<T> {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let Some(console) = self.console.get() else {
            return;
        };
        let Some(mut console) = console.try_lock() else {
            return;
        };
        let id = if record.level() <= Level::Warn {
            STDERR
        } else {
            STDOUT
        };
        let _ = writeln!(console.writer(id), "{}", record.args());
    }

    fn flush(&self) {}
}
