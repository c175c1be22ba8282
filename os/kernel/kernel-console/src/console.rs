use crate::stream::ByteStream;
use core::fmt;
use syscall_abi::stream::{STDERR, STDIN, STDOUT};

/// Columns of the VGA text mode grid.
pub const VGA_WIDTH: usize = 80;
/// Rows of the VGA text mode grid.
pub const VGA_HEIGHT: usize = 25;

/// Default attribute: light grey on black.
const DEFAULT_COLOR: u8 = 0x07;
/// Attribute used while draining stderr: red on black.
const ERROR_COLOR: u8 = 0x04;

/// Bytes drained from a stream per read while rendering.
const RENDER_CHUNK: usize = 64;

const STREAM_COUNT: usize = 3;

/// One character cell as VGA text memory stores it.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Cell {
    pub glyph: u8,
    pub color: u8,
}

const _: () = assert!(size_of::<Cell>() == 2);

impl Cell {
    #[must_use]
    pub const fn new(glyph: u8, color: u8) -> Self {
        Self { glyph, color }
    }
}

/// Where rendered cells go. The machine implementation writes VGA text
/// memory; hosted tests use [`ArrayTarget`].
pub trait TextTarget {
    fn load(&self, index: usize) -> Cell;
    fn store(&mut self, index: usize, cell: Cell);
}

/// A memory-backed cell grid.
pub struct ArrayTarget<const N: usize> {
    cells: [Cell; N],
}

impl<const N: usize> ArrayTarget<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cells: [Cell::new(0, 0); N],
        }
    }

    #[must_use]
    pub const fn cells(&self) -> &[Cell; N] {
        &self.cells
    }
}

impl<const N: usize> Default for ArrayTarget<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TextTarget for ArrayTarget<N> {
    fn load(&self, index: usize) -> Cell {
        self.cells[index]
    }

    fn store(&mut self, index: usize, cell: Cell) {
        self.cells[index] = cell;
    }
}

/// The text console: three byte streams plus the cell grid they render to.
///
/// `stdin` is only ever filled (by the keyboard handler) and drained (by
/// the `read` syscall); it never reaches the grid. `stdout` and `stderr`
/// are drained onto the grid by [`render`](Self::render), which every
/// [`write_stream`](Self::write_stream) triggers.
pub struct Console<T> {
    target: T,
    width: usize,
    height: usize,
    size: usize,
    cursor: usize,
    color: u8,
    streams: [ByteStream; STREAM_COUNT],
}

impl<T: TextTarget> Console<T> {
    /// A cleared console over `target`, which must hold at least
    /// `width * height` cells.
    pub fn new(target: T, width: usize, height: usize) -> Self {
        let mut console = Self {
            target,
            width,
            height,
            size: width * height,
            cursor: 0,
            color: DEFAULT_COLOR,
            streams: [ByteStream::new(), ByteStream::new(), ByteStream::new()],
        };
        console.clear();
        console
    }

    /// Blank the whole grid with the current color and home the cursor.
    pub fn clear(&mut self) {
        self.cursor = 0;
        for index in 0..self.size {
            self.target.store(index, Cell::new(b' ', self.color));
        }
    }

    /// Append bytes to the stream `id` and render the result.
    ///
    /// Returns how many bytes the stream took, or `None` for an unknown
    /// stream id.
    pub fn write_stream(&mut self, id: u32, bytes: &[u8]) -> Option<usize> {
        if id as usize >= STREAM_COUNT {
            return None;
        }
        self.color = DEFAULT_COLOR;
        let written = self.streams[id as usize].write(bytes);
        self.render();
        Some(written)
    }

    /// Queue one keyboard byte on stdin. Does not render.
    pub fn push_input(&mut self, byte: u8) {
        self.streams[STDIN as usize].write(&[byte]);
    }

    /// Drain buffered stdin bytes into `buf`; returns the count copied.
    pub fn read_input(&mut self, buf: &mut [u8]) -> usize {
        self.streams[STDIN as usize].read(buf)
    }

    /// Bytes currently buffered on stream `id`.
    #[must_use]
    pub fn stream_len(&self, id: u32) -> Option<usize> {
        self.streams.get(id as usize).map(ByteStream::len)
    }

    /// Drain stdout, then stderr (in red), onto the grid.
    pub fn render(&mut self) {
        self.drain(STDOUT);

        let saved = self.color;
        self.color = ERROR_COLOR;
        self.drain(STDERR);
        self.color = saved;
    }

    fn drain(&mut self, id: u32) {
        let mut chunk = [0u8; RENDER_CHUNK];
        loop {
            let bytes = self.streams[id as usize].read(&mut chunk);
            if bytes == 0 {
                break;
            }
            for &byte in &chunk[..bytes] {
                self.put(byte);
            }
        }
    }

    fn put(&mut self, byte: u8) {
        match byte {
            b'\r' => {
                self.cursor -= self.cursor % self.width;
            }
            b'\n' => {
                self.cursor += self.width - self.cursor % self.width;
                if self.cursor >= self.size {
                    self.scroll();
                    self.cursor -= self.width;
                }
            }
            _ => {
                if self.cursor < self.size {
                    self.target.store(self.cursor, Cell::new(byte, self.color));
                    self.cursor += 1;
                    if self.cursor >= self.size {
                        self.scroll();
                        self.cursor -= self.width;
                    }
                }
            }
        }
    }

    fn scroll(&mut self) {
        for index in self.width..self.size {
            let cell = self.target.load(index);
            self.target.store(index - self.width, cell);
        }
        let last_line = self.size - self.width;
        for col in 0..self.width {
            self.target.store(last_line + col, Cell::new(b' ', self.color));
        }
    }

    /// Format into stream `id`.
    pub fn writer(&mut self, id: u32) -> StreamWriter<'_, T> {
        StreamWriter { console: self, id }
    }

    /// Format onto stdout.
    pub fn stdout(&mut self) -> StreamWriter<'_, T> {
        self.writer(STDOUT)
    }

    /// Format onto stderr.
    pub fn stderr(&mut self) -> StreamWriter<'_, T> {
        self.writer(STDERR)
    }

    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub const fn target(&self) -> &T {
        &self.target
    }
}

/// `fmt::Write` adapter over one console stream.
pub struct StreamWriter<'c, T> {
    console: &'c mut Console<T>,
    id: u32,
}

impl<T: TextTarget> fmt::Write for StreamWriter<'_, T> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.console.write_stream(self.id, s.as_bytes());
        Ok(())
    }
}
