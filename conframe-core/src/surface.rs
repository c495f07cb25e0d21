use std::collections::HashSet;
use std::io::{self, BufWriter, Stdout, Write};

use crossterm::style::{Print, SetBackgroundColor, SetForegroundColor};
use crossterm::{cursor, queue, terminal};

use crate::grid::Grid;
use crate::pixel::{Pixel, TermColor};

/// The terminal primitives the engine draws through.
///
/// Coordinates outside the surface are an error the engine recovers from;
/// the cell is simply retried on the next frame.
pub trait Surface: Send {
    fn move_to(&mut self, col: u16, row: u16) -> io::Result<()>;

    fn cursor_position(&mut self) -> io::Result<(u16, u16)>;

    fn set_foreground(&mut self, color: TermColor) -> io::Result<()>;

    fn set_background(&mut self, color: TermColor) -> io::Result<()>;

    /// Write one glyph at the cursor using the current colors.
    fn put_char(&mut self, glyph: char) -> io::Result<()>;

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn out_of_range(col: u16, row: u16, cols: u16, rows: u16) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("cursor ({col}, {row}) outside {cols}x{rows} surface"),
    )
}

/// A real terminal, driven with queued crossterm commands.
///
/// Commands accumulate in `W` until [`Surface::flush`]; the engine flushes
/// once per frame.
pub struct CrosstermSurface<W: Write + Send> {
    out: W,
    cols: u16,
    rows: u16,
}

impl CrosstermSurface<BufWriter<Stdout>> {
    /// Stdout, bounded by the terminal size at the time of the call.
    pub fn stdout() -> io::Result<Self> {
        let (cols, rows) = terminal::size()?;
        Ok(Self::new(BufWriter::with_capacity(256 * 1024, io::stdout()), cols, rows))
    }
}

impl<W: Write + Send> CrosstermSurface<W> {
    pub fn new(out: W, cols: u16, rows: u16) -> Self {
        Self { out, cols, rows }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Surface for CrosstermSurface<W> {
    fn move_to(&mut self, col: u16, row: u16) -> io::Result<()> {
        if col >= self.cols || row >= self.rows {
            return Err(out_of_range(col, row, self.cols, self.rows));
        }
        queue!(self.out, cursor::MoveTo(col, row))
    }

    fn cursor_position(&mut self) -> io::Result<(u16, u16)> {
        // Pending moves must reach the terminal before it can report them.
        self.out.flush()?;
        cursor::position()
    }

    fn set_foreground(&mut self, color: TermColor) -> io::Result<()> {
        queue!(self.out, SetForegroundColor(color.into()))
    }

    fn set_background(&mut self, color: TermColor) -> io::Result<()> {
        queue!(self.out, SetBackgroundColor(color.into()))
    }

    fn put_char(&mut self, glyph: char) -> io::Result<()> {
        queue!(self.out, Print(glyph))
    }

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
        if visible {
            queue!(self.out, cursor::Show)?;
        } else {
            queue!(self.out, cursor::Hide)?;
        }
        self.out.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// One glyph written to a [`HeadlessSurface`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellWrite {
    pub col: u16,
    pub row: u16,
    pub pixel: Pixel,
}

/// An in-memory terminal.
///
/// Keeps the resulting screen plus a log of every glyph written, and can be
/// told to reject specific cells to simulate a flaky terminal.
#[derive(Debug)]
pub struct HeadlessSurface {
    screen: Grid,
    cursor: (u16, u16),
    fg: TermColor,
    bg: TermColor,
    cursor_visible: bool,
    writes: Vec<CellWrite>,
    flushes: usize,
    failing: HashSet<(u16, u16)>,
}

impl HeadlessSurface {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            screen: Grid::new(cols, rows),
            cursor: (0, 0),
            fg: Pixel::BLANK.fg,
            bg: Pixel::BLANK.bg,
            cursor_visible: true,
            writes: Vec::new(),
            flushes: 0,
            failing: HashSet::new(),
        }
    }

    pub fn screen(&self) -> &Grid {
        &self.screen
    }

    pub fn writes(&self) -> &[CellWrite] {
        &self.writes
    }

    pub fn take_writes(&mut self) -> Vec<CellWrite> {
        std::mem::take(&mut self.writes)
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Make every cursor move to `(col, row)` fail until [`heal_cell`](Self::heal_cell).
    pub fn fail_cell(&mut self, col: u16, row: u16) {
        self.failing.insert((col, row));
    }

    pub fn heal_cell(&mut self, col: u16, row: u16) {
        self.failing.remove(&(col, row));
    }
}

impl Surface for HeadlessSurface {
    fn move_to(&mut self, col: u16, row: u16) -> io::Result<()> {
        if self.screen.index_of(col, row).is_none() {
            return Err(out_of_range(col, row, self.screen.width(), self.screen.height()));
        }
        if self.failing.contains(&(col, row)) {
            return Err(io::Error::other("cell rejected"));
        }
        self.cursor = (col, row);
        Ok(())
    }

    fn cursor_position(&mut self) -> io::Result<(u16, u16)> {
        Ok(self.cursor)
    }

    fn set_foreground(&mut self, color: TermColor) -> io::Result<()> {
        self.fg = color;
        Ok(())
    }

    fn set_background(&mut self, color: TermColor) -> io::Result<()> {
        self.bg = color;
        Ok(())
    }

    fn put_char(&mut self, glyph: char) -> io::Result<()> {
        let (col, row) = self.cursor;
        let pixel = Pixel::new(self.fg, self.bg, glyph);
        if !self.screen.set(col, row, pixel) {
            return Err(out_of_range(col, row, self.screen.width(), self.screen.height()));
        }
        self.writes.push(CellWrite { col, row, pixel });
        // Terminals advance the cursor after printing; the last column stays put.
        if col + 1 < self.screen.width() {
            self.cursor.0 = col + 1;
        }
        Ok(())
    }

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
        self.cursor_visible = visible;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_records_writes_with_current_colors() {
        let mut s = HeadlessSurface::new(3, 2);
        s.move_to(1, 1).unwrap();
        s.set_foreground(TermColor::Yellow).unwrap();
        s.set_background(TermColor::DarkBlue).unwrap();
        s.put_char('x').unwrap();

        let expected = Pixel::new(TermColor::Yellow, TermColor::DarkBlue, 'x');
        assert_eq!(s.writes(), &[CellWrite { col: 1, row: 1, pixel: expected }]);
        assert_eq!(s.screen().get(1, 1), Some(expected));
        assert_eq!(s.cursor_position().unwrap(), (2, 1));
    }

    #[test]
    fn headless_rejects_out_of_range_and_failing_cells() {
        let mut s = HeadlessSurface::new(3, 2);
        assert!(s.move_to(3, 0).is_err());
        assert!(s.move_to(0, 2).is_err());

        s.fail_cell(0, 0);
        assert!(s.move_to(0, 0).is_err());
        s.heal_cell(0, 0);
        assert!(s.move_to(0, 0).is_ok());
    }

    #[test]
    fn crossterm_surface_bounds_and_output() {
        let mut s = CrosstermSurface::new(Vec::new(), 4, 2);
        assert_eq!(
            s.move_to(4, 0).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
        s.move_to(2, 1).unwrap();
        s.put_char('Z').unwrap();
        s.flush().unwrap();

        let out = String::from_utf8(s.into_inner()).unwrap();
        // MoveTo is 0-based in crossterm, 1-based on the wire.
        assert!(out.contains("\x1b[2;3H"));
        assert!(out.ends_with('Z'));
    }
}
