use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use conframe_core::{Grid, Pixel, TermColor};
use parking_lot::Mutex;
use tracing::warn;

const RAMP: &[TermColor] = &[
    TermColor::Black,
    TermColor::DarkBlue,
    TermColor::Blue,
    TermColor::DarkCyan,
    TermColor::Cyan,
    TermColor::DarkGreen,
    TermColor::Green,
    TermColor::Yellow,
    TermColor::DarkYellow,
    TermColor::Red,
    TermColor::DarkRed,
    TermColor::DarkMagenta,
    TermColor::Magenta,
];

const GLYPHS: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Paint one frame of the plasma pattern at tick `t`.
pub fn paint(grid: &mut Grid, t: u32) {
    let t = t as f32;
    for row in 0..grid.height() {
        for col in 0..grid.width() {
            let x = col as f32;
            let y = row as f32 * 2.0; // cells are roughly twice as tall as wide
            let v = (x / 7.0 + t / 11.0).sin()
                + (y / 5.0 - t / 17.0).sin()
                + ((x + y) / 9.0 + t / 23.0).sin()
                + ((x * x + y * y).sqrt() / 6.0 - t / 13.0).sin();
            // v is in -4..=4
            let n = ((v + 4.0) / 8.0).clamp(0.0, 0.999);
            let bg = RAMP[(n * RAMP.len() as f32) as usize];
            let glyph = GLYPHS[(n * GLYPHS.len() as f32) as usize];
            grid.set(col, row, Pixel::new(TermColor::White, bg, glyph));
        }
    }
}

/// Host-side writer thread: repaints the shared grid about 30 times a second
/// until `stop` is set.
pub fn spawn(grid: Arc<Mutex<Grid>>, stop: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("conframe-demo".into()).spawn(move || {
        let mut tick = 0u32;
        while !stop.load(Ordering::Acquire) {
            paint(&mut grid.lock(), tick);
            tick = tick.wrapping_add(1);
            thread::sleep(Duration::from_millis(33));
        }
    })
}

/// Signal the writer thread to stop and wait for it. Returns `false` if it
/// panicked.
pub fn finish(stop: &AtomicBool, handle: JoinHandle<()>) -> bool {
    stop.store(true, Ordering::Release);
    if handle.join().is_err() {
        warn!("demo thread panicked");
        return false;
    }
    true
}
