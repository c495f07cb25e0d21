use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::error::{ConfigError, EngineError, ImportError};
use crate::extension::{DrawExtension, FrameInfo};
use crate::grid::Grid;
use crate::import;
use crate::palette::Palette;
use crate::pixel::{Pixel, TermColor};
use crate::surface::Surface;

/// Minimum cycle duration until [`FrameBuffer::set_frame_limit`] is called.
pub const DEFAULT_FRAME_LIMIT_MS: u64 = 16;

/// Next smoothed FPS value: the mean of the previous estimate and this
/// cycle's instantaneous rate. `None` when the cycle took under a millisecond.
pub(crate) fn smooth_fps(previous: u32, elapsed_ms: u64) -> Option<u32> {
    if elapsed_ms == 0 {
        return None;
    }
    let instant = 1000 / elapsed_ms;
    Some(((previous as u64 + instant) / 2) as u32)
}

#[derive(Debug, Default)]
struct FrameStats {
    draw_time_ms: AtomicU64,
    fps: AtomicU32,
    frames: AtomicU64,
}

impl FrameStats {
    fn record(&self, elapsed_ms: u64) {
        self.draw_time_ms.store(elapsed_ms, Ordering::Relaxed);
        if let Some(fps) = smooth_fps(self.fps.load(Ordering::Relaxed), elapsed_ms) {
            self.fps.store(fps, Ordering::Relaxed);
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct FrameLimiter {
    enabled: AtomicBool,
    floor_ms: AtomicU64,
}

impl Default for FrameLimiter {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            floor_ms: AtomicU64::new(DEFAULT_FRAME_LIMIT_MS),
        }
    }
}

impl FrameLimiter {
    fn set_limit(&self, limit: u32) -> Result<(), ConfigError> {
        if limit <= 1 {
            return Err(ConfigError::InvalidFrameLimit(limit));
        }
        self.floor_ms.store(1000 / (limit as u64 - 1), Ordering::Relaxed);
        Ok(())
    }

    /// Not the inverse of `set_limit`; callers depend on this exact formula.
    fn limit(&self) -> u64 {
        (self.floor_ms.load(Ordering::Relaxed) + 1) * 1000
    }

    fn floor(&self) -> Option<Duration> {
        self.enabled
            .load(Ordering::Relaxed)
            .then(|| Duration::from_millis(self.floor_ms.load(Ordering::Relaxed)))
    }
}

/// Engine-private state: the terminal plus the snapshot and shadow grids.
struct RenderState<S> {
    surface: S,
    snapshot: Grid,
    /// What the terminal is currently showing.
    shadow: Grid,
    /// Cells to rewrite regardless of the shadow.
    dirty: Vec<bool>,
    /// Colors last sent to the surface, if known.
    pen: Option<(TermColor, TermColor)>,
    /// The terminal may show cells this engine wrote.
    touched: bool,
}

impl<S: Surface> RenderState<S> {
    fn new(surface: S) -> Self {
        Self {
            surface,
            snapshot: Grid::default(),
            shadow: Grid::default(),
            dirty: Vec::new(),
            pen: None,
            touched: false,
        }
    }

    fn reallocate(&mut self, width: u16, height: u16) {
        self.snapshot = Grid::new(width, height);
        self.shadow = Grid::new(width, height);
        self.dirty = vec![false; self.shadow.len()];
    }

    /// Terminal content is unknown: repaint everything on the next sweep.
    fn invalidate(&mut self) {
        self.dirty.fill(true);
        self.pen = None;
    }

    fn write_cell(&mut self, col: u16, row: u16, pixel: Pixel) -> io::Result<()> {
        self.surface.move_to(col, row)?;
        if self.pen != Some((pixel.fg, pixel.bg)) {
            self.pen = None;
            self.surface.set_background(pixel.bg)?;
            self.surface.set_foreground(pixel.fg)?;
            self.pen = Some((pixel.fg, pixel.bg));
        }
        self.surface.put_char(pixel.glyph)
    }

    /// Copy the live grid into the snapshot. A live grid swapped for one of
    /// different dimensions reallocates the render grids and repaints.
    fn capture(&mut self, live: &Grid) {
        if live.width() != self.snapshot.width() || live.height() != self.snapshot.height() {
            debug!(
                width = live.width(),
                height = live.height(),
                "live grid replaced, reallocating render grids"
            );
            self.reallocate(live.width(), live.height());
            self.invalidate();
        }
        self.snapshot.copy_from(live);
    }

    /// Write every snapshot cell that differs from the shadow. Returns the
    /// number of cells written.
    fn sweep(&mut self) -> usize {
        let mut written = 0;
        for index in 0..self.snapshot.len() {
            let pixel = self.snapshot.cells()[index];
            if !self.dirty[index] && pixel == self.shadow.cells()[index] {
                continue;
            }
            let (col, row) = self.snapshot.position_of(index);
            match self.write_cell(col, row, pixel) {
                Ok(()) => {
                    self.shadow.cells_mut()[index] = pixel;
                    self.dirty[index] = false;
                    self.touched = true;
                    written += 1;
                }
                Err(err) => {
                    // Shadow (and dirty flag) stay as they were, so the
                    // cell is retried next frame.
                    trace!(col, row, %err, "cell write failed");
                    self.pen = None;
                }
            }
        }

        if let Err(err) = self.surface.move_to(0, 0) {
            trace!(%err, "cursor home failed");
        }
        if let Err(err) = self.surface.flush() {
            trace!(%err, "surface flush failed");
        }
        written
    }
}

/// Everything the draw thread and the host share.
///
/// Locks are always taken in the order `live`, `extensions`, `render`.
struct Shared<S> {
    live: Arc<Mutex<Grid>>,
    width: AtomicU16,
    height: AtomicU16,
    render: Mutex<RenderState<S>>,
    extensions: Mutex<Vec<Box<dyn DrawExtension>>>,
    stats: FrameStats,
    limiter: FrameLimiter,
}

impl<S: Surface> Shared<S> {
    fn frame_info(&self, grid: &Grid) -> FrameInfo {
        FrameInfo {
            frame: self.stats.frames.load(Ordering::Relaxed),
            last_draw_time: Duration::from_millis(self.stats.draw_time_ms.load(Ordering::Relaxed)),
            fps: self.stats.fps.load(Ordering::Relaxed),
            width: grid.width(),
            height: grid.height(),
        }
    }

    fn store_size(&self, grid: &Grid) {
        self.width.store(grid.width(), Ordering::Relaxed);
        self.height.store(grid.height(), Ordering::Relaxed);
    }

    fn run_extensions(&self, grid: &mut Grid) {
        let mut extensions = self.extensions.lock();
        if extensions.is_empty() {
            return;
        }
        let info = self.frame_info(grid);
        for extension in extensions.iter_mut() {
            extension.run_extension(grid, &info);
        }
    }

    /// One draw cycle: extensions, diff sweep, pacing, bookkeeping.
    fn draw_cycle(&self) -> usize {
        let started = Instant::now();

        let written = {
            let mut live = self.live.lock();
            self.run_extensions(&mut live);
            self.store_size(&live);
            let mut render = self.render.lock();
            render.capture(&live);
            drop(live);
            render.sweep()
        };

        if let Some(floor) = self.limiter.floor() {
            if let Some(remaining) = floor.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }

        self.stats.record(started.elapsed().as_millis() as u64);
        written
    }
}

enum LoopState {
    Idle,
    Running {
        cancel: Arc<AtomicBool>,
        handle: JoinHandle<()>,
    },
    Disposed,
}

/// A double-buffered grid of colored cells drawn to a [`Surface`].
///
/// The host writes into the live grid (through [`lock`](Self::lock) or
/// [`set_pixel`](Self::set_pixel)); each draw cycle copies it, diffs it
/// against what the terminal already shows and writes only the cells that
/// changed. [`run`](Self::run) repeats the cycle on a background thread.
pub struct FrameBuffer<S: Surface + 'static> {
    shared: Arc<Shared<S>>,
    state: LoopState,
}

impl<S: Surface + 'static> FrameBuffer<S> {
    /// An engine with an empty 0x0 grid. Call [`init`](Self::init) before drawing.
    pub fn new(surface: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                live: Arc::new(Mutex::new(Grid::default())),
                width: AtomicU16::new(0),
                height: AtomicU16::new(0),
                render: Mutex::new(RenderState::new(surface)),
                extensions: Mutex::new(Vec::new()),
                stats: FrameStats::default(),
                limiter: FrameLimiter::default(),
            }),
            state: LoopState::Idle,
        }
    }

    pub fn with_size(surface: S, width: u16, height: u16) -> Self {
        let fb = Self::new(surface);
        fb.init(width, height);
        fb
    }

    /// Load a bitmap, one cell per source pixel, quantized to the default palette.
    pub fn from_file(path: impl AsRef<Path>, surface: S) -> Result<Self, ImportError> {
        Self::from_file_with_palette(path, surface, &Palette::default())
    }

    pub fn from_file_with_palette(
        path: impl AsRef<Path>,
        surface: S,
        palette: &Palette,
    ) -> Result<Self, ImportError> {
        let grid = import::load_grid(path, palette)?;
        let fb = Self::new(surface);
        fb.load(grid);
        Ok(fb)
    }

    /// Reallocate the live, snapshot and shadow grids as `width` x `height`
    /// blank cells. Prior content is discarded.
    pub fn init(&self, width: u16, height: u16) {
        self.load(Grid::new(width, height));
    }

    /// Replace the live grid with `grid`, reallocating the render grids to match.
    ///
    /// If anything was drawn already, the next cycle rewrites every cell.
    pub fn load(&self, grid: Grid) {
        let mut live = self.shared.live.lock();
        let mut render = self.shared.render.lock();
        debug!(width = grid.width(), height = grid.height(), "frame buffer init");
        render.reallocate(grid.width(), grid.height());
        if render.touched {
            render.invalidate();
        }
        self.shared.store_size(&grid);
        *live = grid;
    }

    /// Hide the cursor and start drawing continuously on a background thread.
    pub fn run(&mut self) -> Result<(), EngineError> {
        match self.state {
            LoopState::Idle => {}
            LoopState::Running { .. } => return Err(EngineError::AlreadyRunning),
            LoopState::Disposed => return Err(EngineError::Disposed),
        }

        {
            let mut render = self.shared.render.lock();
            if let Err(err) = render.surface.set_cursor_visible(false) {
                debug!(%err, "could not hide cursor");
            }
            // Whatever the terminal shows now is unknown to the shadow grid.
            render.invalidate();
            render.touched = true;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("conframe-draw".into())
            .spawn(move || {
                debug!("draw loop started");
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    while !flag.load(Ordering::Acquire) {
                        shared.draw_cycle();
                    }
                }));
                let frames = shared.stats.frames.load(Ordering::Relaxed);
                match outcome {
                    Ok(()) => debug!(frames, "draw loop stopped"),
                    Err(_) => warn!(frames, "draw cycle panicked, draw loop stopped"),
                }
            })
            .map_err(EngineError::Spawn)?;

        self.state = LoopState::Running { cancel, handle };
        Ok(())
    }

    /// Run a single draw cycle on the calling thread. Returns the number of
    /// cells written to the surface.
    pub fn draw(&self) -> usize {
        self.shared.draw_cycle()
    }

    /// Stop the draw thread and show the cursor again.
    ///
    /// The thread finishes its current cycle before exiting. Calling this on
    /// an engine that never ran only restores the cursor; calling it again
    /// does nothing.
    pub fn dispose(&mut self) {
        match std::mem::replace(&mut self.state, LoopState::Disposed) {
            LoopState::Disposed => return,
            LoopState::Idle => {}
            LoopState::Running { cancel, handle } => {
                cancel.store(true, Ordering::Release);
                if handle.join().is_err() {
                    warn!("draw thread panicked");
                }
            }
        }
        let mut render = self.shared.render.lock();
        if let Err(err) = render.surface.set_cursor_visible(true) {
            debug!(%err, "could not restore cursor");
        }
    }

    /// Whether the draw thread is alive. Turns `false` on its own if a
    /// cycle panics.
    pub fn is_running(&self) -> bool {
        matches!(&self.state, LoopState::Running { handle, .. } if !handle.is_finished())
    }

    /// Register a per-frame hook. Extensions run in registration order.
    pub fn add_draw_extension(&self, extension: Box<dyn DrawExtension>) {
        self.shared.extensions.lock().push(extension);
    }

    pub fn extension_count(&self) -> usize {
        self.shared.extensions.lock().len()
    }

    /// Force the next cycle to write every cell, whatever the shadow says.
    pub fn invalidate(&self) {
        self.shared.render.lock().invalidate();
    }

    /// Lock the live grid for writing.
    ///
    /// While the guard is held, [`shadow`](Self::shadow),
    /// [`snapshot`](Self::snapshot), [`surface`](Self::surface),
    /// [`invalidate`](Self::invalidate), the size and stats accessors may
    /// still be called. [`draw`](Self::draw), [`dispose`](Self::dispose),
    /// [`init`](Self::init), [`set_pixel`](Self::set_pixel) and
    /// [`pixel`](Self::pixel) lock the grid themselves and must not be called
    /// on the same thread. Never lock the grid while holding the
    /// [`surface`](Self::surface) guard.
    pub fn lock(&self) -> MutexGuard<'_, Grid> {
        self.shared.live.lock()
    }

    /// Shared handle to the live grid for host threads.
    pub fn grid_handle(&self) -> Arc<Mutex<Grid>> {
        Arc::clone(&self.shared.live)
    }

    pub fn set_pixel(&self, col: u16, row: u16, pixel: Pixel) -> bool {
        self.shared.live.lock().set(col, row, pixel)
    }

    pub fn pixel(&self, col: u16, row: u16) -> Option<Pixel> {
        self.shared.live.lock().get(col, row)
    }

    /// Copy of what the engine believes the terminal shows.
    pub fn shadow(&self) -> Grid {
        self.shared.render.lock().shadow.clone()
    }

    /// Copy of the grid as captured by the last draw cycle.
    pub fn snapshot(&self) -> Grid {
        self.shared.render.lock().snapshot.clone()
    }

    pub fn surface(&self) -> MappedMutexGuard<'_, S> {
        MutexGuard::map(self.shared.render.lock(), |render| &mut render.surface)
    }

    pub fn cursor_position(&self) -> io::Result<(u16, u16)> {
        self.shared.render.lock().surface.cursor_position()
    }

    /// Width of the live grid as of the last init or draw cycle.
    pub fn width(&self) -> u16 {
        self.shared.width.load(Ordering::Relaxed)
    }

    pub fn height(&self) -> u16 {
        self.shared.height.load(Ordering::Relaxed)
    }

    /// Duration of the last cycle in milliseconds, pacing included.
    pub fn draw_time(&self) -> u64 {
        self.shared.stats.draw_time_ms.load(Ordering::Relaxed)
    }

    pub fn draw_fps(&self) -> u32 {
        self.shared.stats.fps.load(Ordering::Relaxed)
    }

    pub fn drawn_frames(&self) -> u64 {
        self.shared.stats.frames.load(Ordering::Relaxed)
    }

    pub fn use_frame_limiter(&self) -> bool {
        self.shared.limiter.enabled.load(Ordering::Relaxed)
    }

    pub fn set_use_frame_limiter(&self, enabled: bool) {
        self.shared.limiter.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Set the frame limit. The minimum cycle duration becomes
    /// `1000 / (limit - 1)` milliseconds; `limit` must be greater than 1.
    pub fn set_frame_limit(&self, limit: u32) -> Result<(), ConfigError> {
        self.shared.limiter.set_limit(limit)
    }

    /// `(cycle_floor_ms + 1) * 1000`.
    pub fn frame_limit(&self) -> u64 {
        self.shared.limiter.limit()
    }

    pub fn frame_limit_ms(&self) -> u64 {
        self.shared.limiter.floor_ms.load(Ordering::Relaxed)
    }
}

impl<S: Surface + 'static> Drop for FrameBuffer<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::surface::{CellWrite, HeadlessSurface};

    fn headless(width: u16, height: u16) -> FrameBuffer<HeadlessSurface> {
        let fb = FrameBuffer::with_size(HeadlessSurface::new(width, height), width, height);
        fb.set_use_frame_limiter(false);
        fb
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn init_allocates_blank_grids() {
        let fb = headless(4, 3);
        assert_eq!((fb.width(), fb.height()), (4, 3));
        let live = fb.lock().clone();
        for grid in [live, fb.shadow(), fb.snapshot()] {
            assert_eq!(grid.len(), 12);
            assert!(grid.cells().iter().all(|p| *p == Pixel::BLANK));
        }
    }

    #[test]
    fn init_discards_previous_content() {
        let fb = headless(3, 3);
        fb.set_pixel(1, 1, Pixel::solid(TermColor::Red));
        fb.draw();
        fb.init(2, 2);
        assert_eq!(fb.lock().len(), 4);
        assert_eq!(fb.shadow().len(), 4);
        assert_eq!(fb.pixel(1, 1), Some(Pixel::BLANK));
    }

    #[test]
    fn reinit_after_drawing_rewrites_every_cell() {
        let fb = headless(3, 1);
        fb.lock().fill(Pixel::solid(TermColor::Red));
        assert_eq!(fb.draw(), 3);

        fb.init(3, 1);
        assert_eq!(fb.draw(), 3);
        assert!(fb.surface().screen().cells().iter().all(|p| *p == Pixel::BLANK));
        assert_eq!(fb.draw(), 0);
    }

    #[test]
    fn reinit_while_running_clears_the_terminal() {
        let mut fb = headless(3, 1);
        let red = Pixel::solid(TermColor::Red);
        fb.lock().fill(red);
        fb.run().unwrap();
        assert!(wait_for(|| fb.surface().screen().cells().iter().all(|p| *p == red)));

        fb.init(3, 1);
        assert!(wait_for(|| {
            fb.surface().screen().cells().iter().all(|p| *p == Pixel::BLANK)
        }));
        assert!(fb.shadow().cells().iter().all(|p| *p == Pixel::BLANK));
        fb.dispose();
    }

    #[test]
    fn unchanged_frame_writes_nothing() {
        let fb = headless(5, 2);
        assert_eq!(fb.draw(), 0);
        assert!(fb.surface().writes().is_empty());
        assert_eq!(fb.drawn_frames(), 1);
    }

    #[test]
    fn changed_cell_is_written_once() {
        let fb = headless(5, 2);
        let p = Pixel::new(TermColor::Yellow, TermColor::DarkBlue, '@');
        fb.set_pixel(3, 1, p);

        assert_eq!(fb.draw(), 1);
        assert_eq!(fb.surface().writes(), &[CellWrite { col: 3, row: 1, pixel: p }]);
        assert_eq!(fb.shadow().get(3, 1), Some(p));
        assert_eq!(fb.surface().screen().get(3, 1), Some(p));

        fb.surface().take_writes();
        assert_eq!(fb.draw(), 0);
        assert!(fb.surface().writes().is_empty());
    }

    #[test]
    fn cursor_returns_home_after_sweep() {
        let fb = headless(5, 2);
        fb.set_pixel(4, 1, Pixel::solid(TermColor::Green));
        fb.draw();
        assert_eq!(fb.cursor_position().unwrap(), (0, 0));
        assert_eq!(fb.surface().flushes(), 1);
    }

    #[test]
    fn failed_cell_is_retried_next_frame() {
        let fb = headless(3, 1);
        let p = Pixel::solid(TermColor::Cyan);
        fb.surface().fail_cell(1, 0);
        fb.set_pixel(1, 0, p);
        fb.set_pixel(2, 0, p);

        assert_eq!(fb.draw(), 1);
        assert_eq!(fb.shadow().get(1, 0), Some(Pixel::BLANK));
        assert_eq!(fb.shadow().get(2, 0), Some(p));

        fb.surface().heal_cell(1, 0);
        fb.surface().take_writes();
        assert_eq!(fb.draw(), 1);
        assert_eq!(fb.surface().writes(), &[CellWrite { col: 1, row: 0, pixel: p }]);
        assert_eq!(fb.shadow().get(1, 0), Some(p));
    }

    #[test]
    fn cells_outside_the_terminal_are_skipped() {
        // Grid wider than the terminal: the extra column never lands.
        let fb = FrameBuffer::with_size(HeadlessSurface::new(2, 1), 3, 1);
        fb.set_use_frame_limiter(false);
        fb.lock().fill(Pixel::solid(TermColor::Magenta));
        assert_eq!(fb.draw(), 2);
        assert_eq!(fb.draw(), 0);
        assert_eq!(fb.shadow().get(2, 0), Some(Pixel::BLANK));
    }

    #[test]
    fn invalidate_repaints_every_cell() {
        let fb = headless(4, 2);
        fb.invalidate();
        assert_eq!(fb.draw(), 8);
        assert_eq!(fb.draw(), 0);
    }

    #[test]
    fn failed_cell_after_invalidate_is_retried_alone() {
        let fb = headless(3, 1);
        fb.surface().fail_cell(2, 0);
        fb.invalidate();
        assert_eq!(fb.draw(), 2);

        fb.surface().heal_cell(2, 0);
        fb.surface().take_writes();
        assert_eq!(fb.draw(), 1);
        assert_eq!(fb.surface().writes()[0].col, 2);
        assert_eq!(fb.draw(), 0);
    }

    #[test]
    fn extensions_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let fb = headless(3, 1);

        fb.add_draw_extension(Box::new(|grid: &mut Grid, _: &FrameInfo| {
            grid.set(0, 0, Pixel::new(TermColor::White, TermColor::Black, 'A'));
        }));
        let log = Arc::clone(&seen);
        fb.add_draw_extension(Box::new(move |grid: &mut Grid, _: &FrameInfo| {
            let glyph = grid.get(0, 0).map(|p| p.glyph);
            log.lock().push(glyph);
            grid.set(1, 0, Pixel::new(TermColor::White, TermColor::Black, 'B'));
        }));
        assert_eq!(fb.extension_count(), 2);

        assert_eq!(fb.draw(), 2);
        assert_eq!(*seen.lock(), vec![Some('A')]);
        assert_eq!(fb.surface().screen().get(1, 0).map(|p| p.glyph), Some('B'));
    }

    #[test]
    fn extensions_receive_frame_metadata() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let fb = headless(6, 2);
        let log = Arc::clone(&frames);
        fb.add_draw_extension(Box::new(move |_: &mut Grid, info: &FrameInfo| {
            log.lock().push((info.frame, info.width, info.height));
        }));
        fb.draw();
        fb.draw();
        assert_eq!(*frames.lock(), vec![(0, 6, 2), (1, 6, 2)]);
    }

    #[test]
    fn frame_limit_formulas_are_kept() {
        let fb = headless(1, 1);
        assert_eq!(fb.frame_limit_ms(), DEFAULT_FRAME_LIMIT_MS);
        assert_eq!(fb.frame_limit(), 17_000);

        fb.set_frame_limit(31).unwrap();
        assert_eq!(fb.frame_limit_ms(), 33);
        assert_eq!(fb.frame_limit(), 34_000);

        fb.set_frame_limit(2).unwrap();
        assert_eq!(fb.frame_limit_ms(), 1000);
    }

    #[test]
    fn degenerate_frame_limits_are_rejected() {
        let fb = headless(1, 1);
        assert_eq!(fb.set_frame_limit(0), Err(ConfigError::InvalidFrameLimit(0)));
        assert_eq!(fb.set_frame_limit(1), Err(ConfigError::InvalidFrameLimit(1)));
        assert_eq!(fb.frame_limit_ms(), DEFAULT_FRAME_LIMIT_MS);
    }

    #[test]
    fn fps_is_smoothed_by_halves() {
        assert_eq!(smooth_fps(0, 10), Some(50));
        assert_eq!(smooth_fps(50, 20), Some(50));
        assert_eq!(smooth_fps(50, 0), None);

        let stats = FrameStats::default();
        stats.record(10);
        stats.record(20);
        stats.record(0);
        assert_eq!(stats.fps.load(Ordering::Relaxed), 50);
        assert_eq!(stats.draw_time_ms.load(Ordering::Relaxed), 0);
        assert_eq!(stats.frames.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn limiter_paces_the_cycle() {
        let fb = headless(2, 2);
        fb.set_use_frame_limiter(true);
        fb.set_frame_limit(51).unwrap();
        assert_eq!(fb.frame_limit_ms(), 20);

        let started = Instant::now();
        fb.draw();
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(fb.draw_time() >= 20);
        assert!(fb.draw_fps() > 0);
    }

    #[test]
    fn run_then_dispose_stops_the_thread() {
        let mut fb = headless(4, 2);
        fb.set_use_frame_limiter(true);
        fb.run().unwrap();
        assert!(fb.is_running());
        assert!(matches!(fb.run(), Err(EngineError::AlreadyRunning)));

        fb.set_pixel(2, 1, Pixel::solid(TermColor::Blue));
        assert!(wait_for(|| {
            fb.surface().screen().get(2, 1) == Some(Pixel::solid(TermColor::Blue))
        }));
        assert!(!fb.surface().cursor_visible());

        fb.dispose();
        assert!(!fb.is_running());
        assert!(fb.surface().cursor_visible());

        let frames = fb.drawn_frames();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(fb.drawn_frames(), frames);
        assert!(matches!(fb.run(), Err(EngineError::Disposed)));
    }

    #[test]
    fn first_running_frame_repaints_everything() {
        let mut fb = headless(3, 2);
        fb.run().unwrap();
        assert!(wait_for(|| fb.surface().writes().len() >= 6));
        fb.dispose();
    }

    #[test]
    fn accessors_stay_usable_while_the_grid_is_locked() {
        let mut fb = headless(4, 2);
        fb.run().unwrap();
        let fb = Arc::new(fb);

        let (done_tx, done_rx) = mpsc::channel();
        let host = Arc::clone(&fb);
        thread::spawn(move || {
            for i in 0..100u16 {
                let mut grid = host.lock();
                grid.set(i % 4, 1, Pixel::solid(TermColor::Red));
                thread::sleep(Duration::from_millis(1));
                let _ = (host.shadow(), host.snapshot(), host.width(), host.height());
                let _ = host.cursor_position();
                let _ = host.surface().flushes();
                host.invalidate();
                drop(grid);
            }
            let _ = done_tx.send(());
        });

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        let frames = fb.drawn_frames();
        assert!(wait_for(|| fb.drawn_frames() > frames));
    }

    #[test]
    fn panicking_extension_stops_the_loop() {
        let mut fb = headless(2, 1);
        fb.add_draw_extension(Box::new(|_: &mut Grid, info: &FrameInfo| {
            if info.frame == 3 {
                panic!("extension failed");
            }
        }));
        fb.run().unwrap();
        assert!(wait_for(|| !fb.is_running()));
        assert_eq!(fb.drawn_frames(), 3);

        fb.dispose();
        assert!(fb.surface().cursor_visible());
    }

    #[test]
    fn dispose_without_run_is_harmless() {
        let mut fb = headless(2, 2);
        fb.surface().set_cursor_visible(false).unwrap();
        fb.dispose();
        assert!(fb.surface().cursor_visible());
        fb.dispose();
        assert!(!fb.is_running());
    }

    #[test]
    fn replaced_live_grid_reallocates_render_grids() {
        let fb = headless(2, 2);
        *fb.lock() = Grid::new(3, 1);
        // The surface is two columns wide; the third cell stays pending.
        assert_eq!(fb.draw(), 2);
        assert_eq!(fb.shadow().len(), 3);
        assert_eq!((fb.width(), fb.height()), (3, 1));
    }
}
