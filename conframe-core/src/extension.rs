use std::time::Duration;

use crate::grid::Grid;

/// Frame metadata handed to extensions at the start of each draw cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// Frames fully drawn before this one.
    pub frame: u64,
    /// Duration of the previous cycle, pacing sleep included.
    pub last_draw_time: Duration,
    /// Smoothed frames per second.
    pub fps: u32,
    pub width: u16,
    pub height: u16,
}

/// A per-frame hook run before the diff sweep.
///
/// Extensions run synchronously on the draw thread, in registration order,
/// while the live grid is locked. Writes made by one extension are visible to
/// the next one in the same cycle and to the sweep that follows.
pub trait DrawExtension: Send {
    fn run_extension(&mut self, grid: &mut Grid, info: &FrameInfo);
}

impl<F> DrawExtension for F
where
    F: FnMut(&mut Grid, &FrameInfo) + Send,
{
    fn run_extension(&mut self, grid: &mut Grid, info: &FrameInfo) {
        self(grid, info)
    }
}
