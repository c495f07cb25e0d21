use conframe_core::{DrawExtension, FrameInfo, Grid, Pixel, TermColor};

/// Overlays engine stats on the bottom row of the grid each frame.
pub struct StatusLine {
    template: Pixel,
}

impl Default for StatusLine {
    fn default() -> Self {
        Self {
            template: Pixel::new(TermColor::Yellow, TermColor::DarkBlue, ' '),
        }
    }
}

impl StatusLine {
    fn text(info: &FrameInfo) -> String {
        format!(
            " {}x{} | {:>4} fps | {:>3} ms | frame {} | q to quit ",
            info.width,
            info.height,
            info.fps,
            info.last_draw_time.as_millis(),
            info.frame
        )
    }
}

impl DrawExtension for StatusLine {
    fn run_extension(&mut self, grid: &mut Grid, info: &FrameInfo) {
        let Some(row) = grid.height().checked_sub(1) else {
            return;
        };
        grid.put_str(0, row, &Self::text(info), self.template);
    }
}
